use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(MediaError::open("x").to_string().contains("open error:"));
    assert!(
        MediaError::config("x")
            .to_string()
            .contains("configuration error:")
    );
    assert!(MediaError::decode("x").to_string().contains("decode error:"));
    assert!(MediaError::encode("x").to_string().contains("encode error:"));
    assert!(
        MediaError::unsupported_format("yuv420p")
            .to_string()
            .contains("unsupported pixel format: yuv420p")
    );
    assert!(
        MediaError::validation("x")
            .to_string()
            .contains("validation error:")
    );
}

#[test]
fn out_of_range_names_frame_and_count() {
    let err = MediaError::OutOfRange {
        frame: 0,
        frame_count: 200,
    };
    let msg = err.to_string();
    assert!(msg.contains("frame 0"));
    assert!(msg.contains("200 frames"));
}

#[test]
fn cancelled_is_detectable() {
    assert!(MediaError::Cancelled.is_cancelled());
    assert!(!MediaError::decode("x").is_cancelled());
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = MediaError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}

#[test]
fn clone_keeps_variant_and_message() {
    let err = MediaError::open("missing.mov").clone();
    assert!(matches!(&err, MediaError::Open(m) if m == "missing.mov"));
    assert_eq!(err.to_string(), "open error: missing.mov");
    assert!(MediaError::Cancelled.clone().is_cancelled());

    let other = MediaError::Other(anyhow::anyhow!("inner").context("outer"));
    let copy = other.clone();
    assert!(matches!(copy, MediaError::Other(_)));
    assert!(copy.to_string().contains("outer: inner"), "{copy}");
}
