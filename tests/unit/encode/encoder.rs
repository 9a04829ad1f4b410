use super::*;
use crate::media::frame::PixelFormat;

fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "frameseek_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

fn rgb(width: u32, height: u32, v: f32) -> DecodedFrame {
    let len = 3 * (width * height) as usize;
    DecodedFrame::new(width, height, PixelFormat::Rgb, vec![v; len]).unwrap()
}

fn opts(path: PathBuf) -> EncoderOptions {
    EncoderOptions::new(path, 16, 16, Rational::new(24, 1))
}

#[test]
fn codec_parameters_are_range_checked() {
    assert!(CodecSettings::default().validate().is_ok());
    let h264 = |crf: u8, preset: &str| CodecSettings::H264 {
        crf,
        preset: preset.to_string(),
    };
    assert!(h264(18, "medium").validate().is_ok());
    assert!(h264(52, "medium").validate().is_err());
    assert!(h264(18, "warp9").validate().is_err());
    assert!(CodecSettings::Mjpeg { quality: 2 }.validate().is_ok());
    assert!(CodecSettings::Mjpeg { quality: 1 }.validate().is_err());
    assert!(CodecSettings::Mjpeg { quality: 32 }.validate().is_err());
}

#[test]
fn prores_alpha_profiles_use_yuva() {
    let p = |profile| CodecSettings::ProRes { profile };
    assert_eq!(p(ProResProfile::P4444).pixel_format(), Pixel::YUVA444P10LE);
    assert_eq!(p(ProResProfile::Hq).pixel_format(), Pixel::YUV422P10LE);
    assert_eq!(p(ProResProfile::Hq).encoder_name(), "prores_ks");
}

#[test]
fn codec_settings_deserialize_from_json() {
    let s: CodecSettings =
        serde_json::from_str(r#"{ "codec": "prores", "profile": "4444" }"#).unwrap();
    assert_eq!(
        s,
        CodecSettings::ProRes {
            profile: ProResProfile::P4444
        }
    );
    let s: CodecSettings = serde_json::from_str(r#"{ "codec": "mjpeg", "quality": 3 }"#).unwrap();
    assert_eq!(s, CodecSettings::Mjpeg { quality: 3 });
}

#[test]
fn options_validation() {
    let base = opts(PathBuf::from("out.mov"));
    assert!(base.validate().is_ok());
    assert!(EncoderOptions { width: 0, ..base.clone() }.validate().is_err());
    assert!(
        EncoderOptions {
            frame_rate: Rational::new(24, 0),
            ..base.clone()
        }
        .validate()
        .is_err()
    );
    let odd_h264 = EncoderOptions {
        width: 15,
        ..base.with_codec(CodecSettings::H264 {
            crf: 20,
            preset: "fast".to_string(),
        })
    };
    assert!(odd_h264.validate().is_err());
}

#[test]
fn ensure_parent_dir_creates_missing_directories() {
    let dir = temp_dir("parent_dir");
    let path = dir.join("a").join("b").join("out.mov");
    ensure_parent_dir(&path).unwrap();
    assert!(path.parent().unwrap().is_dir());
    ensure_parent_dir(Path::new("bare.mov")).unwrap();
}

#[test]
fn existing_output_is_kept_without_overwrite() {
    let dir = temp_dir("no_overwrite");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("taken.mov");
    std::fs::write(&path, b"keep").unwrap();

    let err = Encoder::open(EncoderOptions {
        overwrite: false,
        ..opts(path.clone())
    })
    .unwrap_err();
    assert!(matches!(err, MediaError::Validation(_)), "{err}");
    assert_eq!(std::fs::read(&path).unwrap(), b"keep");
}

#[test]
fn encodes_a_short_prores_movie() {
    let path = temp_dir("prores").join("short.mov");
    let mut enc = Encoder::open(opts(path.clone())).unwrap();
    assert!(enc.is_open());
    for i in 0..3 {
        enc.write(&rgb(16, 16, i as f32 / 4.0)).unwrap();
    }
    assert!(enc.write(&rgb(8, 8, 0.0)).is_err());
    assert_eq!(enc.frames_written(), 3);
    enc.finish().unwrap();
    assert!(!enc.is_open());
    assert!(enc.finish().is_err());
    assert!(std::fs::metadata(&path).unwrap().len() > 0);
}

#[test]
fn unknown_color_tag_fails_at_open() {
    let path = temp_dir("bad_color").join("bad.mov");
    let err = Encoder::open(EncoderOptions {
        color: ColorMetadata {
            space: Some("not_a_colorspace".to_string()),
            ..ColorMetadata::default()
        },
        ..opts(path)
    })
    .unwrap_err();
    assert!(matches!(err, MediaError::Config(_)), "{err}");
}

#[test]
fn encoder_is_a_frame_sink() {
    let path = temp_dir("sink").join("sink.avi");
    let mut enc = Encoder::new(
        EncoderOptions::new(path.clone(), 1, 1, Rational::new(1, 1))
            .with_codec(CodecSettings::Mjpeg { quality: 3 }),
    );
    let frames = [rgb(16, 16, 0.25), rgb(16, 16, 0.75)];
    crate::encode::sink::write_all(
        &mut enc,
        SinkConfig {
            width: 16,
            height: 16,
            frame_rate: Rational::new(25, 1),
        },
        &frames,
    )
    .unwrap();
    assert_eq!(enc.options().width, 16);
    assert_eq!(enc.frames_written(), 2);
    assert!(std::fs::metadata(&path).unwrap().len() > 0);
}
