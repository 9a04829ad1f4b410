use super::*;

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

fn write_silent_wav(path: &Path, samples: u32) {
    let data_len = samples * 2;
    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVEfmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&1u16.to_le_bytes()); // mono
    bytes.extend_from_slice(&8000u32.to_le_bytes());
    bytes.extend_from_slice(&16000u32.to_le_bytes());
    bytes.extend_from_slice(&2u16.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    bytes.resize(44 + data_len as usize, 0);
    std::fs::write(path, bytes).unwrap();
}

#[test]
fn negative_host_index_selects_best() {
    assert_eq!(StreamSelector::from_host(-1), StreamSelector::Best);
    assert_eq!(StreamSelector::from_host(-7), StreamSelector::Best);
    assert_eq!(StreamSelector::from_host(0), StreamSelector::Index(0));
    assert_eq!(StreamSelector::from_host(3), StreamSelector::Index(3));
    assert_eq!(StreamSelector::Best.to_string(), "best");
    assert_eq!(StreamSelector::Index(2).to_string(), "2");
}

#[test]
fn missing_file_is_an_open_error() {
    let path = temp_dir("missing").join("nope.mov");
    let err = Decoder::open(&path, DecoderOptions::default()).unwrap_err();
    assert!(matches!(err, MediaError::Open(_)), "{err}");
}

#[test]
fn audio_only_container_opens_without_video_streams() {
    let dir = temp_dir("audio_only");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("tone.wav");
    write_silent_wav(&path, 8000);

    let decoder = Decoder::open(&path, DecoderOptions::default()).unwrap();
    assert!(decoder.is_open());
    assert!(decoder.stream_headers().is_empty());
    assert_eq!(decoder.best_stream_index(), None);
    assert!(decoder.header(StreamSelector::Best).is_none());

    let cancel = CancelToken::new();
    for selector in [StreamSelector::Best, StreamSelector::Index(0)] {
        let err = decoder.decode_frame(selector, 1, &cancel).unwrap_err();
        assert!(matches!(err, MediaError::Decode(_)), "{err}");
    }

    decoder.close();
    assert!(!decoder.is_open());
}
