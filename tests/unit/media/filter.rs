use super::*;
use crate::media::frame::{DecodedFrame, PixelFormat};

fn config(description: &str, output_format: &str) -> FilterConfig {
    FilterConfig {
        width: 8,
        height: 4,
        input_format: Pixel::GBRPF32LE,
        time_base: Rational::new(1, 24),
        sample_aspect_ratio: Rational::new(1, 1),
        output_format: output_format.to_string(),
        description: description.to_string(),
    }
}

fn input_frame(pts: i64) -> frame::Video {
    let len = 3 * 8 * 4;
    let buf = (0..len).map(|i| i as f32 / len as f32).collect();
    let mut video = DecodedFrame::new(8, 4, PixelFormat::Rgb, buf)
        .unwrap()
        .to_video()
        .unwrap();
    video.set_pts(Some(pts));
    video
}

fn collect(pipeline: &mut FilterPipeline, input: Option<&frame::Video>) -> Vec<DecodedFrame> {
    let mut out = Vec::new();
    pipeline
        .process(input, |f| {
            out.push(DecodedFrame::from_video(f, 0)?);
            Ok(ControlFlow::Continue(()))
        })
        .unwrap();
    out
}

#[test]
fn unknown_output_format_is_a_config_error() {
    let err = FilterPipeline::configure(config("", "not_a_format")).unwrap_err();
    assert!(matches!(err, MediaError::Config(_)), "{err}");
}

#[test]
fn unparsable_description_is_a_config_error() {
    let err =
        FilterPipeline::configure(config("definitely_not_a_filter=3", "gbrpf32le")).unwrap_err();
    assert!(matches!(err, MediaError::Config(_)), "{err}");
}

#[test]
fn empty_description_passes_frames_through() {
    let mut pipeline = FilterPipeline::configure(config("", "gbrpf32le")).unwrap();
    let src = input_frame(0);
    let mut out = collect(&mut pipeline, Some(&src));
    out.extend(collect(&mut pipeline, None));
    assert_eq!(out.len(), 1);
    let expected = DecodedFrame::from_video(&src, 0).unwrap();
    assert_eq!(out[0].buf(), expected.buf());
}

#[test]
fn output_format_is_enforced_by_the_sink() {
    let mut pipeline = FilterPipeline::configure(config("", "grayf32le")).unwrap();
    assert_eq!(pipeline.output_format(), Pixel::GRAYF32LE);
    let src = input_frame(0);
    let mut out = collect(&mut pipeline, Some(&src));
    out.extend(collect(&mut pipeline, None));
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].pix_fmt(), PixelFormat::Gray);
}

#[test]
fn description_is_applied() {
    let mut pipeline = FilterPipeline::configure(config("vflip", "gbrpf32le")).unwrap();
    let src = input_frame(0);
    let mut out = collect(&mut pipeline, Some(&src));
    out.extend(collect(&mut pipeline, None));
    let original = DecodedFrame::from_video(&src, 0).unwrap();
    let flipped = &out[0];
    let first_row = &original.plane(0).as_slice()[..8];
    let last_row = &flipped.plane(0).as_slice()[3 * 8..];
    assert_eq!(first_row, last_row);
}

#[test]
fn reset_clears_end_of_stream() {
    let mut pipeline = FilterPipeline::configure(config("", "gbrpf32le")).unwrap();
    assert!(!pipeline.is_dirty());
    collect(&mut pipeline, None);
    assert!(pipeline.is_dirty());

    pipeline.reset().unwrap();
    assert!(!pipeline.is_dirty());
    let src = input_frame(5);
    let mut out = collect(&mut pipeline, Some(&src));
    out.extend(collect(&mut pipeline, None));
    assert_eq!(out.len(), 1);
}

#[test]
fn breaking_stops_pulling() {
    let mut pipeline = FilterPipeline::configure(config("", "gbrpf32le")).unwrap();
    let src = input_frame(0);
    pipeline
        .process(Some(&src), |_| Ok(ControlFlow::Continue(())))
        .unwrap();
    let mut calls = 0;
    let flow = pipeline
        .process(None, |_| {
            calls += 1;
            Ok(ControlFlow::Break(()))
        })
        .unwrap();
    assert!(calls <= 1);
    if calls == 1 {
        assert!(flow.is_break());
    }
}

#[test]
fn parse_pixel_format_accepts_ffmpeg_names() {
    assert_eq!(parse_pixel_format("gbrapf32le").unwrap(), Pixel::GBRAPF32LE);
    assert!(parse_pixel_format("").is_err());
}
