use super::*;

fn timing(start: i64, rate: (i32, i32), tb: (i32, i32)) -> StreamTiming {
    StreamTiming {
        start,
        frame_rate: Rational::new(rate.0, rate.1),
        time_base: Rational::new(tb.0, tb.1),
    }
}

#[test]
fn frame_to_timestamp_at_matching_time_base() {
    let t = timing(0, (24, 1), (1, 24));
    assert_eq!(t.frame_to_timestamp(0), 0);
    assert_eq!(t.frame_to_timestamp(99), 99);
    assert_eq!(t.frame_duration(), 1);
}

#[test]
fn frame_to_timestamp_with_mpeg_ts_clock() {
    let t = timing(900, (30000, 1001), (1, 90000));
    assert_eq!(t.frame_to_timestamp(0), 900);
    assert_eq!(t.frame_to_timestamp(1), 900 + 3003);
    assert_eq!(t.frame_to_timestamp(1000), 900 + 3_003_000);
    assert_eq!(t.frame_duration(), 3003);
}

#[test]
fn frame_to_timestamp_rounds_to_nearest_tick() {
    // 24 fps on a millisecond clock: 41.666.. ms per frame.
    let t = timing(0, (24, 1), (1, 1000));
    assert_eq!(t.frame_to_timestamp(1), 42);
    assert_eq!(t.frame_to_timestamp(2), 83);
    assert_eq!(t.frame_to_timestamp(3), 125);
}

#[test]
fn large_indices_do_not_overflow() {
    let t = timing(0, (120000, 1001), (1, 1_000_000_000));
    let ts = t.frame_to_timestamp(10_000_000);
    assert_eq!(ts, 83_416_666_666_667);
}

#[test]
fn timestamp_to_frame_inverts_frame_to_timestamp() {
    for t in [
        timing(0, (24, 1), (1, 1000)),
        timing(900, (30000, 1001), (1, 90000)),
        timing(-2, (25, 1), (1, 12800)),
    ] {
        for index in [0, 1, 2, 7, 99, 1234] {
            let ts = t.frame_to_timestamp(index);
            assert_eq!(t.timestamp_to_frame(ts), index, "{t:?} {index}");
            let next = t.frame_to_timestamp(index + 1);
            assert_eq!(t.timestamp_to_frame(next - 1), index, "{t:?} {index}");
        }
    }
}

#[test]
fn interval_contains_is_half_open() {
    let iv = Interval {
        pts: 10,
        duration: 5,
    };
    assert!(!iv.contains(9));
    assert!(iv.contains(10));
    assert!(iv.contains(14));
    assert!(!iv.contains(15));
}

#[test]
fn interval_of_falls_back_to_nominal_duration() {
    let t = timing(0, (25, 1), (1, 12800));
    let mut video = frame::Video::new(ffmpeg_next::format::Pixel::GRAYF32LE, 2, 2);
    assert_eq!(t.interval_of(&video), None);
    video.set_pts(Some(512));
    let iv = t.interval_of(&video).unwrap();
    assert_eq!(iv.pts, 512);
    assert_eq!(iv.duration, 512);
}

#[test]
fn frame_count_from_duration() {
    assert_eq!(
        frames_from_duration(8 * 12800, Rational::new(1, 12800), Rational::new(25, 1)),
        Some(200)
    );
    assert_eq!(
        frames_from_duration(0, Rational::new(1, 12800), Rational::new(25, 1)),
        None
    );
    assert_eq!(
        frames_from_duration(
            ffmpeg_next::ffi::AV_NOPTS_VALUE,
            Rational::new(1, 1000),
            Rational::new(24, 1)
        ),
        None
    );
}
