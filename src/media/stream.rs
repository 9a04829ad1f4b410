use std::ops::ControlFlow;

use ffmpeg_next::{
    codec, decoder, format::context::Input, frame, packet::Packet, util::error::EAGAIN,
};

use crate::foundation::core::{Rational, mul_div_round};
use crate::foundation::error::{MediaError, MediaResult};
use crate::foundation::log::Logger;

/// Frame rate assumed when a stream does not declare one.
pub const FALLBACK_FRAME_RATE: Rational = Rational::new(24, 1);

/// Static facts about one video substream, discovered when the container is opened.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StreamHeader {
    /// Container stream index.
    pub index: usize,
    /// Whether FFmpeg considers this the best video stream of the container.
    pub is_best: bool,
    /// Coded width in pixels.
    pub width: u32,
    /// Coded height in pixels.
    pub height: u32,
    /// Frames per second.
    pub frame_rate: Rational,
    /// Pixel (sample) aspect ratio.
    pub pixel_aspect_ratio: Rational,
    /// First frame number; always 1.
    pub first_frame: i64,
    /// Total number of frames.
    pub frame_count: i64,
    /// Native pixel format name.
    pub pixel_format: String,
    /// Colour range name.
    pub color_range: String,
    /// Colour space (matrix) name.
    pub color_space: String,
    /// Colour primaries name.
    pub color_primaries: String,
}

/// Timestamp arithmetic for one stream.
///
/// Frame indices are zero-based here. One-based frame numbers are converted at the decoder
/// boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamTiming {
    /// Timestamp of the first frame, in `time_base` units.
    pub start: i64,
    /// Frames per second. Both parts must be positive.
    pub frame_rate: Rational,
    /// Seconds per timestamp tick. Both parts must be positive.
    pub time_base: Rational,
}

impl StreamTiming {
    /// `start + round(frame_index * (rate.den / rate.num) * (tb.den / tb.num))`.
    pub fn frame_to_timestamp(&self, frame_index: i64) -> i64 {
        let num = i128::from(self.frame_rate.den) * i128::from(self.time_base.den);
        let den = i128::from(self.frame_rate.num) * i128::from(self.time_base.num);
        let offset = mul_div_round(i128::from(frame_index), num, den);
        let ts = i128::from(self.start) + offset;
        ts.clamp(i128::from(i64::MIN + 1), i128::from(i64::MAX)) as i64
    }

    /// Zero-based index of the frame whose nominal interval contains `timestamp`.
    pub fn timestamp_to_frame(&self, timestamp: i64) -> i64 {
        let num = i128::from(self.frame_rate.num) * i128::from(self.time_base.num);
        let den = i128::from(self.frame_rate.den) * i128::from(self.time_base.den);
        let rel = i128::from(timestamp) - i128::from(self.start);
        // Half a tick of slack absorbs the rounding in `frame_to_timestamp`.
        ((rel * 2 + 1) * num)
            .div_euclid(den * 2)
            .clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
    }

    /// Nominal duration of one frame in time-base ticks, at least 1.
    pub fn frame_duration(&self) -> i64 {
        (self.frame_to_timestamp(1) - self.start).max(1)
    }

    /// Presentation interval of a decoded or filtered frame, `None` without a timestamp.
    pub(crate) fn interval_of(&self, frame: &frame::Video) -> Option<Interval> {
        let pts = frame.timestamp().or_else(|| frame.pts())?;
        let duration = match frame.packet().duration {
            d if d > 0 => d,
            _ => self.frame_duration(),
        };
        Some(Interval { pts, duration })
    }
}

/// Presentation interval `[pts, pts + duration)` of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Interval {
    pub(crate) pts: i64,
    pub(crate) duration: i64,
}

impl Interval {
    pub(crate) fn contains(self, timestamp: i64) -> bool {
        self.pts <= timestamp && timestamp < self.pts.saturating_add(self.duration)
    }
}

/// One decodable video substream.
pub(crate) struct Stream {
    index: usize,
    decoder: decoder::Video,
    timing: StreamTiming,
    frame_count: i64,
}

impl Stream {
    /// Bind a codec context to stream `index` of `input`.
    ///
    /// Missing start time, frame count or frame rate fall back to 0, 1 and 24/1 respectively,
    /// each with a warning.
    pub(crate) fn open(
        input: &Input,
        index: usize,
        thread_count: usize,
        logger: &Logger,
    ) -> MediaResult<Self> {
        let stream = input
            .stream(index)
            .ok_or_else(|| MediaError::open(format!("stream {index} does not exist")))?;

        let mut ctx = codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| MediaError::open(format!("stream {index}: codec context: {e}")))?;
        ctx.set_threading(codec::threading::Config {
            kind: codec::threading::Type::Frame,
            count: thread_count,
        });
        let decoder = ctx
            .decoder()
            .video()
            .map_err(|e| MediaError::open(format!("stream {index}: unsupported codec: {e}")))?;

        let time_base = Rational::from(stream.time_base());
        if !time_base.is_valid_positive() {
            return Err(MediaError::open(format!("stream {index}: invalid time base {time_base}")));
        }

        let start = match stream.start_time() {
            ffmpeg_next::ffi::AV_NOPTS_VALUE => {
                logger.warning(format!("stream {index}: unknown start timestamp, assuming 0"));
                0
            }
            ts => ts,
        };

        let frame_rate = [stream.avg_frame_rate(), stream.rate()]
            .into_iter()
            .map(Rational::from)
            .find(|r| r.is_valid_positive())
            .unwrap_or_else(|| {
                logger.warning(format!(
                    "stream {index}: unknown frame rate, assuming {FALLBACK_FRAME_RATE}"
                ));
                FALLBACK_FRAME_RATE
            });

        let timing = StreamTiming {
            start,
            frame_rate,
            time_base,
        };

        let frame_count = if stream.frames() > 0 {
            stream.frames()
        } else if let Some(n) = frames_from_duration(stream.duration(), time_base, frame_rate) {
            n
        } else if let Some(n) = frames_from_duration(
            input.duration(),
            Rational::new(1, ffmpeg_next::ffi::AV_TIME_BASE),
            frame_rate,
        ) {
            n
        } else {
            logger.warning(format!("stream {index}: unknown frame count, assuming 1"));
            1
        };

        Ok(Self {
            index,
            decoder,
            timing,
            frame_count,
        })
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn timing(&self) -> StreamTiming {
        self.timing
    }

    pub(crate) fn width(&self) -> u32 {
        self.decoder.width()
    }

    pub(crate) fn height(&self) -> u32 {
        self.decoder.height()
    }

    pub(crate) fn format(&self) -> ffmpeg_next::format::Pixel {
        self.decoder.format()
    }

    pub(crate) fn sample_aspect_ratio(&self) -> Rational {
        let sar = Rational::from(self.decoder.aspect_ratio());
        if sar.is_valid_positive() {
            sar
        } else {
            Rational::default()
        }
    }

    pub(crate) fn header(&self, is_best: bool) -> StreamHeader {
        let format = self.decoder.format();
        StreamHeader {
            index: self.index,
            is_best,
            width: self.width(),
            height: self.height(),
            frame_rate: self.timing.frame_rate,
            pixel_aspect_ratio: self.sample_aspect_ratio(),
            first_frame: 1,
            frame_count: self.frame_count,
            pixel_format: format
                .descriptor()
                .map(|d| d.name().to_string())
                .unwrap_or_else(|| "none".to_string()),
            color_range: self
                .decoder
                .color_range()
                .name()
                .unwrap_or("unknown")
                .to_string(),
            color_space: self
                .decoder
                .color_space()
                .name()
                .unwrap_or("unknown")
                .to_string(),
            color_primaries: self
                .decoder
                .color_primaries()
                .name()
                .unwrap_or("unknown")
                .to_string(),
        }
    }

    /// Feed `packet` (or end-of-stream when `None`) and hand every ready frame to `on_frame`.
    ///
    /// Returns `Break` when `on_frame` asked to stop. "Needs more input" and end-of-stream are
    /// not errors.
    pub(crate) fn receive_frames<F>(
        &mut self,
        packet: Option<&Packet>,
        mut on_frame: F,
    ) -> MediaResult<ControlFlow<()>>
    where
        F: FnMut(&frame::Video) -> MediaResult<ControlFlow<()>>,
    {
        let sent = match packet {
            Some(p) => self.decoder.send_packet(p),
            None => self.decoder.send_eof(),
        };
        match sent {
            Ok(()) | Err(ffmpeg_next::Error::Eof) => {}
            Err(e) if is_again(&e) => {}
            Err(e) => {
                return Err(MediaError::decode(format!(
                    "stream {}: failed to send packet: {e}",
                    self.index
                )));
            }
        }

        let mut decoded = frame::Video::empty();
        loop {
            match self.decoder.receive_frame(&mut decoded) {
                Ok(()) => {
                    if on_frame(&decoded)?.is_break() {
                        return Ok(ControlFlow::Break(()));
                    }
                }
                Err(ffmpeg_next::Error::Eof) => break,
                Err(e) if is_again(&e) => break,
                Err(e) => {
                    return Err(MediaError::decode(format!(
                        "stream {}: failed to decode frame: {e}",
                        self.index
                    )));
                }
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    /// Drop buffered reference frames; required before decoding from a new position.
    pub(crate) fn flush_buffers(&mut self) {
        self.decoder.flush();
    }
}

fn frames_from_duration(duration: i64, time_base: Rational, frame_rate: Rational) -> Option<i64> {
    if duration <= 0 || duration == ffmpeg_next::ffi::AV_NOPTS_VALUE {
        return None;
    }
    let num = i128::from(time_base.num) * i128::from(frame_rate.num);
    let den = i128::from(time_base.den) * i128::from(frame_rate.den);
    let frames = mul_div_round(i128::from(duration), num, den);
    (frames > 0).then(|| frames.min(i128::from(i64::MAX)) as i64)
}

fn is_again(err: &ffmpeg_next::Error) -> bool {
    matches!(err, ffmpeg_next::Error::Other { errno } if *errno == EAGAIN)
}

#[cfg(test)]
#[path = "../../tests/unit/media/stream.rs"]
mod tests;
