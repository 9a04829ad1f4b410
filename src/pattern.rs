//! Deterministic synthetic frames for tests, benchmarks and `frameseek synth`.

use crate::foundation::error::{MediaError, MediaResult};
use crate::media::frame::{Channel, DecodedFrame, PixelFormat};

/// Per-frame phase advance of each colour channel.
///
/// Red changes quickly so neighbouring frames differ clearly; green and blue change slowly so
/// frames far apart never repeat within a few hundred frames.
const STEP_R: f32 = 0.05;
const STEP_G: f32 = 0.0031;
const STEP_B: f32 = 0.011;

/// Smooth gradient whose phase depends on the frame index.
///
/// Values stay within `[0.1, 0.9]` so lossy codecs never clip them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TestPattern {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Layout of generated frames.
    pub pix_fmt: PixelFormat,
}

/// Deviation of one channel from the pattern.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ChannelError {
    /// Mean absolute error.
    pub mean_abs: f32,
    /// Largest absolute error.
    pub max_abs: f32,
}

impl TestPattern {
    /// RGB pattern of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pix_fmt: PixelFormat::Rgb,
        }
    }

    /// Value of `channel` at (`x`, `y`) in frame `index` (zero-based).
    pub fn expected(&self, index: i64, x: u32, y: u32, channel: Channel) -> f32 {
        let u = (x as f32 + 0.5) / self.width.max(1) as f32;
        let v = (y as f32 + 0.5) / self.height.max(1) as f32;
        let i = index as f32;
        let phase = match channel {
            Channel::R | Channel::Gray => 0.5 * u + STEP_R * i,
            Channel::G => 0.5 * v + STEP_G * i,
            Channel::B => 0.25 * (u + v) + STEP_B * i,
            Channel::A => return 1.0,
        };
        0.1 + 0.8 * triangle(phase)
    }

    /// Generate frame `index` (zero-based); `frame_nb` is set to `index + 1`.
    pub fn frame(&self, index: i64) -> MediaResult<DecodedFrame> {
        let plane_len = self.width as usize * self.height as usize;
        let mut buf = Vec::with_capacity(plane_len * self.pix_fmt.channel_count());
        for &channel in self.pix_fmt.channels() {
            for y in 0..self.height {
                for x in 0..self.width {
                    buf.push(self.expected(index, x, y, channel));
                }
            }
        }
        let mut frame = DecodedFrame::new(self.width, self.height, self.pix_fmt, buf)?;
        frame.frame_nb = index + 1;
        frame.key_frame = true;
        Ok(frame)
    }

    /// Per-channel error of `frame` against pattern frame `index`, in plane order.
    pub fn compare(
        &self,
        index: i64,
        frame: &DecodedFrame,
    ) -> MediaResult<Vec<(Channel, ChannelError)>> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(MediaError::validation(format!(
                "frame is {}x{}, pattern is {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            )));
        }
        let mut out = Vec::with_capacity(frame.pix_fmt().channel_count());
        for &channel in frame.pix_fmt().channels() {
            let data = frame.channel(channel);
            let mut sum = 0.0f64;
            let mut max = 0.0f32;
            for (i, &got) in data.as_slice().iter().enumerate() {
                let x = (i % self.width as usize) as u32;
                let y = (i / self.width as usize) as u32;
                let err = (got - self.expected(index, x, y, channel)).abs();
                sum += f64::from(err);
                max = max.max(err);
            }
            let mean_abs = if data.is_empty() {
                0.0
            } else {
                (sum / data.len() as f64) as f32
            };
            out.push((
                channel,
                ChannelError {
                    mean_abs,
                    max_abs: max,
                },
            ));
        }
        Ok(out)
    }
}

/// Period-1 triangle wave in `[0, 1]`.
fn triangle(t: f32) -> f32 {
    let f = t.rem_euclid(1.0);
    1.0 - (2.0 * f - 1.0).abs()
}

#[cfg(test)]
#[path = "../tests/unit/pattern.rs"]
mod tests;
