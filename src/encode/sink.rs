use crate::foundation::core::Rational;
use crate::foundation::error::{MediaError, MediaResult};
use crate::media::frame::DecodedFrame;

/// Geometry and rate announced to a [`FrameSink`] before the first frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SinkConfig {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frames per second.
    pub frame_rate: Rational,
}

impl SinkConfig {
    /// Reject zero geometry or a non-positive rate.
    pub fn validate(&self) -> MediaResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(MediaError::validation("sink width/height must be non-zero"));
        }
        if !self.frame_rate.is_valid_positive() {
            return Err(MediaError::validation(format!(
                "sink frame rate must be positive, got {}",
                self.frame_rate
            )));
        }
        Ok(())
    }
}

/// Consumer of planar float frames in presentation order.
///
/// `push_frame` is called with strictly increasing one-based frame numbers.
pub trait FrameSink: Send {
    /// Called once before any frames are pushed.
    fn begin(&mut self, cfg: SinkConfig) -> MediaResult<()>;
    /// Push one frame.
    fn push_frame(&mut self, frame_nb: i64, frame: &DecodedFrame) -> MediaResult<()>;
    /// Called once after the last frame is pushed.
    fn end(&mut self) -> MediaResult<()>;
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    frames: Vec<(i64, DecodedFrame)>,
    ended: bool,
}

impl InMemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<SinkConfig> {
        self.cfg
    }

    /// Captured frames in push order.
    pub fn frames(&self) -> &[(i64, DecodedFrame)] {
        &self.frames
    }

    /// `true` once `end` was called.
    pub fn is_ended(&self) -> bool {
        self.ended
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> MediaResult<()> {
        cfg.validate()?;
        self.cfg = Some(cfg);
        self.frames.clear();
        self.ended = false;
        Ok(())
    }

    fn push_frame(&mut self, frame_nb: i64, frame: &DecodedFrame) -> MediaResult<()> {
        if let Some(&(last, _)) = self.frames.last()
            && frame_nb <= last
        {
            return Err(MediaError::validation(format!(
                "frame {frame_nb} pushed after frame {last}"
            )));
        }
        self.frames.push((frame_nb, frame.clone()));
        Ok(())
    }

    fn end(&mut self) -> MediaResult<()> {
        self.ended = true;
        Ok(())
    }
}

/// Push `frames` through `sink`: `begin`, every frame in order, then `end`.
pub fn write_all<'a, S>(
    sink: &mut S,
    cfg: SinkConfig,
    frames: impl IntoIterator<Item = &'a DecodedFrame>,
) -> MediaResult<()>
where
    S: FrameSink + ?Sized,
{
    sink.begin(cfg)?;
    for (i, frame) in frames.into_iter().enumerate() {
        sink.push_frame(i as i64 + 1, frame)?;
    }
    sink.end()
}

#[cfg(test)]
#[path = "../../tests/unit/encode/sink.rs"]
mod tests;
