//! FFmpeg-backed decoding: streams, filter pipelines, the seek state machine and the planar
//! float frame model.

/// Container-level decoder and frame-accurate seeking.
pub mod decoder;
/// `buffer -> filters -> buffersink` graphs.
pub mod filter;
/// Planar float frames and channel views.
pub mod frame;
/// Per-stream codec state and timestamp arithmetic.
pub mod stream;

use crate::foundation::error::{MediaError, MediaResult};

pub(crate) fn init_ffmpeg() -> MediaResult<()> {
    ffmpeg_next::init().map_err(|e| MediaError::open(format!("ffmpeg init failed: {e}")))
}
