/// Convenience result type used across frameseek.
pub type MediaResult<T> = Result<T, MediaError>;

/// Top-level error taxonomy used by decoder, cache and encoder APIs.
#[derive(thiserror::Error, Debug)]
pub enum MediaError {
    /// The container could not be opened or its streams read.
    #[error("open error: {0}")]
    Open(String),

    /// Bad filter description, unknown pixel-format name or out-of-range codec parameter.
    #[error("configuration error: {0}")]
    Config(String),

    /// Read, seek or decode failure for a single frame request.
    #[error("decode error: {0}")]
    Decode(String),

    /// Failure while encoding or muxing output frames.
    #[error("encode error: {0}")]
    Encode(String),

    /// A frame layout the planar float model cannot represent.
    #[error("unsupported pixel format: {0}")]
    UnsupportedFormat(String),

    /// Requested frame number lies outside `[1, frame_count]`.
    #[error("frame {frame} is out of range (stream has {frame_count} frames)")]
    OutOfRange {
        /// Requested one-based frame number.
        frame: i64,
        /// Frame count reported by the stream.
        frame_count: i64,
    },

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// Invalid caller-provided data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MediaError {
    /// Build a [`MediaError::Open`] value.
    pub fn open(msg: impl Into<String>) -> Self {
        Self::Open(msg.into())
    }

    /// Build a [`MediaError::Config`] value.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Build a [`MediaError::Decode`] value.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Build a [`MediaError::Encode`] value.
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Build a [`MediaError::UnsupportedFormat`] value.
    pub fn unsupported_format(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat(msg.into())
    }

    /// Build a [`MediaError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// `true` for [`MediaError::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// `Other` is cloned as its rendered context chain.
impl Clone for MediaError {
    fn clone(&self) -> Self {
        match self {
            Self::Open(m) => Self::Open(m.clone()),
            Self::Config(m) => Self::Config(m.clone()),
            Self::Decode(m) => Self::Decode(m.clone()),
            Self::Encode(m) => Self::Encode(m.clone()),
            Self::UnsupportedFormat(m) => Self::UnsupportedFormat(m.clone()),
            Self::OutOfRange { frame, frame_count } => Self::OutOfRange {
                frame: *frame,
                frame_count: *frame_count,
            },
            Self::Cancelled => Self::Cancelled,
            Self::Validation(m) => Self::Validation(m.clone()),
            Self::Other(e) => Self::Other(anyhow::anyhow!("{e:#}")),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
