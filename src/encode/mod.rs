//! Encode planar float frames and mux them into a file.

/// Native FFmpeg encoder and muxer.
pub mod encoder;
/// Generic frame sink trait and built-in sinks.
pub mod sink;

pub use encoder::{
    CodecSettings, ColorMetadata, Encoder, EncoderOptions, ProResProfile, ensure_parent_dir,
};
pub use sink::{FrameSink, InMemorySink, SinkConfig, write_all};
