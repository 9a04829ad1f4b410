//! frameseek is a frame-accurate random-access decoding engine built on FFmpeg.
//!
//! Frames are addressed by a 1-based index and delivered as planar 32-bit float images:
//!
//! - Open a file with a [`Decoder`] and inspect its [`StreamHeader`]s
//! - Request any frame with [`Decoder::decode_frame`]
//! - Share decoders and frames between threads through [`DecoderCache`] and [`FrameCache`]
//! - Write frames back out with the [`Encoder`]
#![deny(missing_docs)]

/// Decoder and frame caches.
pub mod cache;
/// Encoding and muxing.
pub mod encode;
/// Configuration, errors, logging and rational arithmetic.
pub mod foundation;
/// Decoding and filtering.
pub mod media;
/// Synthetic test frames.
pub mod pattern;

pub use crate::foundation::config::{CacheConfig, DEFAULT_OUTPUT_PIXEL_FORMAT, DecoderOptions};
pub use crate::foundation::core::Rational;
pub use crate::foundation::error::{MediaError, MediaResult};
pub use crate::foundation::log::{LogLevel, LogSink, Logger};

pub use crate::cache::{
    CacheEntry, CancelToken, DecoderCache, DecoderCacheKey, FrameCache, FrameCacheKey, LruCache,
};
pub use crate::encode::{
    CodecSettings, ColorMetadata, Encoder, EncoderOptions, FrameSink, InMemorySink,
    ProResProfile, SinkConfig,
};
pub use crate::media::decoder::{Decoder, StreamSelector};
pub use crate::media::filter::{FilterConfig, FilterPipeline};
pub use crate::media::frame::{Channel, DecodedFrame, PixelData, PixelFormat, comp_pixel_data};
pub use crate::media::stream::{StreamHeader, StreamTiming};
pub use crate::pattern::TestPattern;
