//! Decoder and frame caches with at-most-one computation per key.

/// Cooperative cancellation flag.
pub mod cancel;
/// Opened decoders keyed by file, filter and output format.
pub mod decoders;
/// Decoded frames keyed by decoder, stream and frame number.
pub mod frames;
/// Generic LRU with in-flight deduplication.
pub mod lru;

pub use cancel::CancelToken;
pub use decoders::{DecoderCache, DecoderCacheKey};
pub use frames::{FrameCache, FrameCacheKey};
pub use lru::{CacheEntry, LruCache};
