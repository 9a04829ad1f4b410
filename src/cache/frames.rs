use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;

use crate::cache::CancelToken;
use crate::cache::decoders::{DecoderCache, DecoderCacheKey};
use crate::cache::lru::{CacheEntry, LruCache};
use crate::foundation::config::CacheConfig;
use crate::foundation::error::MediaError;
use crate::media::decoder::{Decoder, StreamSelector};
use crate::media::frame::DecodedFrame;

/// Identity of one decoded frame.
///
/// [`StreamSelector::Best`] is resolved to the stream index it denotes before the frame cache
/// is consulted, so `Best` and the matching `Index` share one entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FrameCacheKey {
    /// Decoder the frame comes from.
    pub decoder: DecoderCacheKey,
    /// Video stream within the container.
    pub stream: StreamSelector,
    /// One-based frame number.
    pub frame_nb: i64,
}

impl FrameCacheKey {
    /// Frame `frame_nb` of the selected stream.
    pub fn new(decoder: DecoderCacheKey, stream: StreamSelector, frame_nb: i64) -> Self {
        Self {
            decoder,
            stream,
            frame_nb,
        }
    }
}

/// Bounded cache of decoded frames backed by a shared [`DecoderCache`].
///
/// Sized independently of the decoder cache. A decoder-level error becomes the error of every
/// frame requested from it.
#[derive(Debug)]
pub struct FrameCache {
    entries: LruCache<FrameCacheKey, DecodedFrame>,
    decoders: Arc<DecoderCache>,
}

impl Default for FrameCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

impl FrameCache {
    /// Frame cache with its own decoder cache, both sized from `config`.
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_decoders(config.max_frames, Arc::new(DecoderCache::new(config)))
    }

    /// Frame cache retaining `max_frames` frames, opening decoders through `decoders`.
    pub fn with_decoders(max_frames: usize, decoders: Arc<DecoderCache>) -> Self {
        Self {
            entries: LruCache::new(max_frames),
            decoders,
        }
    }

    /// The decoder cache frames are decoded through.
    pub fn decoders(&self) -> &Arc<DecoderCache> {
        &self.decoders
    }

    /// Frame for `key`, decoding it on a miss.
    #[tracing::instrument(
        skip(self, cancel),
        fields(file = %key.decoder.filename.display(), stream = %key.stream, frame = key.frame_nb)
    )]
    pub fn get(&self, key: &FrameCacheKey, cancel: &CancelToken) -> CacheEntry<DecodedFrame> {
        let key = match self.decoders.get(&key.decoder, cancel) {
            CacheEntry::Value(decoder) => resolve_best(key, &decoder),
            CacheEntry::Error(_) => Cow::Borrowed(key),
        };
        let key = key.as_ref();
        self.entries.get_or_compute(key, cancel, || {
            if cancel.is_cancelled() {
                return Err(MediaError::Cancelled);
            }
            let decoder = match self.decoders.get(&key.decoder, cancel) {
                CacheEntry::Value(decoder) => decoder,
                CacheEntry::Error(e) => return Err(MediaError::clone(&e)),
            };
            decoder.decode_frame(key.stream, key.frame_nb, cancel)
        })
    }

    /// Forget `key`.
    pub fn erase(&self, key: &FrameCacheKey) {
        self.entries.erase(key);
        if let Some(decoder) = self.decoders.cached(&key.decoder) {
            self.entries.erase(&resolve_best(key, &decoder));
        }
    }

    /// Forget every decoder and frame that reads `filename`, so the next request reopens it.
    pub fn refresh(&self, filename: &Path) {
        self.decoders.erase_file(filename);
        self.entries.erase_where(|k| k.decoder.filename == filename);
    }

    /// Forget every frame. The decoder cache is left alone.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Change the capacity, evicting immediately when shrinking.
    pub fn set_max_frames(&self, max: usize) {
        self.entries.set_capacity(max);
    }

    /// Maximum number of retained frames.
    pub fn max_frames(&self) -> usize {
        self.entries.capacity()
    }

    /// Number of retained entries, errors included.
    pub fn num_frames(&self) -> usize {
        self.entries.len()
    }
}

/// `key` with [`StreamSelector::Best`] replaced by the stream `decoder` picked.
fn resolve_best<'a>(key: &'a FrameCacheKey, decoder: &Decoder) -> Cow<'a, FrameCacheKey> {
    match (key.stream, decoder.best_stream_index()) {
        (StreamSelector::Best, Some(index)) => Cow::Owned(FrameCacheKey {
            stream: StreamSelector::Index(index),
            ..key.clone()
        }),
        _ => Cow::Borrowed(key),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache/frames.rs"]
mod tests;
