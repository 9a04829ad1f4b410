use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::CancelToken;
use crate::cache::lru::{CacheEntry, LruCache};
use crate::foundation::config::{CacheConfig, DEFAULT_OUTPUT_PIXEL_FORMAT, DecoderOptions};
use crate::foundation::error::MediaError;
use crate::foundation::log::Logger;
use crate::media::decoder::Decoder;

/// Identity of an opened decoder: the file plus everything baked in at open time.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DecoderCacheKey {
    /// Container path.
    pub filename: PathBuf,
    /// Filter graph description.
    pub filter: String,
    /// Output pixel-format name.
    pub output_pixel_format: String,
}

impl DecoderCacheKey {
    /// Key for `filename` with a pass-through filter and the default output format.
    pub fn new(filename: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
            filter: String::new(),
            output_pixel_format: DEFAULT_OUTPUT_PIXEL_FORMAT.to_string(),
        }
    }

    /// Replace the filter description.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Replace the output pixel-format name.
    pub fn with_output_pixel_format(mut self, name: impl Into<String>) -> Self {
        self.output_pixel_format = name.into();
        self
    }
}

/// Bounded pool of opened decoders shared across threads.
///
/// Open failures are cached as errors until the key is erased or the cache cleared.
#[derive(Debug)]
pub struct DecoderCache {
    entries: LruCache<DecoderCacheKey, Decoder>,
    threads: usize,
    logger: Logger,
}

impl Default for DecoderCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

impl DecoderCache {
    /// Cache sized from `config`, logging through the installed logger.
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_logger(config, crate::foundation::log::installed())
    }

    /// Cache sized from `config`, logging through `logger`.
    pub fn with_logger(config: &CacheConfig, logger: Logger) -> Self {
        Self {
            entries: LruCache::new(config.max_decoders),
            threads: config.decode_threads,
            logger,
        }
    }

    /// Decoder for `key`, opening it on a miss.
    #[tracing::instrument(skip(self, cancel), fields(file = %key.filename.display()))]
    pub fn get(&self, key: &DecoderCacheKey, cancel: &CancelToken) -> CacheEntry<Decoder> {
        self.entries.get_or_compute(key, cancel, || {
            if cancel.is_cancelled() {
                return Err(MediaError::Cancelled);
            }
            let options = DecoderOptions {
                filter: key.filter.clone(),
                output_pixel_format: key.output_pixel_format.clone(),
                threads: self.threads,
            };
            let decoder = Decoder::open_with_logger(&key.filename, options, self.logger.clone());
            if let Err(e) = &decoder {
                self.logger.error(format!("{}: {e}", key.filename.display()));
            }
            decoder
        })
    }

    /// Decoder already open for `key`, without opening one on a miss.
    pub fn cached(&self, key: &DecoderCacheKey) -> Option<Arc<Decoder>> {
        self.entries.peek(key)?.value().cloned()
    }

    /// Forget `key`.
    pub fn erase(&self, key: &DecoderCacheKey) {
        self.entries.erase(key);
    }

    /// Forget every decoder of `filename`, whatever its filter or output format.
    pub fn erase_file(&self, filename: &Path) {
        self.entries.erase_where(|k| k.filename == filename);
    }

    /// Forget everything.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Change the capacity, evicting immediately when shrinking.
    pub fn set_max_decoders(&self, max: usize) {
        self.entries.set_capacity(max);
    }

    /// Maximum number of retained decoders.
    pub fn max_decoders(&self) -> usize {
        self.entries.capacity()
    }

    /// Number of retained entries, errors included.
    pub fn num_decoders(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache/decoders.rs"]
mod tests;
