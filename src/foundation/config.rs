use crate::foundation::error::{MediaError, MediaResult};

/// Default output pixel format: planar 32-bit float GBR, little endian.
pub const DEFAULT_OUTPUT_PIXEL_FORMAT: &str = "gbrpf32le";

/// Sizing and threading for the decoder and frame caches.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of open decoders retained.
    pub max_decoders: usize,
    /// Maximum number of decoded frames retained.
    pub max_frames: usize,
    /// Codec threads per decoder (`0` lets FFmpeg choose).
    pub decode_threads: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_decoders: 8,
            max_frames: 64,
            decode_threads: 0,
        }
    }
}

impl CacheConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> MediaResult<Self> {
        let cfg: Self = serde_json::from_str(json)
            .map_err(|e| MediaError::config(format!("cache config json parse failed: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject configurations that would make every cache lookup recompute.
    pub fn validate(&self) -> MediaResult<()> {
        if self.max_decoders == 0 {
            return Err(MediaError::config("max_decoders must be > 0"));
        }
        Ok(())
    }
}

/// Per-decoder configuration baked in at open time.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DecoderOptions {
    /// Filter graph description inserted between the decoder and the output format.
    ///
    /// Empty means pass-through (`null`).
    pub filter: String,
    /// FFmpeg name of the pixel format frames are converted to.
    pub output_pixel_format: String,
    /// Codec threads (`0` lets FFmpeg choose).
    pub threads: usize,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            filter: String::new(),
            output_pixel_format: DEFAULT_OUTPUT_PIXEL_FORMAT.to_string(),
            threads: 0,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/config.rs"]
mod tests;
