use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use ffmpeg_next::{
    Dictionary, codec, encoder, format, format::Pixel, frame, packet::Packet, util::error::EAGAIN,
};

use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::core::Rational;
use crate::foundation::error::{MediaError, MediaResult};
use crate::media::filter::{FilterConfig, FilterPipeline};
use crate::media::frame::DecodedFrame;

/// `FF_QP2LAMBDA`: scale from a quantiser to the codec's global quality.
const QP2LAMBDA: u32 = 118;

const X264_PRESETS: &[&str] = &[
    "ultrafast",
    "superfast",
    "veryfast",
    "faster",
    "fast",
    "medium",
    "slow",
    "slower",
    "veryslow",
    "placebo",
];

/// ProRes flavour written by `prores_ks`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ProResProfile {
    /// 422 Proxy.
    Proxy,
    /// 422 LT.
    Lt,
    /// 422.
    #[default]
    Standard,
    /// 422 HQ.
    Hq,
    /// 4444 with alpha.
    #[serde(rename = "4444")]
    P4444,
    /// 4444 XQ with alpha.
    #[serde(rename = "4444xq")]
    P4444Xq,
}

impl ProResProfile {
    fn ffmpeg_value(self) -> &'static str {
        match self {
            Self::Proxy => "0",
            Self::Lt => "1",
            Self::Standard => "2",
            Self::Hq => "3",
            Self::P4444 => "4",
            Self::P4444Xq => "5",
        }
    }

    fn has_alpha(self) -> bool {
        matches!(self, Self::P4444 | Self::P4444Xq)
    }
}

/// Codec and its quality knobs.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "codec", rename_all = "lowercase")]
pub enum CodecSettings {
    /// Apple ProRes through `prores_ks` (intra-only).
    ProRes {
        /// Flavour.
        profile: ProResProfile,
    },
    /// H.264 through `libx264`.
    H264 {
        /// Constant rate factor, `0..=51`.
        crf: u8,
        /// x264 speed preset name.
        preset: String,
    },
    /// Motion JPEG (intra-only).
    Mjpeg {
        /// Quantiser, `2..=31`; lower is better.
        quality: u8,
    },
}

impl Default for CodecSettings {
    fn default() -> Self {
        Self::ProRes {
            profile: ProResProfile::default(),
        }
    }
}

impl CodecSettings {
    /// FFmpeg encoder name.
    pub fn encoder_name(&self) -> &'static str {
        match self {
            Self::ProRes { .. } => "prores_ks",
            Self::H264 { .. } => "libx264",
            Self::Mjpeg { .. } => "mjpeg",
        }
    }

    /// Pixel format frames are converted to before encoding.
    pub fn pixel_format(&self) -> Pixel {
        match self {
            Self::ProRes { profile } if profile.has_alpha() => Pixel::YUVA444P10LE,
            Self::ProRes { .. } => Pixel::YUV422P10LE,
            Self::H264 { .. } => Pixel::YUV420P,
            Self::Mjpeg { .. } => Pixel::YUVJ444P,
        }
    }

    /// Reject out-of-range quality values and unknown presets.
    pub fn validate(&self) -> MediaResult<()> {
        match self {
            Self::ProRes { .. } => Ok(()),
            Self::H264 { crf, preset } => {
                if *crf > 51 {
                    return Err(MediaError::config(format!("crf must be 0..=51, got {crf}")));
                }
                if !X264_PRESETS.contains(&preset.as_str()) {
                    return Err(MediaError::config(format!("unknown x264 preset '{preset}'")));
                }
                Ok(())
            }
            Self::Mjpeg { quality } => {
                if !(2..=31).contains(quality) {
                    return Err(MediaError::config(format!(
                        "mjpeg quality must be 2..=31, got {quality}"
                    )));
                }
                Ok(())
            }
        }
    }

    fn options(&self) -> Dictionary<'static> {
        let mut opts = Dictionary::new();
        match self {
            Self::ProRes { profile } => {
                opts.set("profile", profile.ffmpeg_value());
                opts.set("vendor", "apl0");
            }
            Self::H264 { crf, preset } => {
                opts.set("crf", &crf.to_string());
                opts.set("preset", preset);
            }
            Self::Mjpeg { quality } => {
                opts.set("flags", "+qscale");
                opts.set("global_quality", &(u32::from(*quality) * QP2LAMBDA).to_string());
            }
        }
        opts
    }
}

/// Colour tags written into the stream, as FFmpeg option values (`bt709`, `tv`, ...).
///
/// `None` leaves FFmpeg's default. Unknown names are rejected when the encoder opens.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ColorMetadata {
    /// `color_range`.
    pub range: Option<String>,
    /// `colorspace` (matrix coefficients).
    pub space: Option<String>,
    /// `color_primaries`.
    pub primaries: Option<String>,
    /// `color_trc` (transfer characteristics).
    pub transfer: Option<String>,
}

impl ColorMetadata {
    fn apply(&self, opts: &mut Dictionary<'_>) {
        let tags = [
            ("color_range", &self.range),
            ("colorspace", &self.space),
            ("color_primaries", &self.primaries),
            ("color_trc", &self.transfer),
        ];
        for (key, value) in tags {
            if let Some(value) = value {
                opts.set(key, value);
            }
        }
    }
}

/// Everything needed to open an [`Encoder`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncoderOptions {
    /// Output file; the container is chosen from its extension.
    pub path: PathBuf,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frames per second.
    pub frame_rate: Rational,
    /// Codec and quality.
    pub codec: CodecSettings,
    /// Colour tags.
    pub color: ColorMetadata,
    /// Filter description applied before the conversion to the codec's pixel format.
    pub filter: String,
    /// Replace an existing output file.
    pub overwrite: bool,
    /// Codec threads (`0` lets FFmpeg choose).
    pub threads: usize,
}

impl EncoderOptions {
    /// ProRes 422 into `path` with no filter, overwriting.
    pub fn new(path: impl Into<PathBuf>, width: u32, height: u32, frame_rate: Rational) -> Self {
        Self {
            path: path.into(),
            width,
            height,
            frame_rate,
            codec: CodecSettings::default(),
            color: ColorMetadata::default(),
            filter: String::new(),
            overwrite: true,
            threads: 0,
        }
    }

    /// Replace the codec settings.
    pub fn with_codec(mut self, codec: CodecSettings) -> Self {
        self.codec = codec;
        self
    }

    /// Check geometry, rate and codec parameters.
    pub fn validate(&self) -> MediaResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(MediaError::validation("encode width/height must be non-zero"));
        }
        if !self.frame_rate.is_valid_positive() {
            return Err(MediaError::validation(format!(
                "encode frame rate must be positive, got {}",
                self.frame_rate
            )));
        }
        if matches!(self.codec, CodecSettings::H264 { .. })
            && (!self.width.is_multiple_of(2) || !self.height.is_multiple_of(2))
        {
            return Err(MediaError::validation(
                "encode width/height must be even (required for yuv420p output)",
            ));
        }
        self.codec.validate()
    }
}

/// Create the parent directory of `path` if needed.
pub fn ensure_parent_dir(path: &Path) -> MediaResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

struct EncodeState {
    output: format::context::Output,
    encoder: encoder::video::Encoder,
    filter: Option<FilterPipeline>,
    encoder_time_base: ffmpeg_next::Rational,
    stream_time_base: ffmpeg_next::Rational,
    next_pts: i64,
}

// SAFETY: the muxer, encoder and filter graph are only reached through `&mut Encoder`.
unsafe impl Send for EncodeState {}

/// Planar float frames in, encoded packets muxed to a file out.
///
/// Dropping an encoder releases every native resource; only [`finish`](Self::finish) writes
/// the trailer that makes the file playable.
pub struct Encoder {
    options: EncoderOptions,
    state: Option<EncodeState>,
    frames_written: u64,
}

impl std::fmt::Debug for Encoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encoder")
            .field("options", &self.options)
            .field("open", &self.state.is_some())
            .field("frames_written", &self.frames_written)
            .finish()
    }
}

impl Encoder {
    /// Encoder that opens its output on [`FrameSink::begin`].
    pub fn new(options: EncoderOptions) -> Self {
        Self {
            options,
            state: None,
            frames_written: 0,
        }
    }

    /// Validate `options`, create the output file and write the container header.
    pub fn open(options: EncoderOptions) -> MediaResult<Self> {
        let mut enc = Self::new(options);
        enc.start()?;
        Ok(enc)
    }

    /// Options this encoder was created with.
    pub fn options(&self) -> &EncoderOptions {
        &self.options
    }

    /// `true` between a successful open and [`finish`](Self::finish).
    pub fn is_open(&self) -> bool {
        self.state.is_some()
    }

    /// Number of frames accepted so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    #[tracing::instrument(skip(self), fields(path = %self.options.path.display()))]
    fn start(&mut self) -> MediaResult<()> {
        if self.state.is_some() {
            return Err(MediaError::encode("encoder is already open"));
        }
        let opts = &self.options;
        opts.validate()?;
        ensure_parent_dir(&opts.path)?;
        if !opts.overwrite && opts.path.exists() {
            return Err(MediaError::validation(format!(
                "output file '{}' already exists",
                opts.path.display()
            )));
        }
        crate::media::init_ffmpeg()?;

        let encoder_name = opts.codec.encoder_name();
        let codec = encoder::find_by_name(encoder_name).ok_or_else(|| {
            MediaError::config(format!("FFmpeg build lacks the '{encoder_name}' encoder"))
        })?;

        let mut output = format::output(&opts.path)
            .map_err(|e| MediaError::encode(format!("{}: {e}", opts.path.display())))?;
        let global_header = output
            .format()
            .flags()
            .contains(format::Flags::GLOBAL_HEADER);

        let mut ctx = codec::context::Context::new_with_codec(codec);
        ctx.set_threading(codec::threading::Config {
            kind: codec::threading::Type::Frame,
            count: opts.threads,
        });
        let mut video = ctx
            .encoder()
            .video()
            .map_err(|e| MediaError::encode(format!("{encoder_name}: {e}")))?;
        let time_base = opts.frame_rate.invert();
        video.set_width(opts.width);
        video.set_height(opts.height);
        video.set_format(opts.codec.pixel_format());
        video.set_time_base(time_base);
        video.set_frame_rate(Some(opts.frame_rate));
        if global_header {
            video.set_flags(codec::Flags::GLOBAL_HEADER);
        }

        let mut dict = opts.codec.options();
        opts.color.apply(&mut dict);
        let encoder = video.open_with(dict).map_err(|e| {
            MediaError::config(format!("failed to open encoder '{encoder_name}': {e}"))
        })?;

        let mut stream = output
            .add_stream(codec)
            .map_err(|e| MediaError::encode(format!("failed to add stream: {e}")))?;
        stream.set_parameters(&encoder);
        stream.set_time_base(time_base);

        output
            .write_header()
            .map_err(|e| MediaError::encode(format!("failed to write header: {e}")))?;
        let stream_time_base = output
            .stream(0)
            .map(|s| s.time_base())
            .ok_or_else(|| MediaError::encode("output stream vanished after header"))?;

        tracing::debug!(encoder = encoder_name, "encoder opened");
        self.state = Some(EncodeState {
            output,
            encoder,
            filter: None,
            encoder_time_base: time_base.into(),
            stream_time_base,
            next_pts: 0,
        });
        self.frames_written = 0;
        Ok(())
    }

    /// Encode one frame. Its geometry must match the options.
    pub fn write(&mut self, frame: &DecodedFrame) -> MediaResult<()> {
        if frame.width() != self.options.width || frame.height() != self.options.height {
            return Err(MediaError::validation(format!(
                "frame is {}x{}, encoder expects {}x{}",
                frame.width(),
                frame.height(),
                self.options.width,
                self.options.height
            )));
        }
        let mut video = frame.to_video()?;
        let options = &self.options;
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| MediaError::encode("encoder is not open"))?;

        if state.filter.is_none() {
            state.filter = Some(FilterPipeline::configure(FilterConfig {
                width: options.width,
                height: options.height,
                input_format: video.format(),
                time_base: options.frame_rate.invert(),
                sample_aspect_ratio: frame.pixel_aspect_ratio,
                output_format: pixel_name(options.codec.pixel_format())?,
                description: options.filter.clone(),
            })?);
        }

        video.set_pts(Some(state.next_pts));
        state.next_pts += 1;
        state.filter_and_encode(Some(&video))?;
        self.frames_written += 1;
        Ok(())
    }

    /// Flush the filter and encoder, then write the container trailer.
    #[tracing::instrument(skip(self), fields(path = %self.options.path.display()))]
    pub fn finish(&mut self) -> MediaResult<()> {
        let mut state = self
            .state
            .take()
            .ok_or_else(|| MediaError::encode("encoder is not open"))?;
        if state.filter.is_some() {
            state.filter_and_encode(None)?;
        }
        state
            .encoder
            .send_eof()
            .map_err(|e| MediaError::encode(format!("failed to flush encoder: {e}")))?;
        state.drain_packets()?;
        state
            .output
            .write_trailer()
            .map_err(|e| MediaError::encode(format!("failed to write trailer: {e}")))?;
        tracing::debug!(frames = self.frames_written, "encoder finished");
        Ok(())
    }
}

impl EncodeState {
    fn filter_and_encode(&mut self, input: Option<&frame::Video>) -> MediaResult<()> {
        let Self {
            output,
            encoder,
            filter,
            encoder_time_base,
            stream_time_base,
            ..
        } = self;
        let Some(filter) = filter.as_mut() else {
            return Ok(());
        };
        filter.process(input, |filtered| {
            encoder
                .send_frame(filtered)
                .map_err(|e| MediaError::encode(format!("failed to send frame: {e}")))?;
            drain(encoder, output, *encoder_time_base, *stream_time_base)?;
            Ok(ControlFlow::Continue(()))
        })?;
        Ok(())
    }

    fn drain_packets(&mut self) -> MediaResult<()> {
        drain(
            &mut self.encoder,
            &mut self.output,
            self.encoder_time_base,
            self.stream_time_base,
        )
    }
}

fn drain(
    encoder: &mut encoder::video::Encoder,
    output: &mut format::context::Output,
    encoder_time_base: ffmpeg_next::Rational,
    stream_time_base: ffmpeg_next::Rational,
) -> MediaResult<()> {
    let mut packet = Packet::empty();
    loop {
        match encoder.receive_packet(&mut packet) {
            Ok(()) => {
                packet.set_stream(0);
                if packet.duration() <= 0 {
                    packet.set_duration(1);
                }
                packet.rescale_ts(encoder_time_base, stream_time_base);
                packet
                    .write_interleaved(output)
                    .map_err(|e| MediaError::encode(format!("failed to write packet: {e}")))?;
            }
            Err(ffmpeg_next::Error::Eof) => return Ok(()),
            Err(ffmpeg_next::Error::Other { errno }) if errno == EAGAIN => return Ok(()),
            Err(e) => return Err(MediaError::encode(format!("failed to encode: {e}"))),
        }
    }
}

fn pixel_name(format: Pixel) -> MediaResult<String> {
    format
        .descriptor()
        .map(|d| d.name().to_string())
        .ok_or_else(|| MediaError::config(format!("pixel format {format:?} has no name")))
}

impl FrameSink for Encoder {
    fn begin(&mut self, cfg: SinkConfig) -> MediaResult<()> {
        cfg.validate()?;
        self.options.width = cfg.width;
        self.options.height = cfg.height;
        self.options.frame_rate = cfg.frame_rate;
        self.start()
    }

    fn push_frame(&mut self, _frame_nb: i64, frame: &DecodedFrame) -> MediaResult<()> {
        self.write(frame)
    }

    fn end(&mut self) -> MediaResult<()> {
        self.finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/encoder.rs"]
mod tests;
