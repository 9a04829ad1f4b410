use std::ops::ControlFlow;
use std::str::FromStr;

use ffmpeg_next::{filter, format::Pixel, frame, util::error::EAGAIN};

use crate::foundation::core::Rational;
use crate::foundation::error::{MediaError, MediaResult};

/// Filter applied when the description is empty.
pub const PASS_THROUGH: &str = "null";

/// Fixed geometry and formats a [`FilterPipeline`] is built for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterConfig {
    /// Input width in pixels.
    pub width: u32,
    /// Input height in pixels.
    pub height: u32,
    /// Input pixel format.
    pub input_format: Pixel,
    /// Input time base; also the output time base.
    pub time_base: Rational,
    /// Input sample aspect ratio.
    pub sample_aspect_ratio: Rational,
    /// FFmpeg name of the pixel format the sink accepts.
    pub output_format: String,
    /// Filter graph description between source and sink; empty means pass-through.
    pub description: String,
}

/// `buffer -> <description> -> buffersink` graph with one input and one output.
///
/// One frame in produces zero or more frames out. Passing `None` flushes the graph, after which
/// it must be [`reset`](Self::reset) before accepting more input.
pub struct FilterPipeline {
    config: FilterConfig,
    output_format: Pixel,
    graph: filter::Graph,
    dirty: bool,
}

impl std::fmt::Debug for FilterPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterPipeline")
            .field("config", &self.config)
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl FilterPipeline {
    /// Parse and validate the graph.
    ///
    /// Fails with [`MediaError::Config`] for an unknown output pixel format or a description
    /// FFmpeg cannot parse.
    pub fn configure(config: FilterConfig) -> MediaResult<Self> {
        let output_format = parse_pixel_format(&config.output_format)?;
        let graph = build_graph(&config, output_format)?;
        Ok(Self {
            config,
            output_format,
            graph,
            dirty: false,
        })
    }

    /// The configuration this pipeline was built from.
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Pixel format every output frame carries.
    pub fn output_format(&self) -> Pixel {
        self.output_format
    }

    /// `true` once any input (or a flush) went in since the last reset.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Rebuild the graph from scratch, discarding buffered frames and end-of-stream state.
    pub fn reset(&mut self) -> MediaResult<()> {
        self.graph = build_graph(&self.config, self.output_format)?;
        self.dirty = false;
        Ok(())
    }

    /// Push `input` (or flush when `None`) and hand every ready output frame to `on_output`.
    ///
    /// Stops pulling as soon as `on_output` breaks; remaining output stays buffered until the
    /// next reset.
    pub fn process<F>(
        &mut self,
        input: Option<&frame::Video>,
        mut on_output: F,
    ) -> MediaResult<ControlFlow<()>>
    where
        F: FnMut(&frame::Video) -> MediaResult<ControlFlow<()>>,
    {
        self.dirty = true;
        {
            let mut source = self
                .graph
                .get("in")
                .ok_or_else(|| MediaError::decode("filter graph lost its source"))?;
            let pushed = match input {
                Some(video) => source.source().add(video),
                None => source.source().flush(),
            };
            pushed.map_err(|e| MediaError::decode(format!("filter source rejected frame: {e}")))?;
        }

        let mut sink = self
            .graph
            .get("out")
            .ok_or_else(|| MediaError::decode("filter graph lost its sink"))?;
        let mut filtered = frame::Video::empty();
        loop {
            match sink.sink().frame(&mut filtered) {
                Ok(()) => {
                    if on_output(&filtered)?.is_break() {
                        return Ok(ControlFlow::Break(()));
                    }
                }
                Err(ffmpeg_next::Error::Eof) => break,
                Err(ffmpeg_next::Error::Other { errno }) if errno == EAGAIN => break,
                Err(e) => {
                    return Err(MediaError::decode(format!(
                        "filter sink failed to produce frame: {e}"
                    )));
                }
            }
        }
        Ok(ControlFlow::Continue(()))
    }
}

/// Resolve an FFmpeg pixel-format name such as `gbrpf32le`.
pub fn parse_pixel_format(name: &str) -> MediaResult<Pixel> {
    match Pixel::from_str(name) {
        Ok(Pixel::None) | Err(_) => Err(MediaError::config(format!(
            "unknown pixel format '{name}'"
        ))),
        Ok(format) => Ok(format),
    }
}

fn pixel_format_name(format: Pixel) -> MediaResult<&'static str> {
    format
        .descriptor()
        .map(|d| d.name())
        .ok_or_else(|| MediaError::config(format!("pixel format {format:?} has no name")))
}

fn build_graph(config: &FilterConfig, output_format: Pixel) -> MediaResult<filter::Graph> {
    if !config.time_base.is_valid_positive() {
        return Err(MediaError::config(format!(
            "filter time base must be positive, got {}",
            config.time_base
        )));
    }
    let sar = if config.sample_aspect_ratio.is_valid_positive() {
        config.sample_aspect_ratio
    } else {
        Rational::default()
    };
    let args = format!(
        "video_size={}x{}:pix_fmt={}:time_base={}:pixel_aspect={}",
        config.width,
        config.height,
        pixel_format_name(config.input_format)?,
        config.time_base,
        sar,
    );

    let buffer = filter::find("buffer")
        .ok_or_else(|| MediaError::config("FFmpeg build lacks the 'buffer' filter"))?;
    let buffersink = filter::find("buffersink")
        .ok_or_else(|| MediaError::config("FFmpeg build lacks the 'buffersink' filter"))?;

    let mut graph = filter::Graph::new();
    graph
        .add(&buffer, "in", &args)
        .map_err(|e| MediaError::config(format!("filter source '{args}': {e}")))?;
    graph
        .add(&buffersink, "out", "")
        .map_err(|e| MediaError::config(format!("filter sink: {e}")))?;
    {
        let mut out = graph
            .get("out")
            .ok_or_else(|| MediaError::config("filter sink missing after creation"))?;
        out.set_pixel_format(output_format);
    }

    let description = match config.description.trim() {
        "" => PASS_THROUGH,
        d => d,
    };
    graph
        .output("in", 0)
        .and_then(|p| p.input("out", 0))
        .and_then(|p| p.parse(description))
        .map_err(|e| MediaError::config(format!("filter '{description}': {e}")))?;
    graph
        .validate()
        .map_err(|e| MediaError::config(format!("filter '{description}': {e}")))?;
    Ok(graph)
}

#[cfg(test)]
#[path = "../../tests/unit/media/filter.rs"]
mod tests;
