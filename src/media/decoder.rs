use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ffmpeg_next::{format, format::stream::Disposition, frame, media, packet::Packet};

use crate::cache::CancelToken;
use crate::foundation::config::DecoderOptions;
use crate::foundation::error::{MediaError, MediaResult};
use crate::foundation::log::Logger;
use crate::media::filter::{FilterConfig, FilterPipeline};
use crate::media::frame::{DecodedFrame, PixelFormat};
use crate::media::stream::{Stream, StreamHeader, StreamTiming};

/// Which video substream a request addresses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum StreamSelector {
    /// The container's best video stream.
    #[default]
    Best,
    /// A container stream index.
    Index(usize),
}

impl StreamSelector {
    /// Host convention: any negative value selects the best stream.
    pub fn from_host(index: i64) -> Self {
        usize::try_from(index).map_or(Self::Best, Self::Index)
    }
}

impl std::fmt::Display for StreamSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Best => f.write_str("best"),
            Self::Index(i) => write!(f, "{i}"),
        }
    }
}

struct VideoSlot {
    stream: Stream,
    pipeline: FilterPipeline,
}

struct DecodeState {
    input: format::context::Input,
    streams: Vec<VideoSlot>,
}

// SAFETY: the FFmpeg contexts are only touched through `&mut DecodeState`, which the decoder
// hands out under its mutex, so no two threads use them at once.
unsafe impl Send for DecodeState {}

/// An opened container with one decoder and filter pipeline per video stream.
///
/// Decodes against one `Decoder` are serialised; share it behind an `Arc` to decode from
/// several threads.
pub struct Decoder {
    path: PathBuf,
    options: DecoderOptions,
    headers: Vec<StreamHeader>,
    best_stream: Option<usize>,
    logger: Logger,
    state: Mutex<Option<DecodeState>>,
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("path", &self.path)
            .field("options", &self.options)
            .field("headers", &self.headers)
            .field("best_stream", &self.best_stream)
            .finish()
    }
}

impl Decoder {
    /// Open `path` and prepare every video stream it contains.
    ///
    /// A container without video opens successfully; every decode against it fails.
    pub fn open(path: impl AsRef<Path>, options: DecoderOptions) -> MediaResult<Self> {
        Self::open_with_logger(path, options, crate::foundation::log::installed())
    }

    /// [`open`](Self::open) with an explicit log sink.
    #[tracing::instrument(skip(path, logger), fields(path = %path.as_ref().display()))]
    pub fn open_with_logger(
        path: impl AsRef<Path>,
        options: DecoderOptions,
        logger: Logger,
    ) -> MediaResult<Self> {
        super::init_ffmpeg()?;
        let path = path.as_ref().to_path_buf();
        let input = format::input(&path)
            .map_err(|e| MediaError::open(format!("{}: {e}", path.display())))?;

        let candidates: Vec<usize> = input
            .streams()
            .filter(|s| s.parameters().medium() == media::Type::Video)
            .filter(|s| !s.disposition().contains(Disposition::ATTACHED_PIC))
            .map(|s| s.index())
            .collect();
        let ffmpeg_best = input
            .streams()
            .best(media::Type::Video)
            .map(|s| s.index());

        let mut streams = Vec::with_capacity(candidates.len());
        for index in candidates {
            let stream = match Stream::open(&input, index, options.threads, &logger) {
                Ok(stream) => stream,
                Err(e) => {
                    logger.warning(format!("{}: skipping stream: {e}", path.display()));
                    continue;
                }
            };
            let pipeline = FilterPipeline::configure(FilterConfig {
                width: stream.width(),
                height: stream.height(),
                input_format: stream.format(),
                time_base: stream.timing().time_base,
                sample_aspect_ratio: stream.sample_aspect_ratio(),
                output_format: options.output_pixel_format.clone(),
                description: options.filter.clone(),
            })?;
            streams.push(VideoSlot { stream, pipeline });
        }

        let best_stream = ffmpeg_best
            .filter(|b| streams.iter().any(|s| s.stream.index() == *b))
            .or_else(|| streams.first().map(|s| s.stream.index()));
        let headers = streams
            .iter()
            .map(|s| s.stream.header(Some(s.stream.index()) == best_stream))
            .collect::<Vec<_>>();

        if headers.is_empty() {
            logger.info(format!("{}: no decodable video streams", path.display()));
        }
        tracing::debug!(streams = headers.len(), ?best_stream, "decoder opened");

        Ok(Self {
            path,
            options,
            headers,
            best_stream,
            logger,
            state: Mutex::new(Some(DecodeState { input, streams })),
        })
    }

    /// Container path this decoder reads.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Options baked in at open time.
    pub fn options(&self) -> &DecoderOptions {
        &self.options
    }

    /// `true` until [`close`](Self::close) releases the container.
    pub fn is_open(&self) -> bool {
        self.lock_state().is_some()
    }

    /// Release the container and all codec and filter state; later decodes fail.
    pub fn close(&self) {
        self.lock_state().take();
    }

    /// Headers of every decodable video stream, in container order.
    pub fn stream_headers(&self) -> &[StreamHeader] {
        &self.headers
    }

    /// Container index of the best video stream, if any.
    pub fn best_stream_index(&self) -> Option<usize> {
        self.best_stream
    }

    /// Header addressed by `selector`.
    pub fn header(&self, selector: StreamSelector) -> Option<&StreamHeader> {
        let index = match selector {
            StreamSelector::Best => self.best_stream?,
            StreamSelector::Index(i) => i,
        };
        self.headers.iter().find(|h| h.index == index)
    }

    /// Decode exactly frame `frame_nb` (one-based) of the selected stream.
    ///
    /// Seeks backwards to the nearest preceding key frame and decodes forward until a frame
    /// whose presentation interval contains the target timestamp comes out of the filter.
    #[tracing::instrument(skip(self, cancel), fields(path = %self.path.display()))]
    pub fn decode_frame(
        &self,
        selector: StreamSelector,
        frame_nb: i64,
        cancel: &CancelToken,
    ) -> MediaResult<DecodedFrame> {
        let header = self.header(selector).ok_or_else(|| {
            MediaError::decode(format!(
                "{}: no video stream for selector {selector}",
                self.path.display()
            ))
        })?;
        if frame_nb < 1 || frame_nb > header.frame_count {
            return Err(MediaError::OutOfRange {
                frame: frame_nb,
                frame_count: header.frame_count,
            });
        }
        let index = header.index;

        let mut guard = self.lock_state();
        let state = guard.as_mut().ok_or_else(|| {
            MediaError::decode(format!("{}: decoder is closed", self.path.display()))
        })?;
        let DecodeState { input, streams } = state;
        let slot = streams
            .iter_mut()
            .find(|s| s.stream.index() == index)
            .ok_or_else(|| MediaError::decode(format!("stream {index} is not decodable")))?;

        let result = seek_and_decode(input, slot, frame_nb, cancel);
        if let Err(e) = &result
            && !e.is_cancelled()
        {
            self.logger.error(format!(
                "{}: frame {frame_nb} of stream {index}: {e}",
                self.path.display()
            ));
        }
        result
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, Option<DecodeState>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Per-request matching state shared by the decode and filter callbacks.
struct FrameSearch<'a> {
    timing: StreamTiming,
    target: i64,
    frame_nb: i64,
    pipeline: &'a mut FilterPipeline,
    found: Option<DecodedFrame>,
    overshot: bool,
}

impl FrameSearch<'_> {
    fn on_decoded(&mut self, decoded: &frame::Video) -> MediaResult<ControlFlow<()>> {
        let Some(interval) = self.timing.interval_of(decoded) else {
            return Ok(ControlFlow::Continue(()));
        };
        if interval.pts > self.target {
            self.overshot = true;
            return Ok(ControlFlow::Break(()));
        }
        if !interval.contains(self.target) {
            return Ok(ControlFlow::Continue(()));
        }
        let key_frame = decoded.is_key();
        self.filter(Some(decoded), key_frame)
    }

    fn flush(&mut self) -> MediaResult<ControlFlow<()>> {
        self.filter(None, false)
    }

    fn filter(
        &mut self,
        input: Option<&frame::Video>,
        key_frame: bool,
    ) -> MediaResult<ControlFlow<()>> {
        let Self {
            timing,
            target,
            frame_nb,
            pipeline,
            found,
            ..
        } = self;
        pipeline.process(input, |filtered| {
            let matches = timing
                .interval_of(filtered)
                .is_some_and(|iv| iv.contains(*target));
            if !matches {
                return Ok(ControlFlow::Continue(()));
            }
            if PixelFormat::from_ffmpeg(filtered.format()).is_none() {
                return Err(MediaError::unsupported_format(format!(
                    "filter produced {:?}; expected grayf32le, gbrpf32le or gbrapf32le",
                    filtered.format()
                )));
            }
            let mut frame = DecodedFrame::from_video(filtered, *frame_nb)?;
            frame.key_frame = frame.key_frame || key_frame;
            *found = Some(frame);
            Ok(ControlFlow::Break(()))
        })
    }
}

/// Seek `stream_index` to the last key frame at or before `timestamp` (stream time base).
///
/// `Input::seek` always passes stream `-1`, which lets FFmpeg pick its default stream; the
/// selected stream's own index has to drive the seek.
fn seek_backward(
    input: &mut format::context::Input,
    stream_index: usize,
    timestamp: i64,
) -> Result<(), ffmpeg_next::Error> {
    let stream_index =
        i32::try_from(stream_index).map_err(|_| ffmpeg_next::Error::StreamNotFound)?;
    // SAFETY: `input` is a live demuxer context held exclusively for the duration of the call.
    let ret = unsafe {
        ffmpeg_next::ffi::av_seek_frame(
            input.as_mut_ptr(),
            stream_index,
            timestamp,
            ffmpeg_next::ffi::AVSEEK_FLAG_BACKWARD,
        )
    };
    if ret < 0 {
        return Err(ffmpeg_next::Error::from(ret));
    }
    Ok(())
}

fn seek_and_decode(
    input: &mut format::context::Input,
    slot: &mut VideoSlot,
    frame_nb: i64,
    cancel: &CancelToken,
) -> MediaResult<DecodedFrame> {
    let timing = slot.stream.timing();
    let index = slot.stream.index();
    let target = timing.frame_to_timestamp(frame_nb - 1);

    seek_backward(input, index, target)
        .map_err(|e| MediaError::decode(format!("seek to frame {frame_nb} failed: {e}")))?;
    slot.stream.flush_buffers();
    if slot.pipeline.is_dirty() {
        slot.pipeline.reset()?;
    }

    let mut search = FrameSearch {
        timing,
        target,
        frame_nb,
        pipeline: &mut slot.pipeline,
        found: None,
        overshot: false,
    };

    let mut packet = Packet::empty();
    let mut flow = ControlFlow::Continue(());
    while flow.is_continue() {
        if cancel.is_cancelled() {
            return Err(MediaError::Cancelled);
        }
        match packet.read(input) {
            Ok(()) => {
                if packet.stream() != index {
                    continue;
                }
                flow = slot
                    .stream
                    .receive_frames(Some(&packet), |f| search.on_decoded(f))?;
            }
            Err(ffmpeg_next::Error::Eof) => {
                flow = slot.stream.receive_frames(None, |f| search.on_decoded(f))?;
                break;
            }
            Err(e) => {
                return Err(MediaError::decode(format!("reading packet failed: {e}")));
            }
        }
    }

    if search.found.is_none() && (flow.is_continue() || search.overshot) {
        search.flush()?;
    }

    search.found.ok_or_else(|| {
        MediaError::decode(format!(
            "frame {frame_nb} (timestamp {target}) not found in stream {index}"
        ))
    })
}

#[cfg(test)]
#[path = "../../tests/unit/media/decoder.rs"]
mod tests;
