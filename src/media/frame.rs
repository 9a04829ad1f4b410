use ffmpeg_next::format::Pixel;

use crate::foundation::core::Rational;
use crate::foundation::error::{MediaError, MediaResult};

/// Planar floating-point layouts a [`DecodedFrame`] can hold.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum PixelFormat {
    /// No pixel data.
    #[default]
    None,
    /// One luminance plane (`grayf32le`).
    Gray,
    /// Three planes in G, B, R order (`gbrpf32le`).
    Rgb,
    /// Four planes in G, B, R, A order (`gbrapf32le`).
    Rgba,
}

/// Logical image channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Channel {
    /// Red.
    R,
    /// Green.
    G,
    /// Blue.
    B,
    /// Alpha.
    A,
    /// Luminance.
    Gray,
}

impl PixelFormat {
    /// Number of planes (and channels) stored for this format.
    pub fn channel_count(self) -> usize {
        match self {
            Self::None => 0,
            Self::Gray => 1,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }

    /// Channels present in this format, in plane order.
    pub fn channels(self) -> &'static [Channel] {
        match self {
            Self::None => &[],
            Self::Gray => &[Channel::Gray],
            Self::Rgb => &[Channel::G, Channel::B, Channel::R],
            Self::Rgba => &[Channel::G, Channel::B, Channel::R, Channel::A],
        }
    }

    /// Plane index holding `channel`, or `None` when the format lacks it.
    pub fn plane_of(self, channel: Channel) -> Option<usize> {
        match (self, channel) {
            (Self::Gray, Channel::Gray) => Some(0),
            (Self::Rgb | Self::Rgba, Channel::G) => Some(0),
            (Self::Rgb | Self::Rgba, Channel::B) => Some(1),
            (Self::Rgb | Self::Rgba, Channel::R) => Some(2),
            (Self::Rgba, Channel::A) => Some(3),
            _ => None,
        }
    }

    /// FFmpeg name of the matching planar float layout.
    pub fn ffmpeg_name(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Gray => Some("grayf32le"),
            Self::Rgb => Some("gbrpf32le"),
            Self::Rgba => Some("gbrapf32le"),
        }
    }

    pub(crate) fn from_ffmpeg(format: Pixel) -> Option<Self> {
        match format {
            Pixel::GRAYF32LE => Some(Self::Gray),
            Pixel::GBRPF32LE => Some(Self::Rgb),
            Pixel::GBRAPF32LE => Some(Self::Rgba),
            _ => None,
        }
    }

    pub(crate) fn to_ffmpeg(self) -> Option<Pixel> {
        match self {
            Self::None => None,
            Self::Gray => Some(Pixel::GRAYF32LE),
            Self::Rgb => Some(Pixel::GBRPF32LE),
            Self::Rgba => Some(Pixel::GBRAPF32LE),
        }
    }
}

/// Non-owning view of one channel plane.
///
/// An empty view is the absence signal: the channel does not exist or the buffer is malformed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelData<'a, T> {
    data: &'a [T],
}

impl<T> Default for PixelData<'_, T> {
    fn default() -> Self {
        Self { data: &[] }
    }
}

impl<'a, T> PixelData<'a, T> {
    /// View over `data`.
    pub fn new(data: &'a [T]) -> Self {
        Self { data }
    }

    /// The empty view.
    pub fn empty() -> Self {
        Self::default()
    }

    /// `true` when the view holds no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Element count.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Borrow the viewed elements.
    pub fn as_slice(&self) -> &'a [T] {
        self.data
    }

    /// `true` when both views share at least one element of memory.
    pub fn overlaps(&self, other: &PixelData<'_, T>) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        let a = self.data.as_ptr_range();
        let b = other.data.as_ptr_range();
        a.start < b.end && b.start < a.end
    }
}

/// View of `channel` inside a raw back-to-back planar buffer.
///
/// Returns an empty view when `buf` does not hold exactly the planes of `pix_fmt` at
/// `width`×`height`, or when the format lacks the channel.
pub fn comp_pixel_data(
    buf: &[f32],
    pix_fmt: PixelFormat,
    width: u32,
    height: u32,
    channel: Channel,
) -> PixelData<'_, f32> {
    let plane_len = width as usize * height as usize;
    if plane_len == 0 || buf.len() != plane_len * pix_fmt.channel_count() {
        return PixelData::empty();
    }
    match pix_fmt.plane_of(channel) {
        Some(plane) => PixelData::new(&buf[plane * plane_len..(plane + 1) * plane_len]),
        None => PixelData::empty(),
    }
}

/// Decoded, filtered frame stored as planar `f32`.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedFrame {
    /// One-based frame number within its stream.
    pub frame_nb: i64,
    /// Whether the source frame was a key frame.
    pub key_frame: bool,
    /// Pixel aspect ratio.
    pub pixel_aspect_ratio: Rational,
    width: u32,
    height: u32,
    pix_fmt: PixelFormat,
    buf: Vec<f32>,
}

impl DecodedFrame {
    /// Build a frame from back-to-back planes, validating the buffer length.
    pub fn new(width: u32, height: u32, pix_fmt: PixelFormat, buf: Vec<f32>) -> MediaResult<Self> {
        let expected = pix_fmt.channel_count() * width as usize * height as usize;
        if buf.len() != expected {
            return Err(MediaError::validation(format!(
                "frame buffer holds {} floats, {pix_fmt:?} {width}x{height} needs {expected}",
                buf.len()
            )));
        }
        Ok(Self {
            frame_nb: 0,
            key_frame: false,
            pixel_aspect_ratio: Rational::default(),
            width,
            height,
            pix_fmt,
            buf,
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Stored pixel layout.
    pub fn pix_fmt(&self) -> PixelFormat {
        self.pix_fmt
    }

    /// All planes back-to-back.
    pub fn buf(&self) -> &[f32] {
        &self.buf
    }

    /// Elements per plane.
    pub fn plane_len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// View of plane `index`, empty when out of range.
    pub fn plane(&self, index: usize) -> PixelData<'_, f32> {
        if index >= self.pix_fmt.channel_count() {
            return PixelData::empty();
        }
        let len = self.plane_len();
        self.buf
            .get(index * len..(index + 1) * len)
            .map_or_else(PixelData::empty, PixelData::new)
    }

    /// View of logical `channel`, empty when the format lacks it.
    pub fn channel(&self, channel: Channel) -> PixelData<'_, f32> {
        comp_pixel_data(&self.buf, self.pix_fmt, self.width, self.height, channel)
    }

    /// Copy a filtered FFmpeg frame into planar `f32` storage.
    pub(crate) fn from_video(
        video: &ffmpeg_next::frame::Video,
        frame_nb: i64,
    ) -> MediaResult<Self> {
        let format = video.format();
        let pix_fmt = PixelFormat::from_ffmpeg(format).ok_or_else(|| {
            MediaError::unsupported_format(
                format
                    .descriptor()
                    .map(|d| d.name().to_string())
                    .unwrap_or_else(|| format!("{format:?}")),
            )
        })?;

        let width = video.width() as usize;
        let height = video.height() as usize;
        let row_bytes = width * 4;
        let mut buf = Vec::with_capacity(pix_fmt.channel_count() * width * height);
        for plane in 0..pix_fmt.channel_count() {
            let stride = video.stride(plane);
            let data = video.data(plane);
            for y in 0..height {
                let start = y * stride;
                let row = data.get(start..start + row_bytes).ok_or_else(|| {
                    MediaError::decode(format!("plane {plane} row {y} is shorter than expected"))
                })?;
                buf.extend(
                    row.chunks_exact(4)
                        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])),
                );
            }
        }

        let mut frame = Self::new(video.width(), video.height(), pix_fmt, buf)?;
        frame.frame_nb = frame_nb;
        frame.key_frame = video.is_key();
        let par = Rational::from(video.aspect_ratio());
        if par.is_valid_positive() {
            frame.pixel_aspect_ratio = par;
        }
        Ok(frame)
    }

    /// Copy planar `f32` storage into a freshly allocated FFmpeg frame.
    pub(crate) fn to_video(&self) -> MediaResult<ffmpeg_next::frame::Video> {
        let format = self
            .pix_fmt
            .to_ffmpeg()
            .ok_or_else(|| MediaError::validation("cannot convert a frame without pixels"))?;
        let mut video = ffmpeg_next::frame::Video::new(format, self.width, self.height);
        let width = self.width as usize;
        for plane in 0..self.pix_fmt.channel_count() {
            let src = self.plane(plane).as_slice();
            let stride = video.stride(plane);
            let dst = video.data_mut(plane);
            for (y, row) in src.chunks_exact(width).enumerate() {
                let start = y * stride;
                let out = dst.get_mut(start..start + width * 4).ok_or_else(|| {
                    MediaError::encode(format!("plane {plane} row {y} is shorter than expected"))
                })?;
                for (o, v) in out.chunks_exact_mut(4).zip(row) {
                    o.copy_from_slice(&v.to_le_bytes());
                }
            }
        }
        Ok(video)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/media/frame.rs"]
mod tests;
