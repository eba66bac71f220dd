//! Runtime-typed pixel buffers for the resource/I/O boundary.
//!
//! `PixelBuffer` pairs an [`ImageFormat`] tag with raw bytes and explicit
//! column/row/plane strides, so generic drivers can describe pixel data
//! without compile-time pixel types. Cropping is zero-copy: a cropped
//! [`BufferView`] shares the same memory with a shifted origin. All
//! higher-level reads and materializations route through [`convert`].
//! Multi-byte channels use native byte order.

mod convert;

pub use convert::convert;

use crate::geom::Region;
use crate::util::{StereoError, StereoResult};

/// Numeric type of a single channel sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelType {
    U8,
    U16,
    I16,
    F32,
}

impl ChannelType {
    /// Size of one channel sample in bytes.
    pub fn byte_size(self) -> usize {
        match self {
            ChannelType::U8 => 1,
            ChannelType::U16 => 2,
            ChannelType::I16 => 2,
            ChannelType::F32 => 4,
        }
    }

    /// The natural value range of the channel type, used by rescaling
    /// conversions. Floating point uses the conventional [0, 1].
    pub fn natural_range(self) -> (f64, f64) {
        match self {
            ChannelType::U8 => (0.0, u8::MAX as f64),
            ChannelType::U16 => (0.0, u16::MAX as f64),
            ChannelType::I16 => (i16::MIN as f64, i16::MAX as f64),
            ChannelType::F32 => (0.0, 1.0),
        }
    }
}

/// Channel structure of one pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelLayout {
    Gray,
    GrayAlpha,
    Rgb,
    Rgba,
}

impl PixelLayout {
    /// Total channels per pixel.
    pub fn channels(self) -> usize {
        match self {
            PixelLayout::Gray => 1,
            PixelLayout::GrayAlpha => 2,
            PixelLayout::Rgb => 3,
            PixelLayout::Rgba => 4,
        }
    }

    /// Channels carrying color or intensity (alpha excluded).
    pub fn color_channels(self) -> usize {
        match self {
            PixelLayout::Gray | PixelLayout::GrayAlpha => 1,
            PixelLayout::Rgb | PixelLayout::Rgba => 3,
        }
    }

    /// Whether the last channel is alpha.
    pub fn has_alpha(self) -> bool {
        matches!(self, PixelLayout::GrayAlpha | PixelLayout::Rgba)
    }
}

/// Describes the shape of an image: dimensions, pixel structure, and
/// channel type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageFormat {
    pub cols: u32,
    pub rows: u32,
    pub planes: u32,
    pub pixel_layout: PixelLayout,
    pub channel_type: ChannelType,
}

impl ImageFormat {
    /// Single-plane format.
    pub fn new(cols: u32, rows: u32, pixel_layout: PixelLayout, channel_type: ChannelType) -> Self {
        Self {
            cols,
            rows,
            planes: 1,
            pixel_layout,
            channel_type,
        }
    }

    /// Does this represent a fully-specified data format? Layout and channel
    /// type are always known here; only the dimensions can be degenerate.
    pub fn complete(&self) -> bool {
        self.cols != 0 && self.rows != 0 && self.planes != 0
    }

    /// True when both formats cover the same pixel grid.
    pub fn same_size(&self, other: &ImageFormat) -> bool {
        self.cols == other.cols && self.rows == other.rows && self.planes == other.planes
    }

    /// True when a conversion between the formats is a plain memcpy-style
    /// copy: same grid, same layout, same channel type.
    pub fn simple_convert(&self, other: &ImageFormat) -> bool {
        self.same_size(other)
            && self.pixel_layout == other.pixel_layout
            && self.channel_type == other.channel_type
    }

    /// Channels per pixel.
    pub fn channels(&self) -> usize {
        self.pixel_layout.channels()
    }

    /// Bytes per pixel in one plane.
    pub fn pixel_byte_size(&self) -> usize {
        self.channels() * self.channel_type.byte_size()
    }
}

/// Owned, packed pixel buffer described by an [`ImageFormat`].
#[derive(Clone, Debug)]
pub struct PixelBuffer {
    data: Vec<u8>,
    format: ImageFormat,
    cstride: usize,
    rstride: usize,
    pstride: usize,
}

impl PixelBuffer {
    /// Allocates a zero-filled buffer with packed strides.
    pub fn new(format: ImageFormat) -> StereoResult<Self> {
        if !format.complete() {
            return Err(StereoError::InvalidDimensions {
                width: format.cols as usize,
                height: format.rows as usize,
            });
        }
        let cstride = format.pixel_byte_size();
        let rstride = cstride * format.cols as usize;
        let pstride = rstride * format.rows as usize;
        let data = vec![0u8; pstride * format.planes as usize];
        Ok(Self {
            data,
            format,
            cstride,
            rstride,
            pstride,
        })
    }

    /// Wraps existing packed bytes. The byte length must match the format
    /// exactly.
    pub fn from_bytes(data: Vec<u8>, format: ImageFormat) -> StereoResult<Self> {
        let mut buf = Self::new(format)?;
        if data.len() != buf.byte_size() {
            return Err(StereoError::BufferTooSmall {
                needed: buf.byte_size(),
                got: data.len(),
            });
        }
        buf.data = data;
        Ok(buf)
    }

    pub fn format(&self) -> &ImageFormat {
        &self.format
    }

    pub fn cols(&self) -> u32 {
        self.format.cols
    }

    pub fn rows(&self) -> u32 {
        self.format.rows
    }

    pub fn planes(&self) -> u32 {
        self.format.planes
    }

    /// Total size in bytes: `planes * plane_stride`.
    pub fn byte_size(&self) -> usize {
        self.format.planes as usize * self.pstride
    }

    /// The packed backing bytes, plane-major then row-major.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Borrows the whole buffer as a read-only view.
    pub fn as_view(&self) -> BufferView<'_> {
        BufferView {
            data: &self.data,
            format: self.format,
            cstride: self.cstride,
            rstride: self.rstride,
            pstride: self.pstride,
        }
    }

    /// Borrows the whole buffer as a writable view.
    pub fn as_view_mut(&mut self) -> BufferViewMut<'_> {
        BufferViewMut {
            data: &mut self.data,
            format: self.format,
            cstride: self.cstride,
            rstride: self.rstride,
            pstride: self.pstride,
        }
    }

    /// Zero-copy crop; the returned view shares this buffer's memory.
    pub fn cropped(&self, region: Region) -> StereoResult<BufferView<'_>> {
        self.as_view().cropped(region)
    }
}

/// Read-only view over pixel bytes with explicit strides.
#[derive(Clone, Copy, Debug)]
pub struct BufferView<'a> {
    data: &'a [u8],
    format: ImageFormat,
    cstride: usize,
    rstride: usize,
    pstride: usize,
}

impl<'a> BufferView<'a> {
    pub fn format(&self) -> &ImageFormat {
        &self.format
    }

    pub fn cols(&self) -> u32 {
        self.format.cols
    }

    pub fn rows(&self) -> u32 {
        self.format.rows
    }

    pub fn planes(&self) -> u32 {
        self.format.planes
    }

    /// Zero-copy crop restricted to `region`, which must lie within the
    /// view's pixel grid.
    pub fn cropped(&self, region: Region) -> StereoResult<BufferView<'a>> {
        let bounds = Region::with_size(0, 0, self.format.cols as i32, self.format.rows as i32);
        if !bounds.contains_region(&region) {
            return Err(StereoError::RegionOutOfBounds {
                region,
                cols: self.format.cols as i32,
                rows: self.format.rows as i32,
            });
        }
        let offset = region.min_x() as usize * self.cstride + region.min_y() as usize * self.rstride;
        let mut format = self.format;
        format.cols = region.width() as u32;
        format.rows = region.height() as u32;
        Ok(BufferView {
            data: &self.data[offset..],
            format,
            cstride: self.cstride,
            rstride: self.rstride,
            pstride: self.pstride,
        })
    }

    fn sample_offset(&self, i: usize, j: usize, p: usize, c: usize) -> usize {
        i * self.cstride + j * self.rstride + p * self.pstride + c * self.format.channel_type.byte_size()
    }

    /// Reads channel `c` of the pixel at column `i`, row `j`, plane `p` as
    /// its raw numeric value.
    pub(crate) fn read_channel(&self, i: usize, j: usize, p: usize, c: usize) -> f64 {
        let off = self.sample_offset(i, j, p, c);
        match self.format.channel_type {
            ChannelType::U8 => self.data[off] as f64,
            ChannelType::U16 => {
                u16::from_ne_bytes([self.data[off], self.data[off + 1]]) as f64
            }
            ChannelType::I16 => {
                i16::from_ne_bytes([self.data[off], self.data[off + 1]]) as f64
            }
            ChannelType::F32 => f32::from_ne_bytes([
                self.data[off],
                self.data[off + 1],
                self.data[off + 2],
                self.data[off + 3],
            ]) as f64,
        }
    }
}

/// Writable view over pixel bytes with explicit strides.
#[derive(Debug)]
pub struct BufferViewMut<'a> {
    data: &'a mut [u8],
    format: ImageFormat,
    cstride: usize,
    rstride: usize,
    pstride: usize,
}

impl BufferViewMut<'_> {
    pub fn format(&self) -> &ImageFormat {
        &self.format
    }

    fn sample_offset(&self, i: usize, j: usize, p: usize, c: usize) -> usize {
        i * self.cstride + j * self.rstride + p * self.pstride + c * self.format.channel_type.byte_size()
    }

    /// Writes channel `c` of the pixel at column `i`, row `j`, plane `p`.
    /// The value is clamped to the channel type's representable range and
    /// truncated for integer channels.
    pub(crate) fn write_channel(&mut self, i: usize, j: usize, p: usize, c: usize, value: f64) {
        let off = self.sample_offset(i, j, p, c);
        match self.format.channel_type {
            ChannelType::U8 => {
                self.data[off] = value.clamp(0.0, u8::MAX as f64) as u8;
            }
            ChannelType::U16 => {
                let v = value.clamp(0.0, u16::MAX as f64) as u16;
                self.data[off..off + 2].copy_from_slice(&v.to_ne_bytes());
            }
            ChannelType::I16 => {
                let v = value.clamp(i16::MIN as f64, i16::MAX as f64) as i16;
                self.data[off..off + 2].copy_from_slice(&v.to_ne_bytes());
            }
            ChannelType::F32 => {
                self.data[off..off + 4].copy_from_slice(&(value as f32).to_ne_bytes());
            }
        }
    }
}

/// A single-channel pixel type usable as the element of a typed image.
///
/// Implemented for the channel types the runtime buffers understand; this
/// is the bridge between the runtime-typed boundary and the strongly-typed
/// correlation hot path.
pub trait ScalarPixel: Copy + Default + Send + Sync + PartialEq + 'static {
    /// The runtime channel tag matching this type.
    const CHANNEL_TYPE: ChannelType;

    /// Decodes one sample from native-endian bytes.
    fn from_bytes(bytes: &[u8]) -> Self;

    /// Widens the sample for correlation arithmetic.
    fn to_f32(self) -> f32;
}

impl ScalarPixel for u8 {
    const CHANNEL_TYPE: ChannelType = ChannelType::U8;

    fn from_bytes(bytes: &[u8]) -> Self {
        bytes[0]
    }

    fn to_f32(self) -> f32 {
        self as f32
    }
}

impl ScalarPixel for u16 {
    const CHANNEL_TYPE: ChannelType = ChannelType::U16;

    fn from_bytes(bytes: &[u8]) -> Self {
        u16::from_ne_bytes([bytes[0], bytes[1]])
    }

    fn to_f32(self) -> f32 {
        self as f32
    }
}

impl ScalarPixel for i16 {
    const CHANNEL_TYPE: ChannelType = ChannelType::I16;

    fn from_bytes(bytes: &[u8]) -> Self {
        i16::from_ne_bytes([bytes[0], bytes[1]])
    }

    fn to_f32(self) -> f32 {
        self as f32
    }
}

impl ScalarPixel for f32 {
    const CHANNEL_TYPE: ChannelType = ChannelType::F32;

    fn from_bytes(bytes: &[u8]) -> Self {
        f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    fn to_f32(self) -> f32 {
        self
    }
}
