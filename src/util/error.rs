//! Error types for stereocorr.

use crate::geom::Region;
use thiserror::Error;

/// Result alias for stereocorr operations.
pub type StereoResult<T> = std::result::Result<T, StereoError>;

/// Errors that can occur in buffer handling, view composition and
/// correlation setup.
///
/// Computational degeneracies (a pixel with no valid match, an empty
/// per-pixel search window, a kernel walking off padded bounds) are not
/// errors; they surface as invalid [`Disparity`](crate::Disparity) entries.
#[derive(Debug, Error)]
pub enum StereoError {
    /// Width or height of a buffer or view is unusable.
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    /// Row stride is smaller than the row width.
    #[error("invalid stride: width {width}, stride {stride}")]
    InvalidStride { width: usize, stride: usize },
    /// Backing buffer is too small for the described extent.
    #[error("buffer too small: needed {needed}, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// A region does not lie inside the image it addresses.
    #[error("region {region} out of bounds of {cols}x{rows} image")]
    RegionOutOfBounds {
        region: Region,
        cols: i32,
        rows: i32,
    },
    /// Two images that must agree in size do not.
    #[error("image dimensions do not agree: {left_cols}x{left_rows} vs {right_cols}x{right_rows}")]
    DimensionMismatch {
        left_cols: i32,
        left_rows: i32,
        right_cols: i32,
        right_rows: i32,
    },
    /// Multi-plane input where a single plane is required.
    #[error("multi-plane input not supported: {planes} planes")]
    MultiPlaneInput { planes: u32 },
    /// A pixel conversion was asked to reconcile spatially mismatched buffers.
    #[error(
        "conversion size mismatch: dst {dst_cols}x{dst_rows}x{dst_planes}, src {src_cols}x{src_rows}x{src_planes}"
    )]
    ConversionSizeMismatch {
        dst_cols: u32,
        dst_rows: u32,
        dst_planes: u32,
        src_cols: u32,
        src_rows: u32,
        src_planes: u32,
    },
    /// A pixel conversion between structurally incompatible layouts.
    #[error("incompatible pixel conversion: {0}")]
    IncompatibleFormat(&'static str),
    /// A requested optional capability is unsupported by the backing view.
    ///
    /// Callers should prefer the capability queries on
    /// [`LazyView`](crate::LazyView) over catching this error.
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
    /// Failure while reading or writing an image file.
    #[cfg(feature = "image-io")]
    #[error("image i/o failed: {reason}")]
    ImageIo { reason: String },
}
