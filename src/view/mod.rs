//! Lazy, tile-addressable image views.
//!
//! A [`LazyView`] defers all pixel computation until a rectangular region
//! is materialized into a concrete buffer. Views compose into a DAG:
//! derived views hold their source through an `Arc`, so one source may feed
//! several derivations without copying. Materialization is pure; repeated
//! calls with the same region on an unchanged view produce identical
//! buffers (recomputation is allowed, caching is not required).

mod crop;
mod extend;

pub use crop::CropView;
pub use extend::{EdgeExtendView, EdgePolicy};

use std::sync::Arc;

use crate::geom::Region;
use crate::image::OwnedImage;
use crate::raster::{convert, ImageFormat, PixelBuffer, PixelLayout, ScalarPixel};
use crate::util::{StereoError, StereoResult};

/// A read-only image whose pixels are computed on demand.
///
/// Size queries are static and never trigger computation. `materialize`
/// returns a concrete buffer whose logical size equals the requested
/// region's size and whose values equal what full evaluation of the view
/// would produce at those coordinates. Unless a view removes the
/// restriction (see [`EdgeExtendView`]), the requested region must lie
/// inside `[0, cols) x [0, rows)`; empty regions are rejected.
pub trait LazyView: Send + Sync {
    /// Element type of materialized buffers.
    type Pixel: Copy + Default + Send + Sync + 'static;

    /// Returns the number of columns in the view.
    fn cols(&self) -> i32;

    /// Returns the number of rows in the view.
    fn rows(&self) -> i32;

    /// Returns the number of planes in the view.
    fn planes(&self) -> u32 {
        1
    }

    /// The view's full extent as a region anchored at the origin.
    fn bounds(&self) -> Region {
        Region::with_size(0, 0, self.cols(), self.rows())
    }

    /// Whether arbitrary sub-regions can be materialized. Views backed by
    /// whole-image-only transfers answer `false`; callers should check this
    /// instead of catching [`StereoError::NotImplemented`].
    fn supports_partial_materialize(&self) -> bool {
        true
    }

    /// Whether `materialize` accepts regions outside `[0, cols) x
    /// [0, rows)`. Edge-extended views answer `true`; composition nodes
    /// consult this before rejecting an out-of-bounds window.
    fn accepts_out_of_bounds_regions(&self) -> bool {
        false
    }

    /// Computes the pixels of `region` into a concrete buffer.
    fn materialize(&self, region: Region) -> StereoResult<OwnedImage<Self::Pixel>>;
}

/// Concrete buffers satisfy the view contract directly: materialization is
/// a bounds-checked sub-rectangle copy.
impl<T: Copy + Default + Send + Sync + 'static> LazyView for OwnedImage<T> {
    type Pixel = T;

    fn cols(&self) -> i32 {
        self.width() as i32
    }

    fn rows(&self) -> i32 {
        self.height() as i32
    }

    fn materialize(&self, region: Region) -> StereoResult<OwnedImage<T>> {
        check_region(&region, self.cols(), self.rows())?;
        let width = region.width() as usize;
        let height = region.height() as usize;
        let x0 = region.min_x() as usize;
        let y0 = region.min_y() as usize;

        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            data.extend_from_slice(&self.row(y0 + y)[x0..x0 + width]);
        }
        OwnedImage::new(data, width, height)
    }
}

/// A [`LazyView`] over a runtime-typed [`PixelBuffer`].
///
/// Materialization crops the buffer and routes through [`convert`] into the
/// scalar pixel type `T`, bridging the runtime-typed I/O boundary into the
/// strongly-typed hot path. Multi-channel layouts reduce to gray via the
/// conversion rules; multi-plane buffers are reported by `planes()` and
/// rejected at materialization.
pub struct RasterView<T> {
    buffer: Arc<PixelBuffer>,
    _pixel: std::marker::PhantomData<T>,
}

impl<T: ScalarPixel> RasterView<T> {
    pub fn new(buffer: Arc<PixelBuffer>) -> Self {
        Self {
            buffer,
            _pixel: std::marker::PhantomData,
        }
    }
}

impl<T: ScalarPixel> LazyView for RasterView<T> {
    type Pixel = T;

    fn cols(&self) -> i32 {
        self.buffer.cols() as i32
    }

    fn rows(&self) -> i32 {
        self.buffer.rows() as i32
    }

    fn planes(&self) -> u32 {
        self.buffer.planes()
    }

    fn materialize(&self, region: Region) -> StereoResult<OwnedImage<T>> {
        if self.buffer.planes() != 1 {
            return Err(StereoError::MultiPlaneInput {
                planes: self.buffer.planes(),
            });
        }
        check_region(&region, self.cols(), self.rows())?;

        let src = self.buffer.cropped(region)?;
        let fmt = ImageFormat::new(
            region.width() as u32,
            region.height() as u32,
            PixelLayout::Gray,
            T::CHANNEL_TYPE,
        );
        let mut dst = PixelBuffer::new(fmt)?;
        convert(&mut dst.as_view_mut(), &src, false)?;

        let step = T::CHANNEL_TYPE.byte_size();
        let pixels: Vec<T> = dst.as_bytes().chunks_exact(step).map(T::from_bytes).collect();
        OwnedImage::new(pixels, region.width() as usize, region.height() as usize)
    }
}

/// Restricts `view` to `region`; see [`CropView`].
pub fn crop<V: LazyView + ?Sized>(view: Arc<V>, region: Region) -> StereoResult<CropView<V>> {
    CropView::new(view, region)
}

/// Removes the bounds restriction from `view`; see [`EdgeExtendView`].
pub fn edge_extend<V: LazyView + ?Sized>(
    view: Arc<V>,
    policy: EdgePolicy<V::Pixel>,
) -> EdgeExtendView<V> {
    EdgeExtendView::new(view, policy)
}

pub(crate) fn check_region(region: &Region, cols: i32, rows: i32) -> StereoResult<()> {
    if region.is_empty() {
        return Err(StereoError::InvalidDimensions {
            width: region.width() as usize,
            height: region.height() as usize,
        });
    }
    let bounds = Region::with_size(0, 0, cols, rows);
    if !bounds.contains_region(region) {
        return Err(StereoError::RegionOutOfBounds {
            region: *region,
            cols,
            rows,
        });
    }
    Ok(())
}
