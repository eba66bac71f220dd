//! Edge extension for lazy views.

use std::sync::Arc;

use crate::geom::Region;
use crate::image::OwnedImage;
use crate::util::{StereoError, StereoResult};
use crate::view::LazyView;

/// Out-of-bounds pixel policy for [`EdgeExtendView`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EdgePolicy<T> {
    /// Fill with the pixel type's zero value.
    Zero,
    /// Fill with a fixed value.
    Constant(T),
    /// Clamp to the nearest valid source pixel.
    Nearest,
}

/// Removes the in-bounds restriction from a source view.
///
/// Materialization accepts any region, including regions partly or fully
/// outside the source bounds; out-of-bounds pixels take defined values per
/// the configured [`EdgePolicy`]. Correlation padding routinely requests
/// such regions.
pub struct EdgeExtendView<V: LazyView + ?Sized> {
    child: Arc<V>,
    policy: EdgePolicy<V::Pixel>,
}

impl<V: LazyView + ?Sized> EdgeExtendView<V> {
    pub fn new(child: Arc<V>, policy: EdgePolicy<V::Pixel>) -> Self {
        Self { child, policy }
    }
}

impl<V: LazyView + ?Sized> LazyView for EdgeExtendView<V> {
    type Pixel = V::Pixel;

    fn cols(&self) -> i32 {
        self.child.cols()
    }

    fn rows(&self) -> i32 {
        self.child.rows()
    }

    fn planes(&self) -> u32 {
        self.child.planes()
    }

    fn supports_partial_materialize(&self) -> bool {
        self.child.supports_partial_materialize()
    }

    fn accepts_out_of_bounds_regions(&self) -> bool {
        true
    }

    fn materialize(&self, region: Region) -> StereoResult<OwnedImage<V::Pixel>> {
        if region.is_empty() {
            return Err(StereoError::InvalidDimensions {
                width: region.width() as usize,
                height: region.height() as usize,
            });
        }
        match self.policy {
            EdgePolicy::Zero => self.materialize_filled(region, V::Pixel::default()),
            EdgePolicy::Constant(value) => self.materialize_filled(region, value),
            EdgePolicy::Nearest => self.materialize_nearest(region),
        }
    }
}

impl<V: LazyView + ?Sized> EdgeExtendView<V> {
    fn materialize_filled(
        &self,
        region: Region,
        fill: V::Pixel,
    ) -> StereoResult<OwnedImage<V::Pixel>> {
        let width = region.width() as usize;
        let height = region.height() as usize;
        let mut out = OwnedImage::filled(width, height, fill)?;

        let inner = self.child.bounds().intersect(&region);
        if !inner.is_empty() {
            let src = self.child.materialize(inner)?;
            let ox = (inner.min_x() - region.min_x()) as usize;
            let oy = (inner.min_y() - region.min_y()) as usize;
            for y in 0..src.height() {
                let row = src.row(y);
                out.row_mut(oy + y)[ox..ox + src.width()].copy_from_slice(row);
            }
        }
        Ok(out)
    }

    fn materialize_nearest(&self, region: Region) -> StereoResult<OwnedImage<V::Pixel>> {
        let cols = self.child.cols();
        let rows = self.child.rows();

        // The clamped footprint of the request always overlaps the source,
        // so one child materialization covers every clamped coordinate.
        let x0 = region.min_x().clamp(0, cols - 1);
        let y0 = region.min_y().clamp(0, rows - 1);
        let x1 = region.max_x().clamp(x0 + 1, cols);
        let y1 = region.max_y().clamp(y0 + 1, rows);
        let src = self.child.materialize(Region::new(x0, y0, x1, y1))?;

        let width = region.width() as usize;
        let height = region.height() as usize;
        let mut data = Vec::with_capacity(width * height);
        for y in region.min_y()..region.max_y() {
            let sy = (y.clamp(y0, y1 - 1) - y0) as usize;
            let row = src.row(sy);
            for x in region.min_x()..region.max_x() {
                let sx = (x.clamp(x0, x1 - 1) - x0) as usize;
                data.push(row[sx]);
            }
        }
        OwnedImage::new(data, width, height)
    }
}
