//! Crop composition for lazy views.

use std::sync::Arc;

use crate::geom::Region;
use crate::image::OwnedImage;
use crate::util::{StereoError, StereoResult};
use crate::view::{check_region, LazyView};

/// A window into another view.
///
/// The crop region must lie fully inside the source; materializing a
/// sub-region delegates to the source with the region translated into the
/// source's coordinate frame.
#[derive(Debug)]
pub struct CropView<V: LazyView + ?Sized> {
    child: Arc<V>,
    region: Region,
}

impl<V: LazyView + ?Sized> CropView<V> {
    pub fn new(child: Arc<V>, region: Region) -> StereoResult<Self> {
        if region.is_empty() {
            return Err(StereoError::InvalidDimensions {
                width: region.width() as usize,
                height: region.height() as usize,
            });
        }
        if !child.accepts_out_of_bounds_regions() && !child.bounds().contains_region(&region) {
            return Err(StereoError::RegionOutOfBounds {
                region,
                cols: child.cols(),
                rows: child.rows(),
            });
        }
        Ok(Self { child, region })
    }

    /// The crop window in the source's coordinate frame.
    pub fn region(&self) -> Region {
        self.region
    }
}

impl<V: LazyView + ?Sized> LazyView for CropView<V> {
    type Pixel = V::Pixel;

    fn cols(&self) -> i32 {
        self.region.width()
    }

    fn rows(&self) -> i32 {
        self.region.height()
    }

    fn planes(&self) -> u32 {
        self.child.planes()
    }

    fn supports_partial_materialize(&self) -> bool {
        self.child.supports_partial_materialize()
    }

    fn materialize(&self, region: Region) -> StereoResult<OwnedImage<V::Pixel>> {
        check_region(&region, self.cols(), self.rows())?;
        self.child
            .materialize(region.translated(self.region.min_x(), self.region.min_y()))
    }
}
