//! Image pyramid construction for grayscale `f32` images.
//!
//! Downsampling uses a 2x2 box filter: `dst = (a + b + c + d) / 4`. Level 0
//! is the base resolution; level k halves the linear resolution of level
//! k-1 with integer truncation of odd dimensions. Pyramids are built fresh
//! per correlation call and never persisted.

use crate::image::{ImageView, OwnedImage};
use crate::util::StereoResult;

/// Owned image pyramid built from a base level.
pub struct ImagePyramid {
    levels: Vec<OwnedImage<f32>>,
}

impl ImagePyramid {
    /// Builds a pyramid from a base grayscale view.
    ///
    /// `max_levels` is clamped to at least 1 so the base level is always
    /// present; building stops early once a level would drop below 2 pixels
    /// on either side.
    pub fn build(base: ImageView<'_, f32>, max_levels: usize) -> StereoResult<Self> {
        let max_levels = max_levels.max(1);
        let mut levels = Vec::with_capacity(max_levels);
        levels.push(OwnedImage::from_view(base)?);

        while levels.len() < max_levels {
            let next = {
                let src = levels.last().expect("levels is not empty").view();
                if src.width() < 2 || src.height() < 2 {
                    break;
                }
                downsample_2x2(src)?
            };
            levels.push(next);
        }

        Ok(Self { levels })
    }

    /// Returns the number of levels, base included.
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Returns a view for a specific pyramid level (0 is the base).
    pub fn level(&self, index: usize) -> Option<ImageView<'_, f32>> {
        self.levels.get(index).map(|level| level.view())
    }
}

fn downsample_2x2(src: ImageView<'_, f32>) -> StereoResult<OwnedImage<f32>> {
    let dst_width = src.width() / 2;
    let dst_height = src.height() / 2;
    let mut dst = vec![0f32; dst_width * dst_height];

    for y in 0..dst_height {
        let row0 = src.row(y * 2).expect("source row in bounds");
        let row1 = src.row(y * 2 + 1).expect("source row in bounds");
        let out = &mut dst[y * dst_width..(y + 1) * dst_width];
        for (x, slot) in out.iter_mut().enumerate() {
            let a = row0[2 * x];
            let b = row0[2 * x + 1];
            let c = row1[2 * x];
            let d = row1[2 * x + 1];
            *slot = (a + b + c + d) * 0.25;
        }
    }

    OwnedImage::new(dst, dst_width, dst_height)
}
