//! Preprocessing filters applied to both images before matching.
//!
//! Matching raw intensities is brittle under illumination differences
//! between the two cameras; the usual cure is a blur (noise suppression)
//! or a Laplacian-of-Gaussian band-pass that discards low-frequency
//! brightness while keeping local structure. Filters clamp at image
//! borders rather than shrinking the output.

use crate::image::{ImageView, OwnedImage};

/// A pure image-to-image transform run on both correlation inputs.
pub trait PreFilter: Send + Sync {
    fn apply(&self, src: ImageView<'_, f32>) -> OwnedImage<f32>;
}

/// Identity filter: match raw intensities.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullPreFilter;

impl PreFilter for NullPreFilter {
    fn apply(&self, src: ImageView<'_, f32>) -> OwnedImage<f32> {
        OwnedImage::from_view(src).expect("source view is well-formed")
    }
}

/// Separable binomial blur ([1 2 1] / 4 per axis), `passes` times.
#[derive(Clone, Copy, Debug)]
pub struct BlurPreFilter {
    pub passes: usize,
}

impl Default for BlurPreFilter {
    fn default() -> Self {
        Self { passes: 1 }
    }
}

impl PreFilter for BlurPreFilter {
    fn apply(&self, src: ImageView<'_, f32>) -> OwnedImage<f32> {
        let mut out = OwnedImage::from_view(src).expect("source view is well-formed");
        for _ in 0..self.passes {
            out = binomial_blur(out.view());
        }
        out
    }
}

/// Laplacian-of-Gaussian band-pass: binomial blur followed by a
/// 4-neighbor Laplacian.
#[derive(Clone, Copy, Debug)]
pub struct LogPreFilter {
    pub blur_passes: usize,
}

impl Default for LogPreFilter {
    fn default() -> Self {
        Self { blur_passes: 2 }
    }
}

impl PreFilter for LogPreFilter {
    fn apply(&self, src: ImageView<'_, f32>) -> OwnedImage<f32> {
        let blurred = BlurPreFilter {
            passes: self.blur_passes,
        }
        .apply(src);
        laplacian(blurred.view())
    }
}

fn clamp_index(i: isize, len: usize) -> usize {
    i.clamp(0, len as isize - 1) as usize
}

fn binomial_blur(src: ImageView<'_, f32>) -> OwnedImage<f32> {
    let width = src.width();
    let height = src.height();

    // Horizontal pass
    let mut tmp = vec![0f32; width * height];
    for y in 0..height {
        let row = src.row(y).expect("row in bounds");
        let out = &mut tmp[y * width..(y + 1) * width];
        for x in 0..width {
            let l = row[clamp_index(x as isize - 1, width)];
            let c = row[x];
            let r = row[clamp_index(x as isize + 1, width)];
            out[x] = 0.25 * l + 0.5 * c + 0.25 * r;
        }
    }

    // Vertical pass
    let mut data = vec![0f32; width * height];
    for y in 0..height {
        let y0 = clamp_index(y as isize - 1, height);
        let y1 = clamp_index(y as isize + 1, height);
        for x in 0..width {
            let a = tmp[y0 * width + x];
            let b = tmp[y * width + x];
            let c = tmp[y1 * width + x];
            data[y * width + x] = 0.25 * a + 0.5 * b + 0.25 * c;
        }
    }

    OwnedImage::new(data, width, height).expect("blur output is contiguous")
}

fn laplacian(src: ImageView<'_, f32>) -> OwnedImage<f32> {
    let width = src.width();
    let height = src.height();
    let mut data = vec![0f32; width * height];
    let s = src.as_slice();

    for y in 0..height {
        let y0 = clamp_index(y as isize - 1, height);
        let y1 = clamp_index(y as isize + 1, height);
        for x in 0..width {
            let x0 = clamp_index(x as isize - 1, width);
            let x1 = clamp_index(x as isize + 1, width);
            let center = s[y * width + x];
            data[y * width + x] = s[y0 * width + x] + s[y1 * width + x] + s[y * width + x0]
                + s[y * width + x1]
                - 4.0 * center;
        }
    }

    OwnedImage::new(data, width, height).expect("laplacian output is contiguous")
}
