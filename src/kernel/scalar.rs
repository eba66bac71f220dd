//! Scalar reference kernels for window scoring.

use crate::image::ImageView;
use crate::kernel::MIN_VARIANCE;

#[allow(clippy::too_many_arguments)]
pub(crate) fn zncc_window(
    left: ImageView<'_, f32>,
    right: ImageView<'_, f32>,
    lx: usize,
    ly: usize,
    rx: usize,
    ry: usize,
    kw: usize,
    kh: usize,
) -> f32 {
    let n = (kw * kh) as f32;
    let mut dot = 0.0f32;
    let mut sum_l = 0.0f32;
    let mut sum_l2 = 0.0f32;
    let mut sum_r = 0.0f32;
    let mut sum_r2 = 0.0f32;

    for ty in 0..kh {
        let lrow = &left.row(ly + ty).expect("left row within bounds")[lx..lx + kw];
        let rrow = &right.row(ry + ty).expect("right row within bounds")[rx..rx + kw];
        for (a, b) in lrow.iter().zip(rrow.iter()) {
            dot += a * b;
            sum_l += a;
            sum_l2 += a * a;
            sum_r += b;
            sum_r2 += b * b;
        }
    }

    let var_l = sum_l2 - sum_l * sum_l / n;
    let var_r = sum_r2 - sum_r * sum_r / n;
    if var_l <= MIN_VARIANCE || var_r <= MIN_VARIANCE {
        return f32::NEG_INFINITY;
    }

    let cov = dot - sum_l * sum_r / n;
    let score = cov / (var_l * var_r).sqrt();
    if score.is_finite() {
        score
    } else {
        f32::NEG_INFINITY
    }
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn sad_window(
    left: ImageView<'_, f32>,
    right: ImageView<'_, f32>,
    lx: usize,
    ly: usize,
    rx: usize,
    ry: usize,
    kw: usize,
    kh: usize,
) -> f32 {
    let mut sum = 0.0f32;
    for ty in 0..kh {
        let lrow = &left.row(ly + ty).expect("left row within bounds")[lx..lx + kw];
        let rrow = &right.row(ry + ty).expect("right row within bounds")[rx..rx + kw];
        for (a, b) in lrow.iter().zip(rrow.iter()) {
            sum += (a - b).abs();
        }
    }
    -sum
}
