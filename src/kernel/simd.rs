//! SIMD-accelerated kernels using the `wide` crate.
//!
//! The inner window-row loop is vectorized to process 8 samples at a time
//! with `f32x8`; the row remainder falls back to scalar accumulation.
//! Results match the scalar kernels up to float summation order.

use crate::image::ImageView;
use crate::kernel::MIN_VARIANCE;
use wide::f32x8;

const LANES: usize = 8;

/// Load 8 f32 values into f32x8.
#[inline]
fn load_f32x8(slice: &[f32]) -> f32x8 {
    f32x8::from([
        slice[0], slice[1], slice[2], slice[3], slice[4], slice[5], slice[6], slice[7],
    ])
}

/// Horizontal sum of f32x8.
#[inline]
fn hsum(v: f32x8) -> f32 {
    let arr = v.to_array();
    arr[0] + arr[1] + arr[2] + arr[3] + arr[4] + arr[5] + arr[6] + arr[7]
}

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
    let simd_end = kw / LANES * LANES;

    let mut dot_v = f32x8::ZERO;
    let mut sum_l_v = f32x8::ZERO;
    let mut sum_l2_v = f32x8::ZERO;
    let mut sum_r_v = f32x8::ZERO;
    let mut sum_r2_v = f32x8::ZERO;

    let mut dot_s = 0.0f32;
    let mut sum_l_s = 0.0f32;
    let mut sum_l2_s = 0.0f32;
    let mut sum_r_s = 0.0f32;
    let mut sum_r2_s = 0.0f32;

    for ty in 0..kh {
        let lrow = &left.row(ly + ty).expect("left row within bounds")[lx..lx + kw];
        let rrow = &right.row(ry + ty).expect("right row within bounds")[rx..rx + kw];

        let mut tx = 0;
        while tx < simd_end {
            let a = load_f32x8(&lrow[tx..]);
            let b = load_f32x8(&rrow[tx..]);
            dot_v += a * b;
            sum_l_v += a;
            sum_l2_v += a * a;
            sum_r_v += b;
            sum_r2_v += b * b;
            tx += LANES;
        }
        for (a, b) in lrow[simd_end..].iter().zip(rrow[simd_end..].iter()) {
            dot_s += a * b;
            sum_l_s += a;
            sum_l2_s += a * a;
            sum_r_s += b;
            sum_r2_s += b * b;
        }
    }

    let dot = hsum(dot_v) + dot_s;
    let sum_l = hsum(sum_l_v) + sum_l_s;
    let sum_l2 = hsum(sum_l2_v) + sum_l2_s;
    let sum_r = hsum(sum_r_v) + sum_r_s;
    let sum_r2 = hsum(sum_r2_v) + sum_r2_s;

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
    let simd_end = kw / LANES * LANES;
    let mut sum_v = f32x8::ZERO;
    let mut sum_s = 0.0f32;

    for ty in 0..kh {
        let lrow = &left.row(ly + ty).expect("left row within bounds")[lx..lx + kw];
        let rrow = &right.row(ry + ty).expect("right row within bounds")[rx..rx + kw];

        let mut tx = 0;
        while tx < simd_end {
            let a = load_f32x8(&lrow[tx..]);
            let b = load_f32x8(&rrow[tx..]);
            sum_v += (a - b).abs();
            tx += LANES;
        }
        for (a, b) in lrow[simd_end..].iter().zip(rrow[simd_end..].iter()) {
            sum_s += (a - b).abs();
        }
    }

    -(hsum(sum_v) + sum_s)
}
