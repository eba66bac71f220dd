//! Correlation cost kernels.
//!
//! A kernel scores one candidate placement: the left window against the
//! right window displaced by a candidate disparity. Scores are normalized
//! so that higher is always better regardless of metric; SAD is negated.
//! The scalar implementations are the reference; the `simd` feature swaps
//! in `wide`-vectorized inner loops with identical results up to float
//! summation order.

pub(crate) mod scalar;

#[cfg(feature = "simd")]
pub(crate) mod simd;

use crate::image::ImageView;

/// Cost metric used for window matching.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Metric {
    /// Zero-mean normalized cross-correlation, in [-1, 1].
    #[default]
    Zncc,
    /// Negated sum of absolute differences, in (-inf, 0].
    Sad,
}

/// Windows with variance at or below this have no defined ZNCC score.
pub(crate) const MIN_VARIANCE: f32 = 1e-6;

#[cfg(not(feature = "simd"))]
use scalar::{sad_window as sad_impl, zncc_window as zncc_impl};
#[cfg(feature = "simd")]
use simd::{sad_window as sad_impl, zncc_window as zncc_impl};

/// Scores the `kw` x `kh` left window with top-left `(lx, ly)` against the
/// right window with top-left `(rx, ry)`.
///
/// Both windows must lie fully inside their images. Returns
/// `f32::NEG_INFINITY` when the metric is undefined for the pair (flat
/// windows under ZNCC), which orders such candidates below every real one.
#[allow(clippy::too_many_arguments)]
#[inline]
pub(crate) fn score_window(
    metric: Metric,
    left: ImageView<'_, f32>,
    right: ImageView<'_, f32>,
    lx: usize,
    ly: usize,
    rx: usize,
    ry: usize,
    kw: usize,
    kh: usize,
) -> f32 {
    match metric {
        Metric::Zncc => zncc_impl(left, right, lx, ly, rx, ry, kw, kh),
        Metric::Sad => sad_impl(left, right, lx, ly, rx, ry, kw, kh),
    }
}
