//! Coarse-to-fine pyramid correlation.
//!
//! [`PyramidCorrelator`] turns two equal-size, search-range-padded
//! grayscale buffers into a dense disparity map: both inputs are
//! pre-filtered, pyramids are built by repeated 2x downsampling, the
//! coarsest level is searched exhaustively, and each finer level searches
//! a small neighborhood around the doubled coarser result. The finest
//! level is vetted by a left-right consistency check and a score cutoff
//! before optional subpixel refinement. [`CorrelatorView`] wraps the
//! correlator behind the lazy-view contract for tile-by-tile evaluation.

pub(crate) mod scan;
mod subpixel;
mod view;

pub use view::CorrelatorView;

use std::sync::Arc;

use crate::disparity::DisparityMap;
use crate::geom::Region;
use crate::image::pyramid::ImagePyramid;
use crate::image::ImageView;
use crate::kernel::Metric;
use crate::prefilter::PreFilter;
use crate::trace::{trace_event, trace_span};
use crate::util::{StereoError, StereoResult};
use scan::LevelScan;

/// Half-width of the per-pixel window searched around a propagated
/// coarse disparity, in the finer level's scaled units.
const GUIDED_RADIUS: i32 = 2;

/// Settings shared by [`PyramidCorrelator`] and [`CorrelatorView`].
#[derive(Clone, Copy, Debug)]
pub struct CorrelatorConfig {
    /// Displacement search rectangle; both corners are inclusive candidate
    /// bounds, so an axis spans `width() + 1` integer candidates.
    pub search_range: Region,
    /// Full correlation window size in pixels.
    pub kernel_size: (i32, i32),
    /// Maximum disagreement in pixels between the forward and reverse
    /// disparity before a pixel fails the consistency check.
    pub cross_corr_threshold: f32,
    /// Minimum acceptable match score; scores are higher-is-better for
    /// every metric, so a SAD cutoff is a negated sum.
    pub corr_score_threshold: f32,
    pub subpixel_h: bool,
    pub subpixel_v: bool,
    /// When set, supersedes the parabolic fits with a local affine warp
    /// estimate whose translational component becomes the disparity.
    pub subpixel_affine: bool,
    pub metric: Metric,
    /// Floor on pyramid depth; the derived depth also never exceeds what
    /// the image size supports.
    pub min_pyramid_levels: usize,
    /// Row-parallel level scans (requires the `rayon` feature).
    pub parallel: bool,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            search_range: Region::new(-50, -50, 50, 50),
            kernel_size: (24, 24),
            cross_corr_threshold: 2.0,
            corr_score_threshold: 0.3,
            subpixel_h: true,
            subpixel_v: true,
            subpixel_affine: false,
            metric: Metric::Zncc,
            min_pyramid_levels: 1,
            parallel: false,
        }
    }
}

/// Receiver for intermediate per-level disparity maps.
///
/// A diagnostic side channel only: the sink sees each pyramid level's map
/// (coarsest first) during the forward pass and never affects the returned
/// result.
pub trait DiagnosticSink: Send + Sync {
    fn level_disparity(&self, level: usize, map: &DisparityMap);
}

/// Writes each level's disparity map as a normalized grayscale image named
/// `{prefix}L{level}.png`. Write failures are traced and otherwise ignored.
#[cfg(feature = "image-io")]
pub struct FileDiagnosticSink {
    prefix: String,
}

#[cfg(feature = "image-io")]
impl FileDiagnosticSink {
    pub fn new(prefix: String) -> Self {
        Self { prefix }
    }
}

#[cfg(feature = "image-io")]
impl DiagnosticSink for FileDiagnosticSink {
    fn level_disparity(&self, level: usize, map: &DisparityMap) {
        let path = format!("{}L{}.png", self.prefix, level);
        if crate::image::io::save_disparity_image(map, &path).is_err() {
            trace_event!("debug_write_failed", level = level);
        }
    }
}

/// Coarse-to-fine window correlator over a stereo pair.
///
/// Inputs are treated as read-only; every call allocates and returns a
/// fresh map, so one correlator may serve concurrent callers.
pub struct PyramidCorrelator {
    config: CorrelatorConfig,
    sink: Option<Arc<dyn DiagnosticSink>>,
}

impl PyramidCorrelator {
    /// Correlator with the given search range and kernel size and default
    /// thresholds.
    pub fn new(search_range: Region, kernel_size: (i32, i32)) -> Self {
        Self::with_config(CorrelatorConfig {
            search_range,
            kernel_size,
            ..CorrelatorConfig::default()
        })
    }

    pub fn with_config(config: CorrelatorConfig) -> Self {
        Self { config, sink: None }
    }

    pub fn config(&self) -> &CorrelatorConfig {
        &self.config
    }

    /// Installs (or clears) the diagnostic side channel.
    pub fn set_diagnostic_sink(&mut self, sink: Option<Arc<dyn DiagnosticSink>>) {
        self.sink = sink;
    }

    /// Computes a dense disparity map for `left` against `right`.
    ///
    /// The images must agree in size and are expected to carry the search
    /// and kernel padding already (see [`CorrelatorView`] for the padding
    /// arithmetic). Border pixels without a full kernel window, pixels
    /// failing the consistency check, and pixels under the score cutoff
    /// come back invalid rather than erroring.
    pub fn correlate(
        &self,
        left: ImageView<'_, f32>,
        right: ImageView<'_, f32>,
        prefilter: &dyn PreFilter,
    ) -> StereoResult<DisparityMap> {
        if left.width() != right.width() || left.height() != right.height() {
            return Err(StereoError::DimensionMismatch {
                left_cols: left.width() as i32,
                left_rows: left.height() as i32,
                right_cols: right.width() as i32,
                right_rows: right.height() as i32,
            });
        }
        let (kw, kh) = self.kernel()?;

        let _span = trace_span!(
            "pyramid_correlate",
            cols = left.width(),
            rows = left.height()
        )
        .entered();

        let left = prefilter.apply(left);
        let right = prefilter.apply(right);

        let levels = self.level_count(left.width(), left.height());
        let left_pyr = ImagePyramid::build(left.view(), levels)?;
        let right_pyr = ImagePyramid::build(right.view(), levels)?;

        let range = self.config.search_range;
        let mut forward = self.coarse_to_fine(&left_pyr, &right_pyr, range, true);

        // Reverse pass for the consistency check: roles swapped, range
        // negated.
        let reverse_range = Region::new(
            -range.max_x(),
            -range.max_y(),
            -range.min_x(),
            -range.min_y(),
        );
        let reverse = self.coarse_to_fine(&right_pyr, &left_pyr, reverse_range, false);
        cross_check(&mut forward, &reverse, self.config.cross_corr_threshold);

        for d in forward.data_mut() {
            if d.is_valid() && d.raw_score() < self.config.corr_score_threshold {
                d.invalidate();
            }
        }

        let finest = LevelScan {
            left: left_pyr.level(0).expect("pyramid has a base level"),
            right: right_pyr.level(0).expect("pyramid has a base level"),
            metric: self.config.metric,
            kernel: (kw, kh),
        };
        if self.config.subpixel_affine {
            subpixel::refine_affine(&mut forward, &finest);
        } else if self.config.subpixel_h || self.config.subpixel_v {
            subpixel::refine_parabolic(
                &mut forward,
                &finest,
                self.config.subpixel_h,
                self.config.subpixel_v,
            );
        }

        Ok(forward)
    }

    fn kernel(&self) -> StereoResult<(usize, usize)> {
        let (kw, kh) = self.config.kernel_size;
        if kw <= 0 || kh <= 0 {
            return Err(StereoError::InvalidDimensions {
                width: kw.max(0) as usize,
                height: kh.max(0) as usize,
            });
        }
        Ok((kw as usize, kh as usize))
    }

    /// Pyramid depth: log2 of the larger search dimension, floored by the
    /// configured minimum and clamped so the coarsest level still holds a
    /// kernel window plus the scaled search range with room to move.
    fn level_count(&self, cols: usize, rows: usize) -> usize {
        let range = self.config.search_range;
        let dim = range.width().max(range.height()).max(1) as f32;
        let mut levels = (dim.log2().floor() as usize)
            .max(self.config.min_pyramid_levels)
            .max(1);

        let (kw, kh) = self.config.kernel_size;
        let (kw, kh) = (kw.max(1) as usize, kh.max(1) as usize);
        while levels > 1 {
            let scaled = range.scaled_down(levels as u32 - 1);
            let need_c = kw + scaled.width() as usize + 1;
            let need_r = kh + scaled.height() as usize + 1;
            if (cols >> (levels - 1)) >= need_c && (rows >> (levels - 1)) >= need_r {
                break;
            }
            levels -= 1;
        }
        levels
    }

    fn coarse_to_fine(
        &self,
        left: &ImagePyramid,
        right: &ImagePyramid,
        range: Region,
        emit_debug: bool,
    ) -> DisparityMap {
        let (kw, kh) = self
            .kernel()
            .expect("kernel validated before pyramid construction");
        let levels = left.num_levels().min(right.num_levels());

        let mut result: Option<DisparityMap> = None;
        for level in (0..levels).rev() {
            let scan = LevelScan {
                left: left.level(level).expect("level index within pyramid"),
                right: right.level(level).expect("level index within pyramid"),
                metric: self.config.metric,
                kernel: (kw, kh),
            };
            let scaled = range.scaled_down(level as u32);
            let map = match &result {
                None => scan.scan_full(scaled, self.config.parallel),
                Some(prior) => scan.scan_guided(scaled, prior, GUIDED_RADIUS, self.config.parallel),
            };
            trace_event!(
                "level_searched",
                level = level,
                cols = map.width(),
                rows = map.height()
            );
            if emit_debug {
                if let Some(sink) = &self.sink {
                    sink.level_disparity(level, &map);
                }
            }
            result = Some(map);
        }
        result.expect("pyramid has at least one level")
    }
}

/// Invalidates forward pixels whose reverse match disagrees by more than
/// `threshold` pixels on either axis, or has no valid reverse match at all.
fn cross_check(forward: &mut DisparityMap, reverse: &DisparityMap, threshold: f32) {
    let cols = reverse.width() as i32;
    let rows = reverse.height() as i32;
    for y in 0..forward.height() {
        for x in 0..forward.width() {
            let d = forward.at(x, y);
            if !d.is_valid() {
                continue;
            }
            let rx = x as i32 + d.h() as i32;
            let ry = y as i32 + d.v() as i32;

            let consistent = rx >= 0 && rx < cols && ry >= 0 && ry < rows && {
                let r = reverse.at(rx as usize, ry as usize);
                r.is_valid()
                    && (d.h() + r.h()).abs() <= threshold
                    && (d.v() + r.v()).abs() <= threshold
            };
            if !consistent {
                forward.set(x, y, crate::disparity::Disparity::invalid());
            }
        }
    }
}
