//! The correlation engine behind the lazy-view contract.

use std::fmt;
use std::sync::Arc;

use crate::correlator::{CorrelatorConfig, PyramidCorrelator};
use crate::disparity::{shift_valid, Disparity, DisparityMap};
use crate::geom::Region;
use crate::image::OwnedImage;
use crate::kernel::Metric;
use crate::prefilter::PreFilter;
use crate::raster::ScalarPixel;
use crate::trace::{trace_event, trace_span};
use crate::util::{StereoError, StereoResult};
use crate::view::{check_region, edge_extend, EdgePolicy, LazyView};

/// A [`LazyView`] of disparities over two input views.
///
/// Materializing an output region computes the padded left/right input
/// regions (search range plus kernel), pulls them through zero edge
/// extension, runs [`PyramidCorrelator`] with a window-local search range,
/// shifts the resulting disparities back by the search-range origin, and
/// crops to the exact requested region. Independent regions may be
/// materialized concurrently; configuration changes take effect on the
/// next materialization.
pub struct CorrelatorView<V: LazyView + ?Sized> {
    left: Arc<V>,
    right: Arc<V>,
    prefilter: Arc<dyn PreFilter>,
    config: CorrelatorConfig,
    debug_prefix: Option<String>,
}

impl<V: LazyView + ?Sized> fmt::Debug for CorrelatorView<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrelatorView")
            .field("config", &self.config)
            .field("debug_prefix", &self.debug_prefix)
            .finish_non_exhaustive()
    }
}

impl<V> CorrelatorView<V>
where
    V: LazyView + ?Sized,
    V::Pixel: ScalarPixel,
{
    /// Builds a correlator view over two equal-size, single-plane input
    /// views. Single-channel input is enforced by the scalar pixel bound.
    pub fn new(
        left: Arc<V>,
        right: Arc<V>,
        prefilter: Arc<dyn PreFilter>,
    ) -> StereoResult<Self> {
        if left.cols() != right.cols() || left.rows() != right.rows() {
            return Err(StereoError::DimensionMismatch {
                left_cols: left.cols(),
                left_rows: left.rows(),
                right_cols: right.cols(),
                right_rows: right.rows(),
            });
        }
        for planes in [left.planes(), right.planes()] {
            if planes != 1 {
                return Err(StereoError::MultiPlaneInput { planes });
            }
        }
        Ok(Self {
            left,
            right,
            prefilter,
            config: CorrelatorConfig::default(),
            debug_prefix: None,
        })
    }

    pub fn config(&self) -> &CorrelatorConfig {
        &self.config
    }

    pub fn search_range(&self) -> Region {
        self.config.search_range
    }

    pub fn set_search_range(&mut self, range: Region) {
        self.config.search_range = range;
    }

    pub fn kernel_size(&self) -> (i32, i32) {
        self.config.kernel_size
    }

    pub fn set_kernel_size(&mut self, size: (i32, i32)) {
        self.config.kernel_size = size;
    }

    pub fn subpixel_options(&self) -> (bool, bool, bool) {
        (
            self.config.subpixel_h,
            self.config.subpixel_v,
            self.config.subpixel_affine,
        )
    }

    pub fn set_subpixel_options(&mut self, horizontal: bool, vertical: bool, affine: bool) {
        self.config.subpixel_h = horizontal;
        self.config.subpixel_v = vertical;
        self.config.subpixel_affine = affine;
    }

    pub fn cross_corr_threshold(&self) -> f32 {
        self.config.cross_corr_threshold
    }

    pub fn set_cross_corr_threshold(&mut self, threshold: f32) {
        self.config.cross_corr_threshold = threshold;
    }

    pub fn corr_score_threshold(&self) -> f32 {
        self.config.corr_score_threshold
    }

    pub fn set_corr_score_threshold(&mut self, threshold: f32) {
        self.config.corr_score_threshold = threshold;
    }

    pub fn metric(&self) -> Metric {
        self.config.metric
    }

    pub fn set_metric(&mut self, metric: Metric) {
        self.config.metric = metric;
    }

    /// Enables the per-level diagnostic side channel (requires the
    /// `image-io` feature to take effect); the prefix is extended with the
    /// materialized region so tiles do not collide.
    pub fn set_debug_prefix(&mut self, prefix: Option<String>) {
        self.debug_prefix = prefix;
    }

    fn materialize_padded_f32(
        &self,
        view: &Arc<V>,
        region: Region,
    ) -> StereoResult<OwnedImage<f32>> {
        let padded = edge_extend(Arc::clone(view), EdgePolicy::Zero).materialize(region)?;
        let width = padded.width();
        let height = padded.height();
        let data = padded.data().iter().map(|p| p.to_f32()).collect();
        OwnedImage::new(data, width, height)
    }
}

impl<V> LazyView for CorrelatorView<V>
where
    V: LazyView + ?Sized,
    V::Pixel: ScalarPixel,
{
    type Pixel = Disparity;

    fn cols(&self) -> i32 {
        self.left.cols()
    }

    fn rows(&self) -> i32 {
        self.left.rows()
    }

    fn materialize(&self, region: Region) -> StereoResult<DisparityMap> {
        check_region(&region, self.cols(), self.rows())?;
        let (kw, kh) = self.config.kernel_size;
        if kw <= 0 || kh <= 0 {
            return Err(StereoError::InvalidDimensions {
                width: kw.max(0) as usize,
                height: kh.max(0) as usize,
            });
        }

        let _span = trace_span!(
            "correlate_block",
            min_x = region.min_x(),
            min_y = region.min_y(),
            width = region.width(),
            height = region.height()
        )
        .entered();

        // The searched area of the right image is the output region plus
        // the search range; the left region must match its size so the
        // correlator sees equal buffers.
        let range = self.config.search_range;
        let right_region = Region::new(
            region.min_x() + range.min_x(),
            region.min_y() + range.min_y(),
            region.max_x() + range.max_x(),
            region.max_y() + range.max_y(),
        );
        let left_region = Region::with_size(
            region.min_x(),
            region.min_y(),
            right_region.width(),
            right_region.height(),
        );

        // Both regions grow by the kernel size so every output pixel's
        // window is covered.
        let left_padded = left_region.expanded(kw, kh);
        let right_padded = right_region.expanded(kw, kh);

        let left_buf = self.materialize_padded_f32(&self.left, left_padded)?;
        let right_buf = self.materialize_padded_f32(&self.right, right_padded)?;

        let mut config = self.config;
        config.search_range = Region::new(0, 0, range.width(), range.height());
        let mut correlator = PyramidCorrelator::with_config(config);

        #[cfg(feature = "image-io")]
        if let Some(prefix) = &self.debug_prefix {
            let tile_prefix = format!(
                "{}-{}-{}_{}-{}-",
                prefix,
                region.min_x(),
                region.max_x(),
                region.min_y(),
                region.max_y()
            );
            correlator.set_diagnostic_sink(Some(Arc::new(
                crate::correlator::FileDiagnosticSink::new(tile_prefix),
            )));
        }
        #[cfg(not(feature = "image-io"))]
        if self.debug_prefix.is_some() {
            trace_event!("debug_prefix_ignored");
        }

        let mut map =
            correlator.correlate(left_buf.view(), right_buf.view(), self.prefilter.as_ref())?;

        // Disparities come back in window-local coordinates; restore the
        // caller's search-range frame.
        shift_valid(&mut map, range.min_x() as f32, range.min_y() as f32);

        // The requested region sits at the kernel-padding offset inside
        // the padded result.
        let mut out = map.materialize(Region::with_size(
            kw,
            kh,
            region.width(),
            region.height(),
        ))?;

        invalidate_true_borders(&mut out, region, self.cols(), self.rows(), kw, kh);

        trace_event!(
            "block_correlated",
            valid = out.data().iter().filter(|d| d.is_valid()).count()
        );
        Ok(out)
    }
}

/// Marks output pixels whose kernel window crosses the true input image
/// boundary as invalid: no full window exists for them, only padding.
fn invalidate_true_borders(
    out: &mut DisparityMap,
    region: Region,
    cols: i32,
    rows: i32,
    kw: i32,
    kh: i32,
) {
    let hw = kw / 2;
    let hh = kh / 2;
    for y in 0..out.height() {
        let wy = region.min_y() + y as i32;
        let row_ok = wy >= hh && wy + (kh - hh) <= rows;
        for x in 0..out.width() {
            let wx = region.min_x() + x as i32;
            if !row_ok || wx < hw || wx + (kw - hw) > cols {
                out.set(x, y, Disparity::invalid());
            }
        }
    }
}
