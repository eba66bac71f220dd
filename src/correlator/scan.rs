//! Per-level integer disparity search.
//!
//! A `LevelScan` holds one pyramid level of both images plus the scoring
//! parameters. The exhaustive scan walks the full (scaled) displacement
//! window for every pixel; the guided scan restricts each pixel to a small
//! neighborhood around the disparity inherited from the coarser level.
//! Candidate order is fixed (row-major over displacements, first best
//! wins), so results are deterministic.

use crate::disparity::{Disparity, DisparityMap};
use crate::geom::Region;
use crate::image::ImageView;
use crate::kernel::{score_window, Metric};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Search context for one pyramid level.
pub(crate) struct LevelScan<'a> {
    pub(crate) left: ImageView<'a, f32>,
    pub(crate) right: ImageView<'a, f32>,
    pub(crate) metric: Metric,
    pub(crate) kernel: (usize, usize),
}

impl LevelScan<'_> {
    fn half(&self) -> (usize, usize) {
        (self.kernel.0 / 2, self.kernel.1 / 2)
    }

    /// True when the kernel window centered at `(x, y)` fits inside a
    /// `cols` x `rows` image.
    fn window_fits(&self, x: usize, y: usize, cols: usize, rows: usize) -> bool {
        let (kw, kh) = self.kernel;
        let (hw, hh) = self.half();
        x >= hw && y >= hh && x + (kw - hw) <= cols && y + (kh - hh) <= rows
    }

    /// Scores one candidate displacement for the pixel at `(x, y)`, whose
    /// left window must fit. Returns NEG_INFINITY when the displaced right
    /// window walks off the image.
    pub(crate) fn candidate_score(&self, x: usize, y: usize, dx: i32, dy: i32) -> f32 {
        let (kw, kh) = self.kernel;
        let (hw, hh) = self.half();
        let rx = x as i32 + dx - hw as i32;
        let ry = y as i32 + dy - hh as i32;
        if rx < 0
            || ry < 0
            || rx + kw as i32 > self.right.width() as i32
            || ry + kh as i32 > self.right.height() as i32
        {
            return f32::NEG_INFINITY;
        }
        score_window(
            self.metric,
            self.left,
            self.right,
            x - hw,
            y - hh,
            rx as usize,
            ry as usize,
            kw,
            kh,
        )
    }

    /// Best-scoring integer displacement in `range` for the pixel at
    /// `(x, y)`. Invalid when every candidate window walks off the padded
    /// bounds or scores as degenerate.
    fn best_at(&self, x: usize, y: usize, range: Region) -> Disparity {
        let mut best = f32::NEG_INFINITY;
        let mut best_dx = 0i32;
        let mut best_dy = 0i32;
        let mut found = false;

        for dy in range.min_y()..=range.max_y() {
            for dx in range.min_x()..=range.max_x() {
                let score = self.candidate_score(x, y, dx, dy);
                if score > best {
                    best = score;
                    best_dx = dx;
                    best_dy = dy;
                    found = true;
                }
            }
        }

        if found {
            Disparity::new(best_dx as f32, best_dy as f32, best)
        } else {
            Disparity::invalid()
        }
    }

    fn compute_row<F>(&self, y: usize, eval: &F) -> Vec<Disparity>
    where
        F: Fn(usize, usize) -> Disparity,
    {
        let cols = self.left.width();
        let rows = self.left.height();
        (0..cols)
            .map(|x| {
                if self.window_fits(x, y, cols, rows) {
                    eval(x, y)
                } else {
                    Disparity::invalid()
                }
            })
            .collect()
    }

    fn scan_with<F>(&self, parallel: bool, eval: F) -> DisparityMap
    where
        F: Fn(usize, usize) -> Disparity + Sync,
    {
        let cols = self.left.width();
        let rows = self.left.height();

        #[cfg(feature = "rayon")]
        let row_data: Vec<Vec<Disparity>> = if parallel {
            (0..rows)
                .into_par_iter()
                .map(|y| self.compute_row(y, &eval))
                .collect()
        } else {
            (0..rows).map(|y| self.compute_row(y, &eval)).collect()
        };

        #[cfg(not(feature = "rayon"))]
        let row_data: Vec<Vec<Disparity>> = {
            let _ = parallel;
            (0..rows).map(|y| self.compute_row(y, &eval)).collect()
        };

        let data: Vec<Disparity> = row_data.into_iter().flatten().collect();
        DisparityMap::new(data, cols, rows).expect("scan output is contiguous")
    }

    /// Exhaustive scan over the full displacement window.
    pub(crate) fn scan_full(&self, range: Region, parallel: bool) -> DisparityMap {
        self.scan_with(parallel, |x, y| self.best_at(x, y, range))
    }

    /// Guided scan: each pixel searches ±`radius` around the doubled
    /// coarser-level disparity at its location. Pixels invalid at the
    /// coarser level are not propagated.
    pub(crate) fn scan_guided(
        &self,
        range: Region,
        prior: &DisparityMap,
        radius: i32,
        parallel: bool,
    ) -> DisparityMap {
        self.scan_with(parallel, |x, y| {
            let px = (x / 2).min(prior.width() - 1);
            let py = (y / 2).min(prior.height() - 1);
            let coarse = prior.at(px, py);
            if !coarse.is_valid() {
                return Disparity::invalid();
            }
            let ch = ((coarse.h() as i32) * 2).clamp(range.min_x(), range.max_x());
            let cv = ((coarse.v() as i32) * 2).clamp(range.min_y(), range.max_y());
            let local = Region::new(
                (ch - radius).max(range.min_x()),
                (cv - radius).max(range.min_y()),
                (ch + radius).min(range.max_x()),
                (cv + radius).min(range.max_y()),
            );
            self.best_at(x, y, local)
        })
    }
}
