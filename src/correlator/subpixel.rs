//! Subpixel disparity refinement.
//!
//! Parabolic refinement fits a three-point quadratic to the correlation
//! scores around each integer optimum, independently per enabled axis.
//! Affine refinement instead estimates a small local warp (translation
//! plus linear distortion) between the two kernel windows by Gauss-Newton
//! over intensity residuals; only the translational component enters the
//! output. Both refinements fall back to the integer disparity when a fit
//! is ill-conditioned, never to invalidation.

use crate::correlator::scan::LevelScan;
use crate::disparity::DisparityMap;
use crate::image::{ImageView, OwnedImage};
use crate::util::math::{quad_peak_offset_1d, solve_dense};

const MAX_AFFINE_ITERATIONS: usize = 10;
const AFFINE_CONVERGENCE: f64 = 1e-3;

/// Refines valid integer disparities with separable parabola fits.
pub(crate) fn refine_parabolic(map: &mut DisparityMap, scan: &LevelScan<'_>, do_h: bool, do_v: bool) {
    for y in 0..map.height() {
        for x in 0..map.width() {
            let d = map.at(x, y);
            if !d.is_valid() {
                continue;
            }
            let dx = d.h() as i32;
            let dy = d.v() as i32;
            let center = d.raw_score();

            let mut h = d.h();
            let mut v = d.v();
            if do_h {
                let sm = scan.candidate_score(x, y, dx - 1, dy);
                let sp = scan.candidate_score(x, y, dx + 1, dy);
                h += quad_peak_offset_1d(sm, center, sp).unwrap_or(0.0);
            }
            if do_v {
                let sm = scan.candidate_score(x, y, dx, dy - 1);
                let sp = scan.candidate_score(x, y, dx, dy + 1);
                v += quad_peak_offset_1d(sm, center, sp).unwrap_or(0.0);
            }

            let mut refined = d;
            refined.set_offsets(h, v);
            map.set(x, y, refined);
        }
    }
}

/// Refines valid disparities with a local affine warp fit.
pub(crate) fn refine_affine(map: &mut DisparityMap, scan: &LevelScan<'_>) {
    let (gx, gy) = gradients(scan.right);
    for y in 0..map.height() {
        for x in 0..map.width() {
            let d = map.at(x, y);
            if !d.is_valid() {
                continue;
            }
            if let Some((h, v)) = fit_affine(scan, &gx, &gy, x, y, d.h(), d.v()) {
                let mut refined = d;
                refined.set_offsets(h, v);
                map.set(x, y, refined);
            }
        }
    }
}

/// Central-difference gradient images of `src`, border rows/cols clamped.
fn gradients(src: ImageView<'_, f32>) -> (OwnedImage<f32>, OwnedImage<f32>) {
    let width = src.width();
    let height = src.height();
    let s = src.as_slice();
    let at = |x: usize, y: usize| s[y * src.stride() + x];

    let mut gx = vec![0f32; width * height];
    let mut gy = vec![0f32; width * height];
    for y in 0..height {
        let y0 = y.saturating_sub(1);
        let y1 = (y + 1).min(height - 1);
        for x in 0..width {
            let x0 = x.saturating_sub(1);
            let x1 = (x + 1).min(width - 1);
            gx[y * width + x] = 0.5 * (at(x1, y) - at(x0, y));
            gy[y * width + x] = 0.5 * (at(x, y1) - at(x, y0));
        }
    }
    (
        OwnedImage::new(gx, width, height).expect("gradient output is contiguous"),
        OwnedImage::new(gy, width, height).expect("gradient output is contiguous"),
    )
}

fn bilinear(img: ImageView<'_, f32>, x: f32, y: f32) -> Option<f32> {
    let max_x = img.width() as f32 - 1.0;
    let max_y = img.height() as f32 - 1.0;
    if !x.is_finite() || !y.is_finite() || x < 0.0 || y < 0.0 || x > max_x || y > max_y {
        return None;
    }
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(img.width() - 1);
    let y1 = (y0 + 1).min(img.height() - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let row0 = img.row(y0)?;
    let row1 = img.row(y1)?;
    let a = row0[x0];
    let b = row0[x1];
    let c = row1[x0];
    let d = row1[x1];
    Some(a * (1.0 - fx) * (1.0 - fy) + b * fx * (1.0 - fy) + c * (1.0 - fx) * fy + d * fx * fy)
}

/// Gauss-Newton fit of `right(W(u, v)) ~= left(x + u, y + v)` over the
/// kernel window, where `W` adds a translation plus linear distortion to
/// the window coordinates. Returns the refined translation, or `None` when
/// the fit leaves the window, diverges, or hits a singular system.
fn fit_affine(
    scan: &LevelScan<'_>,
    gx: &OwnedImage<f32>,
    gy: &OwnedImage<f32>,
    x: usize,
    y: usize,
    init_h: f32,
    init_v: f32,
) -> Option<(f32, f32)> {
    let (kw, kh) = scan.kernel;
    let (hw, hh) = (kw / 2, kh / 2);

    // p = [a, b, tx, c, d, ty]
    let mut p = [0.0f64, 0.0, init_h as f64, 0.0, 0.0, init_v as f64];

    for _ in 0..MAX_AFFINE_ITERATIONS {
        let mut jtj = [[0.0f64; 6]; 6];
        let mut jtr = [0.0f64; 6];

        for wy in 0..kh {
            let v = wy as f64 - hh as f64;
            let lrow = scan.left.row(y - hh + wy)?;
            for wx in 0..kw {
                let u = wx as f64 - hw as f64;
                let lval = lrow[x - hw + wx] as f64;

                let sx = (x as f64 + u + p[2] + p[0] * u + p[1] * v) as f32;
                let sy = (y as f64 + v + p[5] + p[3] * u + p[4] * v) as f32;
                let rval = bilinear(scan.right, sx, sy)? as f64;
                let grad_x = bilinear(gx.view(), sx, sy)? as f64;
                let grad_y = bilinear(gy.view(), sx, sy)? as f64;

                let residual = rval - lval;
                let jac = [
                    grad_x * u,
                    grad_x * v,
                    grad_x,
                    grad_y * u,
                    grad_y * v,
                    grad_y,
                ];
                for (i, ji) in jac.iter().enumerate() {
                    for (j, jj) in jac.iter().enumerate() {
                        jtj[i][j] += ji * jj;
                    }
                    jtr[i] += ji * residual;
                }
            }
        }

        let delta = solve_dense(jtj, jtr)?;
        for (pi, di) in p.iter_mut().zip(delta.iter()) {
            *pi -= di;
        }

        if delta[2].abs() < AFFINE_CONVERGENCE && delta[5].abs() < AFFINE_CONVERGENCE {
            break;
        }
    }

    let h = p[2] as f32;
    let v = p[5] as f32;
    // Reject drifting fits: the translation must stay near the integer
    // optimum the search already vetted.
    if (h - init_h).abs() > 1.5 || (v - init_v).abs() > 1.5 {
        return None;
    }
    Some((h, v))
}

#[cfg(test)]
mod tests {
    use super::{bilinear, gradients, refine_parabolic};
    use crate::correlator::scan::LevelScan;
    use crate::geom::Region;
    use crate::image::OwnedImage;
    use crate::kernel::Metric;

    #[test]
    fn bilinear_interpolates_and_bounds() {
        let img = OwnedImage::new(vec![0.0, 2.0, 4.0, 6.0], 2, 2).unwrap();
        assert_eq!(bilinear(img.view(), 0.0, 0.0), Some(0.0));
        assert_eq!(bilinear(img.view(), 0.5, 0.0), Some(1.0));
        assert_eq!(bilinear(img.view(), 0.5, 0.5), Some(3.0));
        assert!(bilinear(img.view(), -0.1, 0.0).is_none());
        assert!(bilinear(img.view(), 1.1, 0.0).is_none());
    }

    #[test]
    fn gradient_of_ramp_is_constant() {
        let data: Vec<f32> = (0..25).map(|i| (i % 5) as f32 * 3.0).collect();
        let img = OwnedImage::new(data, 5, 5).unwrap();
        let (gx, gy) = gradients(img.view());
        assert!((gx.at(2, 2) - 3.0).abs() < 1e-6);
        assert!(gy.at(2, 2).abs() < 1e-6);
    }

    #[test]
    fn parabolic_refinement_stays_put_on_exact_matches() {
        let data: Vec<f32> = (0..32 * 24)
            .map(|i| {
                let x = i % 32;
                let y = i / 32;
                (((x * 13) ^ (y * 7) ^ (x * y)) & 0xFF) as f32
            })
            .collect();
        let img = OwnedImage::new(data, 32, 24).unwrap();
        let scan = LevelScan {
            left: img.view(),
            right: img.view(),
            metric: Metric::Zncc,
            kernel: (8, 8),
        };
        let mut map = scan.scan_full(Region::new(0, 0, 0, 0), false);
        refine_parabolic(&mut map, &scan, true, true);
        for y in 4..20 {
            for x in 4..28 {
                let (h, v) = map.at(x, y).offsets().unwrap();
                assert!(h.abs() < 0.1, "pixel ({x},{y}) drifted to {h}");
                assert!(v.abs() < 0.1, "pixel ({x},{y}) drifted to {v}");
            }
        }
    }
}
