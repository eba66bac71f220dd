//! Integration tests for CorrelatorView: region contracts, tiling, and the
//! end-to-end synthetic stereo scenario.

use std::sync::Arc;

use stereocorr::{
    ChannelType, CorrelatorView, ImageFormat, LazyView, NullPreFilter, OwnedImage, PixelBuffer,
    PixelLayout, RasterView, Region, StereoError,
};

fn textured_u8(width: usize, height: usize) -> OwnedImage<u8> {
    let data = (0..width * height)
        .map(|i| {
            let x = i % width;
            let y = i / width;
            (((x * 13) ^ (y * 7) ^ (x * y)) & 0xFF) as u8
        })
        .collect();
    OwnedImage::new(data, width, height).unwrap()
}

/// right(x, y) = left(x - dx, y), zero-padded on the left edge.
fn shifted_u8(left: &OwnedImage<u8>, dx: usize) -> OwnedImage<u8> {
    let width = left.width();
    let height = left.height();
    let mut data = vec![0u8; width * height];
    for y in 0..height {
        for x in dx..width {
            data[y * width + x] = left.at(x - dx, y);
        }
    }
    OwnedImage::new(data, width, height).unwrap()
}

/// The end-to-end scenario: 64x64 pair, right shifted by 3, search
/// [-5,5] x [-5,5], kernel 8x8, subpixel off.
fn shifted_pair_view() -> CorrelatorView<OwnedImage<u8>> {
    let left = textured_u8(64, 64);
    let right = shifted_u8(&left, 3);
    let mut view =
        CorrelatorView::new(Arc::new(left), Arc::new(right), Arc::new(NullPreFilter)).unwrap();
    view.set_search_range(Region::new(-5, -5, 5, 5));
    view.set_kernel_size((8, 8));
    view.set_subpixel_options(false, false, false);
    // On a noise-free synthetic pair only exact matches matter; tight
    // thresholds keep every valid pixel at the true shift.
    view.set_corr_score_threshold(0.9);
    view.set_cross_corr_threshold(1.0);
    view
}

#[test]
fn end_to_end_shifted_pair() {
    let view = shifted_pair_view();
    let map = view.materialize(Region::with_size(0, 0, 64, 64)).unwrap();
    assert_eq!((map.width(), map.height()), (64, 64));

    for y in 8..56 {
        for x in 8..56 {
            let d = map.at(x, y);
            assert_eq!(d.offsets(), Some((3.0, 0.0)), "pixel ({x},{y})");
        }
    }
}

#[test]
fn materialized_size_matches_the_request() {
    let view = shifted_pair_view();
    for region in [
        Region::with_size(0, 0, 64, 64),
        Region::with_size(5, 9, 17, 23),
        Region::with_size(63, 63, 1, 1),
    ] {
        let map = view.materialize(region).unwrap();
        assert_eq!(map.width() as i32, region.width());
        assert_eq!(map.height() as i32, region.height());
    }
}

#[test]
fn materialization_is_deterministic() {
    let view = shifted_pair_view();
    let region = Region::with_size(4, 4, 40, 40);
    let a = view.materialize(region).unwrap();
    let b = view.materialize(region).unwrap();
    assert_eq!(a, b);
}

#[test]
fn tiling_matches_whole_region_away_from_the_split() {
    let view = shifted_pair_view();
    let whole = view.materialize(Region::with_size(0, 0, 64, 64)).unwrap();
    let west = view.materialize(Region::with_size(0, 0, 32, 64)).unwrap();
    let east = view.materialize(Region::with_size(32, 0, 32, 64)).unwrap();

    let (kw, _) = view.kernel_size();
    for y in 0..64usize {
        for x in 0..64usize {
            let tiled = if x < 32 {
                west.at(x, y)
            } else {
                east.at(x - 32, y)
            };
            let reference = whole.at(x, y);

            // Within one kernel width of the split boundary validity may
            // differ; valid-vs-valid values must agree everywhere.
            if let (Some(a), Some(b)) = (reference.offsets(), tiled.offsets()) {
                assert!(
                    (a.0 - b.0).abs() < 1e-3 && (a.1 - b.1).abs() < 1e-3,
                    "pixel ({x},{y}): whole {a:?} vs tiled {b:?}"
                );
            } else if (x as i32 - 32).abs() >= kw {
                assert_eq!(
                    reference.is_valid(),
                    tiled.is_valid(),
                    "validity diverged away from the split at ({x},{y})"
                );
            }
        }
    }

    // Both tiles contribute valid interior pixels.
    assert_eq!(west.at(16, 32).offsets(), Some((3.0, 0.0)));
    assert_eq!(east.at(16, 32).offsets(), Some((3.0, 0.0)));
}

#[test]
fn border_band_is_invalid_against_true_image_bounds() {
    let view = shifted_pair_view();
    let map = view.materialize(Region::with_size(0, 0, 64, 64)).unwrap();

    // kernel 8x8: half-window of 4 on each side has no full kernel window
    for i in 0..64usize {
        for b in 0..4usize {
            assert!(!map.at(b, i).is_valid());
            assert!(!map.at(63 - b, i).is_valid());
            assert!(!map.at(i, b).is_valid());
            assert!(!map.at(i, 63 - b).is_valid());
        }
    }

    // A tile that touches the true boundary keeps the band invalid too.
    let edge_tile = view.materialize(Region::with_size(0, 20, 16, 16)).unwrap();
    for y in 0..16usize {
        assert!(!edge_tile.at(0, y).is_valid());
        assert!(!edge_tile.at(3, y).is_valid());
    }
}

#[test]
fn zero_search_range_reports_zero_disparity() {
    let left = Arc::new(textured_u8(64, 64));
    let mut view =
        CorrelatorView::new(Arc::clone(&left), left, Arc::new(NullPreFilter)).unwrap();
    view.set_search_range(Region::new(0, 0, 0, 0));
    view.set_kernel_size((8, 8));
    view.set_subpixel_options(false, false, false);

    let map = view.materialize(Region::with_size(8, 8, 48, 48)).unwrap();
    for y in 0..48 {
        for x in 0..48 {
            let d = map.at(x, y);
            assert!(d.is_valid(), "pixel ({x},{y}) invalid");
            assert_eq!(d.offsets(), Some((0.0, 0.0)));
        }
    }
}

#[test]
fn configuration_changes_take_effect_on_the_next_materialization() {
    let left = textured_u8(64, 64);
    let right = shifted_u8(&left, 3);
    let mut view =
        CorrelatorView::new(Arc::new(left), Arc::new(right), Arc::new(NullPreFilter)).unwrap();
    view.set_kernel_size((8, 8));
    view.set_subpixel_options(false, false, false);
    view.set_corr_score_threshold(0.9);

    // A zero search range cannot see the 3-pixel shift.
    view.set_search_range(Region::new(0, 0, 0, 0));
    let before = view.materialize(Region::with_size(16, 16, 32, 32)).unwrap();
    let valid_before = before.data().iter().filter(|d| d.is_valid()).count();

    view.set_search_range(Region::new(-5, -5, 5, 5));
    let after = view.materialize(Region::with_size(16, 16, 32, 32)).unwrap();
    // The coarse levels cannot vouch for pixels near the tile's padding;
    // the central band must all lock onto the shift.
    for y in 8..24 {
        for x in 8..24 {
            assert_eq!(after.at(x, y).offsets(), Some((3.0, 0.0)), "pixel ({x},{y})");
        }
    }
    assert!(valid_before < 32 * 32);
}

#[test]
fn construction_rejects_mismatched_sizes() {
    let left = Arc::new(textured_u8(64, 64));
    let right = Arc::new(textured_u8(64, 60));
    let err = CorrelatorView::new(left, right, Arc::new(NullPreFilter)).unwrap_err();
    assert!(matches!(err, StereoError::DimensionMismatch { .. }));
}

#[test]
fn construction_rejects_multi_plane_inputs() {
    let fmt = ImageFormat {
        cols: 32,
        rows: 32,
        planes: 2,
        pixel_layout: PixelLayout::Gray,
        channel_type: ChannelType::U8,
    };
    let buf = Arc::new(PixelBuffer::new(fmt).unwrap());
    let left: Arc<RasterView<u8>> = Arc::new(RasterView::new(Arc::clone(&buf)));
    let right: Arc<RasterView<u8>> = Arc::new(RasterView::new(buf));
    let err = CorrelatorView::new(left, right, Arc::new(NullPreFilter)).unwrap_err();
    assert!(matches!(err, StereoError::MultiPlaneInput { planes: 2 }));
}

#[test]
fn disparity_view_feeds_downstream_tiling() {
    // A consumer that pulls tiles through the LazyView contract, the way a
    // tile store would.
    let view: Arc<dyn LazyView<Pixel = stereocorr::Disparity>> = Arc::new(shifted_pair_view());
    let mut assembled = vec![None; 64 * 64];
    for ty in 0..4 {
        for tx in 0..4 {
            let region = Region::with_size(tx * 16, ty * 16, 16, 16);
            let tile = view.materialize(region).unwrap();
            for y in 0..16usize {
                for x in 0..16usize {
                    assembled[(ty as usize * 16 + y) * 64 + tx as usize * 16 + x] =
                        Some(tile.at(x, y));
                }
            }
        }
    }
    let center = assembled[32 * 64 + 32].unwrap();
    assert_eq!(center.offsets(), Some((3.0, 0.0)));
    assert!(assembled.iter().all(|p| p.is_some()));
}
