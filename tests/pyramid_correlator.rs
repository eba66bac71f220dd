//! Integration tests driving PyramidCorrelator on synthetic stereo pairs.

use stereocorr::{
    CorrelatorConfig, LogPreFilter, Metric, NullPreFilter, OwnedImage, PyramidCorrelator, Region,
    StereoError,
};

fn textured(width: usize, height: usize) -> OwnedImage<f32> {
    let data = (0..width * height)
        .map(|i| {
            let x = i % width;
            let y = i / width;
            (((x * 13) ^ (y * 7) ^ (x * y)) & 0xFF) as f32
        })
        .collect();
    OwnedImage::new(data, width, height).unwrap()
}

/// right(x, y) = left(x - dx, y - dy), zero-filled where the shift walks
/// off the left image.
fn shifted(left: &OwnedImage<f32>, dx: usize, dy: usize) -> OwnedImage<f32> {
    let width = left.width();
    let height = left.height();
    let mut data = vec![0f32; width * height];
    for y in dy..height {
        for x in dx..width {
            data[y * width + x] = left.at(x - dx, y - dy);
        }
    }
    OwnedImage::new(data, width, height).unwrap()
}

fn config(range: Region, kernel: (i32, i32)) -> CorrelatorConfig {
    CorrelatorConfig {
        search_range: range,
        kernel_size: kernel,
        subpixel_h: false,
        subpixel_v: false,
        subpixel_affine: false,
        ..CorrelatorConfig::default()
    }
}

#[test]
fn constant_shift_yields_uniform_disparity() {
    let left = textured(100, 80);
    let right = shifted(&left, 4, 0);
    let correlator = PyramidCorrelator::with_config(config(Region::new(0, 0, 8, 2), (8, 8)));
    let map = correlator
        .correlate(left.view(), right.view(), &NullPreFilter)
        .unwrap();

    assert_eq!((map.width(), map.height()), (100, 80));
    for y in 16..64 {
        for x in 16..72 {
            let d = map.at(x, y);
            assert_eq!(d.offsets(), Some((4.0, 0.0)), "pixel ({x},{y})");
            assert!(
                d.score().unwrap() > 0.99,
                "pixel ({x},{y}) scored {}",
                d.score().unwrap()
            );
        }
    }
}

#[test]
fn diagonal_shift_is_recovered() {
    let left = textured(96, 96);
    let right = shifted(&left, 3, 2);
    let correlator = PyramidCorrelator::with_config(config(Region::new(0, 0, 6, 6), (8, 8)));
    let map = correlator
        .correlate(left.view(), right.view(), &NullPreFilter)
        .unwrap();

    for y in 20..70 {
        for x in 20..70 {
            assert_eq!(map.at(x, y).offsets(), Some((3.0, 2.0)), "pixel ({x},{y})");
        }
    }
}

#[test]
fn zero_search_range_degenerates_to_identity() {
    let left = textured(64, 64);
    let mut cfg = config(Region::new(0, 0, 0, 0), (8, 8));
    cfg.subpixel_h = true;
    cfg.subpixel_v = true;
    let correlator = PyramidCorrelator::with_config(cfg);
    let map = correlator
        .correlate(left.view(), left.view(), &NullPreFilter)
        .unwrap();

    for y in 8..56 {
        for x in 8..56 {
            let (h, v) = map.at(x, y).offsets().expect("interior pixel valid");
            assert!(h.abs() < 0.15, "pixel ({x},{y}) h drifted to {h}");
            assert!(v.abs() < 0.15, "pixel ({x},{y}) v drifted to {v}");
        }
    }
}

#[test]
fn affine_refinement_respects_perfect_alignment() {
    let left = textured(64, 64);
    let mut cfg = config(Region::new(0, 0, 0, 0), (8, 8));
    cfg.subpixel_affine = true;
    let correlator = PyramidCorrelator::with_config(cfg);
    let map = correlator
        .correlate(left.view(), left.view(), &NullPreFilter)
        .unwrap();

    for y in 10..54 {
        for x in 10..54 {
            let (h, v) = map.at(x, y).offsets().expect("interior pixel valid");
            assert!(h.abs() < 0.1, "pixel ({x},{y}) h drifted to {h}");
            assert!(v.abs() < 0.1, "pixel ({x},{y}) v drifted to {v}");
        }
    }
}

#[test]
fn sad_metric_recovers_shift() {
    let left = textured(80, 80);
    let right = shifted(&left, 2, 1);
    let mut cfg = config(Region::new(0, 0, 4, 4), (8, 8));
    cfg.metric = Metric::Sad;
    // SAD scores are negated sums; a perfect match is 0
    cfg.corr_score_threshold = -1.0;
    let correlator = PyramidCorrelator::with_config(cfg);
    let map = correlator
        .correlate(left.view(), right.view(), &NullPreFilter)
        .unwrap();

    for y in 16..60 {
        for x in 16..60 {
            assert_eq!(map.at(x, y).offsets(), Some((2.0, 1.0)), "pixel ({x},{y})");
        }
    }
}

#[test]
fn log_prefilter_cancels_brightness_offset() {
    let left = textured(80, 80);
    let bright: Vec<f32> = shifted(&left, 3, 0).data().iter().map(|v| v + 40.0).collect();
    let right = OwnedImage::new(bright, 80, 80).unwrap();

    // SAD on raw intensities would be destroyed by the +40 offset; the
    // band-pass prefilter removes it before matching.
    let mut cfg = config(Region::new(0, 0, 6, 2), (8, 8));
    cfg.metric = Metric::Sad;
    cfg.corr_score_threshold = f32::MIN;
    cfg.cross_corr_threshold = 1.0;
    let correlator = PyramidCorrelator::with_config(cfg);
    let map = correlator
        .correlate(left.view(), right.view(), &LogPreFilter::default())
        .unwrap();

    let mut hits = 0usize;
    let mut total = 0usize;
    for y in 20..60 {
        for x in 20..60 {
            total += 1;
            if map.at(x, y).offsets() == Some((3.0, 0.0)) {
                hits += 1;
            }
        }
    }
    assert!(
        hits * 10 >= total * 9,
        "only {hits}/{total} pixels recovered the shift"
    );
}

#[test]
fn small_sensor_noise_is_tolerated() {
    use rand::{Rng, SeedableRng};

    let left = textured(96, 80);
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    let noisy: Vec<f32> = shifted(&left, 4, 0)
        .data()
        .iter()
        .map(|v| v + rng.random_range(-2.0f32..2.0))
        .collect();
    let right = OwnedImage::new(noisy, 96, 80).unwrap();

    let correlator = PyramidCorrelator::with_config(config(Region::new(0, 0, 8, 2), (8, 8)));
    let map = correlator
        .correlate(left.view(), right.view(), &NullPreFilter)
        .unwrap();

    let mut hits = 0usize;
    let mut total = 0usize;
    for y in 16..64 {
        for x in 16..72 {
            total += 1;
            if map.at(x, y).offsets() == Some((4.0, 0.0)) {
                hits += 1;
            }
        }
    }
    assert!(
        hits * 10 >= total * 9,
        "only {hits}/{total} pixels recovered the shift under noise"
    );
}

#[test]
fn score_cutoff_above_metric_maximum_invalidates_everything() {
    let left = textured(48, 48);
    let mut cfg = config(Region::new(0, 0, 2, 2), (8, 8));
    // ZNCC tops out at 1.0
    cfg.corr_score_threshold = 1.1;
    let correlator = PyramidCorrelator::with_config(cfg);
    let map = correlator
        .correlate(left.view(), left.view(), &NullPreFilter)
        .unwrap();
    assert!(map.data().iter().all(|d| !d.is_valid()));
}

#[test]
fn uncorrelated_pair_fails_the_consistency_check() {
    let left = textured(64, 64);
    let noise: Vec<f32> = (0..64 * 64)
        .map(|i| {
            let x = i % 64;
            let y = i / 64;
            (((x * 31) ^ (y * 17) ^ (x + 3 * y)) & 0xFF) as f32
        })
        .collect();
    let right = OwnedImage::new(noise, 64, 64).unwrap();

    let mut cfg = config(Region::new(0, 0, 6, 6), (8, 8));
    cfg.corr_score_threshold = 0.8;
    let correlator = PyramidCorrelator::with_config(cfg);
    let map = correlator
        .correlate(left.view(), right.view(), &NullPreFilter)
        .unwrap();

    let valid = map.data().iter().filter(|d| d.is_valid()).count();
    assert!(
        valid * 10 < map.data().len(),
        "{valid} of {} pixels survived on uncorrelated inputs",
        map.data().len()
    );
}

#[test]
fn mismatched_inputs_are_rejected() {
    let left = textured(32, 32);
    let right = textured(32, 30);
    let correlator = PyramidCorrelator::new(Region::new(0, 0, 2, 2), (8, 8));
    let err = correlator
        .correlate(left.view(), right.view(), &NullPreFilter)
        .unwrap_err();
    assert!(matches!(err, StereoError::DimensionMismatch { .. }));
}

#[test]
fn kernel_walking_off_a_tiny_image_is_not_an_error() {
    let left = textured(6, 6);
    let correlator = PyramidCorrelator::new(Region::new(0, 0, 1, 1), (8, 8));
    let map = correlator
        .correlate(left.view(), left.view(), &NullPreFilter)
        .unwrap();
    assert!(map.data().iter().all(|d| !d.is_valid()));
}
