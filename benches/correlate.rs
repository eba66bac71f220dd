use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use stereocorr::{
    CorrelatorConfig, CorrelatorView, LazyView, Metric, NullPreFilter, OwnedImage,
    PyramidCorrelator, Region,
};

fn make_image(width: usize, height: usize) -> OwnedImage<f32> {
    let data = (0..width * height)
        .map(|i| {
            let x = i % width;
            let y = i / width;
            (((x * 13) ^ (y * 7) ^ (x * y)) & 0xFF) as f32
        })
        .collect();
    OwnedImage::new(data, width, height).unwrap()
}

fn shifted(left: &OwnedImage<f32>, dx: usize) -> OwnedImage<f32> {
    let width = left.width();
    let height = left.height();
    let mut data = vec![0f32; width * height];
    for y in 0..height {
        for x in dx..width {
            data[y * width + x] = left.at(x - dx, y);
        }
    }
    OwnedImage::new(data, width, height).unwrap()
}

fn bench_correlator(c: &mut Criterion) {
    let left = make_image(128, 128);
    let right = shifted(&left, 2);

    for metric in [Metric::Zncc, Metric::Sad] {
        let correlator = PyramidCorrelator::with_config(CorrelatorConfig {
            search_range: Region::new(0, 0, 8, 4),
            kernel_size: (8, 8),
            subpixel_h: false,
            subpixel_v: false,
            metric,
            ..CorrelatorConfig::default()
        });
        c.bench_function(&format!("correlate_128x128_{metric:?}"), |b| {
            b.iter(|| {
                correlator
                    .correlate(
                        black_box(left.view()),
                        black_box(right.view()),
                        &NullPreFilter,
                    )
                    .unwrap()
            })
        });
    }
}

fn bench_view_tile(c: &mut Criterion) {
    let left = make_image(256, 256);
    let right = shifted(&left, 3);
    let to_u8 = |img: &OwnedImage<f32>| {
        OwnedImage::new(
            img.data().iter().map(|v| *v as u8).collect(),
            img.width(),
            img.height(),
        )
        .unwrap()
    };
    let mut view = CorrelatorView::new(
        Arc::new(to_u8(&left)),
        Arc::new(to_u8(&right)),
        Arc::new(NullPreFilter),
    )
    .unwrap();
    view.set_search_range(Region::new(-4, -4, 4, 4));
    view.set_kernel_size((8, 8));
    view.set_subpixel_options(false, false, false);

    c.bench_function("materialize_64x64_tile", |b| {
        b.iter(|| {
            view.materialize(black_box(Region::with_size(64, 64, 64, 64)))
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_correlator, bench_view_tile);
criterion_main!(benches);
