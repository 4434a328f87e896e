//! Benchmarks for inference and CAM computation.
//!
//! Run with: cargo bench --bench cam_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use burn::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use cam::core::backend::NdArray;
use cam::core::{ChwShape, FeatureMap, ImageTensor};
use cam::explain::{compute_cam, softmax, top_k, CamHeatmap, Classifier};
use cam::models::{ResNetArch, ResNetConfig};

type BenchBackend = NdArray;

/// Create random values for benchmarking.
fn random_values(n: usize, seed: u64) -> Vec<f32> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen::<f32>()).collect()
}

fn bench_compute_cam(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_cam");
    let device = Default::default();

    for channels in [64, 256, 512].iter() {
        let shape = ChwShape::new(*channels, 7, 7);
        let features =
            FeatureMap::<BenchBackend>::from_vec(random_values(shape.numel(), 1), shape, &device)
                .unwrap();
        let weights = Tensor::<BenchBackend, 2>::from_data(
            TensorData::new(random_values(1000 * channels, 2), [1000, *channels]),
            &device,
        );

        group.bench_with_input(BenchmarkId::from_parameter(channels), channels, |b, _| {
            b.iter(|| compute_cam(black_box(&features), black_box(&weights), 281).unwrap())
        });
    }

    group.finish();
}

fn bench_upsample(c: &mut Criterion) {
    let heatmap = CamHeatmap::new(0, 7, 7, random_values(49, 3)).unwrap();

    c.bench_function("upsample_7x7_to_224", |b| {
        b.iter(|| black_box(&heatmap).upsample(224, 224).unwrap())
    });
}

fn bench_softmax_top_k(c: &mut Criterion) {
    let logits = random_values(1000, 4);

    c.bench_function("softmax_top5_1000", |b| {
        b.iter(|| top_k(&softmax(black_box(&logits)), 5))
    });
}

fn bench_infer(c: &mut Criterion) {
    let mut group = c.benchmark_group("infer");
    group.sample_size(10);
    let device: <BenchBackend as Backend>::Device = Default::default();

    for base_width in [8, 16].iter() {
        let model = ResNetConfig::new(ResNetArch::ResNet18, 1000)
            .with_base_width(*base_width)
            .init::<BenchBackend>(&device);
        let classifier = Classifier::new(Box::new(model), device.clone());
        let input =
            ImageTensor::new(random_values(ImageTensor::SHAPE.numel(), 5), ImageTensor::SHAPE)
                .unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(base_width), base_width, |b, _| {
            b.iter(|| classifier.infer(black_box(&input)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_compute_cam,
    bench_upsample,
    bench_softmax_top_k,
    bench_infer
);
criterion_main!(benches);
