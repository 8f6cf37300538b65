//! Criterion benchmarks for the autoencoder on the CPU backend.
//!
//! Run with: `cargo bench --bench autoencoder_bench`
//!
//! ## Benchmarks
//!
//! 1. **Encode** — encoder pipeline + latent projection
//! 2. **Decode** — latent expansion + decoder pipeline
//! 3. **Forward** — encode, decode and layer loss, across batch sizes
//! 4. **Training step** — forward, backward and one Adam update

use burn::prelude::*;
use conv_autoencoder::backend::{cpu_device, CpuBackend, TrainingBackend};
use conv_autoencoder::data::image_batch_to_tensor;
use conv_autoencoder::{train_step, AutoEncoderConfig, TrainingConfig};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array4;
use ndarray_rand::RandomExt;
use rand::distributions::Uniform;

/// Five-block layout at a bench-friendly size: 128x64 images, base width 8.
fn bench_config() -> AutoEncoderConfig {
    AutoEncoderConfig::new()
        .with_init_output_size(8)
        .with_latent_variable_size(64)
        .with_input_height(128)
        .with_input_width(64)
}

fn synthetic_batch(batch: usize) -> Array4<f32> {
    Array4::random((batch, 3, 128, 64), Uniform::new(0.0, 1.0))
}

fn bench_encode(c: &mut Criterion) {
    let device = cpu_device();
    let model = bench_config()
        .init::<CpuBackend>(&device)
        .expect("Failed to create benchmark model");
    let images = image_batch_to_tensor::<CpuBackend>(&synthetic_batch(4), &device);

    c.bench_function("encode_b4_128x64", |b| {
        b.iter(|| black_box(model.encode(images.clone()).expect("encode")))
    });
}

fn bench_decode(c: &mut Criterion) {
    let device = cpu_device();
    let model = bench_config()
        .init::<CpuBackend>(&device)
        .expect("Failed to create benchmark model");
    let latent = Tensor::<CpuBackend, 2>::zeros([4, 64], &device);

    c.bench_function("decode_b4_128x64", |b| {
        b.iter(|| black_box(model.decode(latent.clone()).expect("decode")))
    });
}

fn bench_forward(c: &mut Criterion) {
    let device = cpu_device();
    let model = bench_config()
        .init::<CpuBackend>(&device)
        .expect("Failed to create benchmark model");

    let mut group = c.benchmark_group("forward");
    for batch in [1usize, 4, 16] {
        let images = image_batch_to_tensor::<CpuBackend>(&synthetic_batch(batch), &device);
        group.bench_with_input(BenchmarkId::from_parameter(batch), &images, |b, images| {
            b.iter(|| black_box(model.forward(images.clone()).expect("forward")))
        });
    }
    group.finish();
}

fn bench_train_step(c: &mut Criterion) {
    let device = cpu_device();
    let config = TrainingConfig::new();
    let images = image_batch_to_tensor::<TrainingBackend>(&synthetic_batch(4), &device);

    c.bench_function("train_step_b4_128x64", |b| {
        let mut model = Some(
            bench_config()
                .init::<TrainingBackend>(&device)
                .expect("Failed to create benchmark model"),
        );
        let mut optim = config.init_optimizer::<TrainingBackend>();
        b.iter(|| {
            let current = model.take().expect("model present");
            let (next, metrics) =
                train_step(current, &mut optim, images.clone(), config.learning_rate)
                    .expect("train step");
            model = Some(next);
            black_box(metrics)
        })
    });
}

criterion_group!(
    benches,
    bench_encode,
    bench_decode,
    bench_forward,
    bench_train_step
);
criterion_main!(benches);
