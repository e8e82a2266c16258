//! Benchmarks for the feedback delay network reverb.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use roomtone::dsp::fdn::{FdnReverb, FdnReverbConfig};
use roomtone::BLOCK_SIZE;

pub fn bench_fdn(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/fdn");
    let input: Vec<f32> = (0..BLOCK_SIZE).map(|i| ((i * 7) % 13) as f32 / 13.0 - 0.5).collect();
    let mut out = vec![0.0f32; BLOCK_SIZE * 2];

    for (name, config) in [
        ("default", FdnReverbConfig::default()),
        (
            "modulated",
            FdnReverbConfig {
                late_reflections_modulation_depth: 0.01,
                late_reflections_modulation_frequency: 2.0,
                ..FdnReverbConfig::default()
            },
        ),
    ] {
        let mut reverb = FdnReverb::new(config);
        group.bench_function(BenchmarkId::new("process", name), |b| {
            b.iter(|| {
                out.fill(0.0);
                reverb.process(black_box(&input), black_box(&mut out));
            })
        });
    }

    let mut reverb = FdnReverb::new(FdnReverbConfig::default());
    let mut t60 = 1.0;
    group.bench_function("configure", |b| {
        b.iter(|| {
            t60 = if t60 > 5.0 { 1.0 } else { t60 + 0.1 };
            reverb.configure(black_box(FdnReverbConfig {
                t60,
                ..FdnReverbConfig::default()
            }));
        })
    });

    group.finish();
}
