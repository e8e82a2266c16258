//! Benchmarks for the engine's DSP and mixing paths.
//!
//! Run with: cargo bench
//!
//! One block is 256 frames at 44.1kHz, so every per-block benchmark here has
//! a 5.8ms realtime deadline.
//!
//! Benchmark groups:
//!   - dsp/*        Effect and panner kernels on a single block
//!   - scenarios/*  Whole headless contexts and handle property writes

use criterion::{criterion_group, criterion_main};

mod dsp;
mod scenarios;

criterion_group!(
    benches,
    dsp::bench_fdn,
    dsp::bench_panner,
    scenarios::bench_mixer,
    scenarios::bench_properties,
);
criterion_main!(benches);
