//! Benchmarks for the panners.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use roomtone::dsp::panner::Panner;
use roomtone::{PannerStrategy, BLOCK_SIZE};

pub fn bench_panner(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/panner");
    let input = vec![0.5f32; BLOCK_SIZE];
    let mut out = vec![0.0f32; BLOCK_SIZE * 2];

    for strategy in [PannerStrategy::Stereo, PannerStrategy::Hrtf] {
        let mut panner = Panner::new(strategy);
        let mut azimuth = 0.0;
        group.bench_function(BenchmarkId::new("moving", format!("{strategy:?}")), |b| {
            b.iter(|| {
                azimuth = (azimuth + 3.0) % 360.0;
                panner.set_angles(azimuth, 0.0);
                panner.run(black_box(&input), black_box(&mut out));
            })
        });
    }

    group.finish();
}
