//! Whole-context block rendering: many 3D sources sharing one reverb.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use roomtone::{
    Context, GlobalFdnReverb, NoiseGenerator, RouteConfig, Source3D, BLOCK_SIZE, OUTPUT_CHANNELS,
};

pub fn bench_mixer(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/mixer");
    let _guard = roomtone::initialize().expect("initialize");

    for count in [1usize, 8, 32] {
        let ctx = Context::new_headless().expect("context");
        let reverb = GlobalFdnReverb::new(&ctx).expect("reverb");
        let mut handles = Vec::new();
        for i in 0..count {
            let noise = NoiseGenerator::new(&ctx, 1).expect("noise");
            let source = Source3D::new(&ctx).expect("source");
            source.add_generator(&noise).expect("attach");
            let angle = i as f64 / count as f64 * std::f64::consts::TAU;
            source
                .set_position([angle.cos() * 3.0, angle.sin() * 3.0, 0.0])
                .expect("position");
            ctx.config_route(&source, &reverb, RouteConfig::default())
                .expect("route");
            handles.push((noise, source));
        }

        let mut block = vec![0.0f32; BLOCK_SIZE * OUTPUT_CHANNELS];
        group.bench_with_input(BenchmarkId::new("generate_block", count), &count, |b, _| {
            b.iter(|| ctx.generate_block(black_box(&mut block)).expect("block"))
        });
    }

    group.finish();
}
