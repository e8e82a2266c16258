//! Property writes from the application thread. Writes that outpace the
//! mixer spill into the ring-full path, which is measured too.

use std::hint::black_box;

use criterion::Criterion;
use roomtone::{Context, NoiseGenerator, BLOCK_SIZE, OUTPUT_CHANNELS};

pub fn bench_properties(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/properties");
    let _guard = roomtone::initialize().expect("initialize");
    let ctx = Context::new_headless().expect("context");
    let noise = NoiseGenerator::new(&ctx, 1).expect("noise");
    let mut block = vec![0.0f32; BLOCK_SIZE * OUTPUT_CHANNELS];

    let mut gain = 0.0;
    group.bench_function("set_gain_drained", |b| {
        b.iter(|| {
            gain = if gain >= 1.0 { 0.0 } else { gain + 0.01 };
            noise.set_gain(black_box(gain)).expect("gain");
            ctx.generate_block(&mut block).expect("block");
        })
    });

    group.bench_function("set_gain_saturated", |b| {
        b.iter(|| {
            gain = if gain >= 1.0 { 0.0 } else { gain + 0.01 };
            noise.set_gain(black_box(gain)).expect("gain");
        })
    });

    group.finish();
}
