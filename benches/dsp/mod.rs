//! Benchmarks for DSP kernels.

mod fdn;
mod panner;

pub use fdn::bench_fdn;
pub use panner::bench_panner;
