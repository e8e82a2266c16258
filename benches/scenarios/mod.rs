//! Scenario benchmarks on headless contexts.

mod mixer;
mod properties;

pub use mixer::bench_mixer;
pub use properties::bench_properties;
