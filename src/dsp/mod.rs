//! Low-level DSP primitives used by generators, sources and effects.
//!
//! These components are allocation-free once constructed and realtime-safe,
//! so they can live directly inside the audio-thread nodes. They stay focused
//! on the signal-processing math; the engine layers on scheduling, routing and
//! parameter plumbing.

/// Time-domain delay line with fractional reads.
pub mod delay;
/// Parameter ramps.
pub mod fade;
/// Feedback delay network reverb.
pub mod fdn;
/// Audio EQ cookbook biquads and small one-pole helpers.
pub mod filter;
/// White, pink and brown noise.
pub mod noise;
/// Stereo and head-model panners.
pub mod panner;
/// Linear sample-rate conversion.
pub mod resample;
/// Distance models and listener-relative angles.
pub mod spatial;

pub use fdn::FdnReverbConfig;
pub use filter::BiquadConfig;
pub use noise::NoiseType;
pub use panner::PannerStrategy;
pub use spatial::{DistanceModel, DistanceParams};
