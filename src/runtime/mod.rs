//! Driving a context's mixer from an audio device.
//!
//! The device stream lives on its own thread, since some hosts refuse to
//! move a stream between threads. The device callback locks the mixer and
//! pulls whole blocks from it, converting rate, channel count and sample
//! format on the way out.

pub(crate) mod output;
pub(crate) mod writer;
