//! roomtone: a realtime 3D audio engine.
//!
//! Generators produce audio, sources place it in the world, effects such as
//! the FDN reverb add the room, and a [`Context`] mixes it all to a stereo
//! output device (or to caller-owned buffers when headless).
//!
//! ```no_run
//! use roomtone::{
//!     Buffer, BufferGenerator, Context, GlobalFdnReverb, RouteConfig, Source3D,
//! };
//!
//! fn main() -> roomtone::Result<()> {
//!     let _guard = roomtone::initialize()?;
//!     let ctx = Context::new()?;
//!     let generator = BufferGenerator::new(&ctx)?;
//!     generator.set_buffer(Some(&Buffer::from_stream_params("file", "rain.wav", None)?));
//!     let source = Source3D::new(&ctx)?;
//!     source.add_generator(&generator)?;
//!     let reverb = GlobalFdnReverb::new(&ctx)?;
//!     ctx.config_route(&source, &reverb, RouteConfig::default())?;
//!     std::thread::sleep(std::time::Duration::from_secs(5));
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod context;
pub mod dsp; // Realtime-safe signal processing primitives
pub mod effects;
pub mod engine; // Block mixer and the command/event plumbing around it
pub mod error;
pub mod generators;
pub mod handle;
pub mod io; // Streams and decoders
pub mod library;
pub mod logging;
mod runtime; // Output devices
pub mod sources;

/// Engine sample rate in Hz. Buffers are converted to it on load.
pub const SR: u32 = 44_100;
/// Frames rendered per mixer block.
pub const BLOCK_SIZE: usize = 256;
/// Upper bound on channels for buffers, streams and noise generators.
pub const MAX_CHANNELS: usize = 16;
/// The mixer always renders interleaved stereo.
pub const OUTPUT_CHANNELS: usize = 2;

pub use buffer::Buffer;
pub use context::Context;
pub use dsp::{BiquadConfig, DistanceModel, DistanceParams, FdnReverbConfig, NoiseType, PannerStrategy};
pub use effects::{EchoTap, GlobalEcho, GlobalFdnReverb};
pub use engine::event::{Event, EventKind};
pub use engine::route::RouteConfig;
pub use error::{Error, Result};
pub use generators::{BufferGenerator, NoiseGenerator, StreamingGenerator};
pub use handle::ObjectId;
pub use io::{register_stream_protocol, StreamHandle};
pub use library::{initialize, is_initialized, InitGuard};
pub use logging::{configure_logging_backend, log_level, set_log_level, LogLevel, LoggingBackend};
pub use sources::{DirectSource, PannedSource, Source3D};
