//! Generators produce audio for sources to play.

pub mod buffer;
pub mod noise;
pub mod streaming;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::dsp::fade::Fader;
use crate::engine::command::GeneratorCommand;
use crate::engine::event::EventSink;
use crate::error::{check_range, Result};
use crate::handle::ObjectId;
use crate::BLOCK_SIZE;

pub use buffer::BufferGenerator;
pub use noise::NoiseGenerator;
pub use streaming::StreamingGenerator;

/// Audio-thread half of a generator.
pub(crate) trait GeneratorNode: Send {
    /// Channels of the next block. May change between blocks.
    fn channels(&self) -> usize;

    /// Write one block (`BLOCK_SIZE` interleaved frames) into the zeroed `out`.
    fn generate(&mut self, out: &mut [f32], events: &mut EventSink<'_>);

    fn apply(&mut self, command: GeneratorCommand);
}

/// A generator as the mixer sees it: the node plus state every generator has.
pub(crate) struct GeneratorSlot {
    node: Box<dyn GeneratorNode>,
    gain: Fader,
    /// The source currently playing this generator.
    pub(crate) owner: Option<ObjectId>,
}

impl GeneratorSlot {
    pub(crate) fn new(node: impl GeneratorNode + 'static) -> Self {
        Self {
            node: Box::new(node),
            gain: Fader::new(1.0),
            owner: None,
        }
    }

    pub(crate) fn channels(&self) -> usize {
        self.node.channels()
    }

    pub(crate) fn apply(&mut self, command: GeneratorCommand) {
        match command {
            GeneratorCommand::Gain(gain) => self.gain.set_target(gain as f32, BLOCK_SIZE),
            other => self.node.apply(other),
        }
    }

    pub(crate) fn run(&mut self, out: &mut [f32], events: &mut EventSink<'_>) {
        let channels = self.node.channels();
        self.node.generate(out, events);
        self.gain.apply(out, channels);
    }
}

/// Playback position in seconds, published by the audio thread.
#[derive(Debug, Clone, Default)]
pub(crate) struct SharedPosition(Arc<AtomicU64>);

impl SharedPosition {
    pub(crate) fn store(&self, seconds: f64) {
        self.0.store(seconds.to_bits(), Ordering::Relaxed);
    }

    pub(crate) fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}

pub(crate) fn check_gain(gain: f64) -> Result<()> {
    check_range("gain", gain, 0.0, f64::MAX)
}

pub(crate) fn check_position(seconds: f64) -> Result<()> {
    check_range("playback_position", seconds, 0.0, f64::MAX)
}
