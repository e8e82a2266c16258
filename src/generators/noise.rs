use std::sync::Arc;

use super::{check_gain, GeneratorNode, GeneratorSlot};
use crate::context::Context;
use crate::dsp::noise::{NoiseSource, NoiseType};
use crate::engine::command::{Command, GeneratorCommand};
use crate::engine::event::EventSink;
use crate::error::{Error, Result};
use crate::handle::{impl_object, Generator, HandleInner};
use crate::library::ensure_initialized;
use crate::MAX_CHANNELS;

/// One independent noise source per channel.
pub(crate) struct NoiseNode {
    sources: Vec<NoiseSource>,
}

impl NoiseNode {
    pub(crate) fn new(channels: usize, seed: u64) -> Self {
        let sources = (0..channels as u64)
            .map(|c| NoiseSource::new(seed.wrapping_add(c.wrapping_mul(0x9E37_79B9_7F4A_7C15))))
            .collect();
        Self { sources }
    }
}

impl GeneratorNode for NoiseNode {
    fn channels(&self) -> usize {
        self.sources.len()
    }

    fn generate(&mut self, out: &mut [f32], _events: &mut EventSink<'_>) {
        let channels = self.sources.len();
        for frame in out.chunks_exact_mut(channels) {
            for (sample, source) in frame.iter_mut().zip(self.sources.iter_mut()) {
                *sample = source.next_sample();
            }
        }
    }

    fn apply(&mut self, command: GeneratorCommand) {
        if let GeneratorCommand::NoiseType(noise_type) = command {
            for source in &mut self.sources {
                source.set_noise_type(noise_type);
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct NoiseProps {
    gain: f64,
    noise_type: NoiseType,
}

/// White, pink or brown noise.
#[derive(Clone)]
pub struct NoiseGenerator {
    inner: Arc<HandleInner<NoiseProps>>,
    channels: usize,
}

impl_object!(NoiseGenerator, Generator);

impl NoiseGenerator {
    pub fn new(context: &Context, channels: usize) -> Result<Self> {
        ensure_initialized()?;
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(Error::InvalidChannels(channels));
        }
        let id = context.allocate_id();
        let node = NoiseNode::new(channels, rand::random());
        let inner = HandleInner::register(
            context,
            id,
            NoiseProps {
                gain: 1.0,
                noise_type: NoiseType::default(),
            },
            Command::InsertGenerator {
                id,
                slot: Box::new(GeneratorSlot::new(node)),
            },
        );
        tracing::debug!(%id, channels, "noise generator created");
        Ok(Self {
            inner: Arc::new(inner),
            channels,
        })
    }

    fn send(&self, command: GeneratorCommand) {
        self.inner.submit(Command::Generator {
            id: self.inner.id(),
            command,
        });
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn gain(&self) -> f64 {
        self.inner.props().gain
    }

    pub fn set_gain(&self, gain: f64) -> Result<()> {
        check_gain(gain)?;
        self.inner.props().gain = gain;
        self.send(GeneratorCommand::Gain(gain));
        Ok(())
    }

    pub fn noise_type(&self) -> NoiseType {
        self.inner.props().noise_type
    }

    pub fn set_noise_type(&self, noise_type: NoiseType) {
        self.inner.props().noise_type = noise_type;
        self.send(GeneratorCommand::NoiseType(noise_type));
    }
}
