//! Playback of in-memory [`Buffer`]s.

use std::sync::Arc;

use super::{check_gain, check_position, GeneratorNode, GeneratorSlot, SharedPosition};
use crate::buffer::{Buffer, BufferData};
use crate::context::Context;
use crate::engine::command::{Command, GeneratorCommand};
use crate::engine::event::{EventKind, EventSink};
use crate::error::{check_range, Result};
use crate::handle::{impl_object, Generator, HandleInner};
use crate::library::ensure_initialized;
use crate::SR;

pub(crate) const MAX_PITCH_BEND: f64 = 8.0;

pub(crate) struct BufferNode {
    buffer: Option<Arc<BufferData>>,
    /// In frames; fractional once pitch bend is in play.
    position: f64,
    pitch_bend: f64,
    looping: bool,
    finished: bool,
    shared: SharedPosition,
}

impl BufferNode {
    pub(crate) fn new(shared: SharedPosition) -> Self {
        Self {
            buffer: None,
            position: 0.0,
            pitch_bend: 1.0,
            looping: false,
            finished: false,
            shared,
        }
    }
}

impl GeneratorNode for BufferNode {
    fn channels(&self) -> usize {
        self.buffer.as_ref().map_or(1, |b| b.channels)
    }

    fn generate(&mut self, out: &mut [f32], events: &mut EventSink<'_>) {
        let Some(buffer) = self.buffer.as_ref() else {
            return;
        };
        if self.finished {
            return;
        }
        let channels = buffer.channels;
        let frames = buffer.frames();
        let len = frames as f64;

        for frame in out.chunks_exact_mut(channels) {
            if self.position >= len {
                if self.looping {
                    self.position %= len;
                    events.emit(EventKind::Looped);
                } else {
                    self.finished = true;
                    events.emit(EventKind::Finished);
                    break;
                }
            }
            let i = self.position as usize;
            let frac = (self.position - i as f64) as f32;
            let a = &buffer.samples[i * channels..(i + 1) * channels];
            if frac == 0.0 {
                frame.copy_from_slice(a);
            } else {
                let j = if i + 1 < frames {
                    i + 1
                } else if self.looping {
                    0
                } else {
                    i
                };
                let b = &buffer.samples[j * channels..(j + 1) * channels];
                for ((o, &x), &y) in frame.iter_mut().zip(a).zip(b) {
                    *o = x + (y - x) * frac;
                }
            }
            self.position += self.pitch_bend;
        }
        self.shared.store(self.position.min(len) / SR as f64);
    }

    fn apply(&mut self, command: GeneratorCommand) {
        match command {
            GeneratorCommand::Buffer(buffer) => {
                self.buffer = buffer;
                self.position = 0.0;
                self.finished = false;
                self.shared.store(0.0);
            }
            GeneratorCommand::Seek(seconds) => {
                let frames = self.buffer.as_ref().map_or(0, |b| b.frames()) as f64;
                self.position = (seconds * SR as f64).min(frames);
                self.finished = false;
            }
            GeneratorCommand::Looping(looping) => self.looping = looping,
            GeneratorCommand::PitchBend(bend) => self.pitch_bend = bend,
            GeneratorCommand::Gain(_) | GeneratorCommand::NoiseType(_) => {}
        }
    }
}

#[derive(Debug, Clone)]
struct BufferGeneratorProps {
    gain: f64,
    looping: bool,
    pitch_bend: f64,
    buffer: Option<Buffer>,
}

impl Default for BufferGeneratorProps {
    fn default() -> Self {
        Self {
            gain: 1.0,
            looping: false,
            pitch_bend: 1.0,
            buffer: None,
        }
    }
}

/// Plays a [`Buffer`], optionally looping and pitch bent.
#[derive(Clone)]
pub struct BufferGenerator {
    inner: Arc<HandleInner<BufferGeneratorProps>>,
    position: SharedPosition,
}

impl_object!(BufferGenerator, Generator);

impl BufferGenerator {
    pub fn new(context: &Context) -> Result<Self> {
        ensure_initialized()?;
        let id = context.allocate_id();
        let position = SharedPosition::default();
        let slot = GeneratorSlot::new(BufferNode::new(position.clone()));
        let inner = HandleInner::register(
            context,
            id,
            BufferGeneratorProps::default(),
            Command::InsertGenerator {
                id,
                slot: Box::new(slot),
            },
        );
        tracing::debug!(%id, "buffer generator created");
        Ok(Self {
            inner: Arc::new(inner),
            position,
        })
    }

    fn send(&self, command: GeneratorCommand) {
        self.inner.submit(Command::Generator {
            id: self.inner.id(),
            command,
        });
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

    pub fn looping(&self) -> bool {
        self.inner.props().looping
    }

    pub fn set_looping(&self, looping: bool) {
        self.inner.props().looping = looping;
        self.send(GeneratorCommand::Looping(looping));
    }

    /// Playback speed multiplier; 2.0 plays an octave up.
    pub fn pitch_bend(&self) -> f64 {
        self.inner.props().pitch_bend
    }

    pub fn set_pitch_bend(&self, pitch_bend: f64) -> Result<()> {
        check_range("pitch_bend", pitch_bend, f64::MIN_POSITIVE, MAX_PITCH_BEND)?;
        self.inner.props().pitch_bend = pitch_bend;
        self.send(GeneratorCommand::PitchBend(pitch_bend));
        Ok(())
    }

    pub fn buffer(&self) -> Option<Buffer> {
        self.inner.props().buffer.clone()
    }

    /// Swap the buffer being played and rewind. `None` silences the generator.
    pub fn set_buffer(&self, buffer: Option<&Buffer>) {
        self.inner.props().buffer = buffer.cloned();
        self.position.store(0.0);
        self.send(GeneratorCommand::Buffer(buffer.map(|b| Arc::clone(b.data()))));
    }

    /// Current playback position in seconds.
    pub fn playback_position(&self) -> f64 {
        self.position.load()
    }

    pub fn set_playback_position(&self, seconds: f64) -> Result<()> {
        check_position(seconds)?;
        self.position.store(seconds);
        self.send(GeneratorCommand::Seek(seconds));
        Ok(())
    }
}
