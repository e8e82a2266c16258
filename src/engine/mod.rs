//! The block mixer.
//!
//! One [`Mixer`] lives behind each context. Handles never touch it directly:
//! they push [`Command`]s into a ring that the mixer drains at the start of
//! every block, so property writes land on block boundaries in the order
//! they were made.
//!
//! ```text
//!   generators ──► source ──┬──► filter_direct ─────────────► out
//!   (gain)         (gain,   │
//!                  filter,  └──► filter_effects ─► routes ─► effect ─► out
//!                  panner)                         (gain,    (gain)
//!                                                   filter)
//! ```

pub mod command;
pub mod event;
pub mod route;

use std::collections::BTreeMap;

use rtrb::{Consumer, Producer};

use self::command::{Command, CommandReceiver, ContextCommand};
use self::event::{Event, EventSink};
use self::route::RouteTable;
use crate::dsp::fade::Fader;
use crate::dsp::spatial::{Vec3, DEFAULT_ORIENTATION};
use crate::dsp::PannerStrategy;
use crate::effects::EffectSlot;
use crate::generators::GeneratorSlot;
use crate::handle::ObjectId;
use crate::sources::SourceSlot;
use crate::{BLOCK_SIZE, MAX_CHANNELS, OUTPUT_CHANNELS};

/// Samples in one rendered block.
pub(crate) const BLOCK_SAMPLES: usize = BLOCK_SIZE * OUTPUT_CHANNELS;

/// Where the listener stands, shared by every 3D source in a context.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Listener {
    pub(crate) position: Vec3,
    pub(crate) orientation: [f64; 6],
    pub(crate) default_strategy: PannerStrategy,
}

impl Default for Listener {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            orientation: DEFAULT_ORIENTATION,
            default_strategy: PannerStrategy::Stereo,
        }
    }
}

pub(crate) struct Mixer {
    commands: Consumer<Command>,
    events: Producer<Event>,
    events_enabled: bool,
    gain: Fader,
    listener: Listener,
    generators: BTreeMap<ObjectId, GeneratorSlot>,
    sources: BTreeMap<ObjectId, SourceSlot>,
    effects: BTreeMap<ObjectId, EffectSlot>,
    routes: RouteTable,
    scratch: Vec<f32>,
    blocks: u64,
}

impl Mixer {
    pub(crate) fn new(commands: Consumer<Command>, events: Producer<Event>) -> Self {
        Self {
            commands,
            events,
            events_enabled: false,
            gain: Fader::new(1.0),
            listener: Listener::default(),
            generators: BTreeMap::new(),
            sources: BTreeMap::new(),
            effects: BTreeMap::new(),
            routes: RouteTable::new(),
            scratch: vec![0.0; BLOCK_SIZE * MAX_CHANNELS],
            blocks: 0,
        }
    }

    /// Blocks rendered so far.
    pub(crate) fn blocks(&self) -> u64 {
        self.blocks
    }

    pub(crate) fn drain_commands(&mut self) {
        while let Some(command) = CommandReceiver::pop(&mut self.commands) {
            self.apply(command);
        }
    }

    pub(crate) fn apply(&mut self, command: Command) {
        match command {
            Command::InsertGenerator { id, slot } => {
                self.generators.insert(id, *slot);
            }
            Command::InsertSource { id, slot } => {
                self.sources.insert(id, *slot);
            }
            Command::InsertEffect { id, slot } => {
                self.effects.insert(id, *slot);
            }
            Command::Destroy(id) => self.destroy(id),
            Command::Context(command) => self.apply_context(command),
            Command::Generator { id, command } => {
                if let Some(slot) = self.generators.get_mut(&id) {
                    slot.apply(command);
                }
            }
            Command::Source { id, command } => {
                if let Some(slot) = self.sources.get_mut(&id) {
                    slot.apply(command);
                }
            }
            Command::Effect { id, command } => {
                if let Some(slot) = self.effects.get_mut(&id) {
                    slot.apply(command);
                }
            }
            Command::AddGenerator { source, generator } => self.attach(source, generator),
            Command::RemoveGenerator { source, generator } => {
                let Some(slot) = self.generators.get_mut(&generator) else {
                    return;
                };
                if slot.owner == Some(source) {
                    slot.owner = None;
                    if let Some(src) = self.sources.get_mut(&source) {
                        src.generators.retain(|&g| g != generator);
                    }
                }
            }
            Command::ConfigRoute {
                output,
                input,
                config,
            } => {
                if self.sources.contains_key(&output) && self.effects.contains_key(&input) {
                    self.routes.configure(output, input, config);
                }
            }
            Command::RemoveRoute {
                output,
                input,
                fade_time,
            } => self.routes.remove(output, input, fade_time),
        }
    }

    fn apply_context(&mut self, command: ContextCommand) {
        match command {
            ContextCommand::Gain(gain) => self.gain.set_target(gain as f32, BLOCK_SIZE),
            ContextCommand::ListenerPosition(position) => self.listener.position = position,
            ContextCommand::ListenerOrientation(orientation) => {
                self.listener.orientation = orientation
            }
            ContextCommand::DefaultPannerStrategy(strategy) => {
                self.listener.default_strategy = strategy
            }
            ContextCommand::EventsEnabled(enabled) => self.events_enabled = enabled,
        }
    }

    /// A generator plays through one source at a time; attaching moves it.
    fn attach(&mut self, source: ObjectId, generator: ObjectId) {
        if !self.sources.contains_key(&source) {
            return;
        }
        let Some(slot) = self.generators.get_mut(&generator) else {
            return;
        };
        if slot.owner == Some(source) {
            return;
        }
        if let Some(previous) = slot.owner.replace(source) {
            if let Some(src) = self.sources.get_mut(&previous) {
                src.generators.retain(|&g| g != generator);
            }
        }
        if let Some(src) = self.sources.get_mut(&source) {
            src.generators.push(generator);
        }
    }

    fn destroy(&mut self, id: ObjectId) {
        if let Some(slot) = self.generators.remove(&id) {
            if let Some(src) = slot.owner.and_then(|s| self.sources.get_mut(&s)) {
                src.generators.retain(|&g| g != id);
            }
        } else if let Some(source) = self.sources.remove(&id) {
            for generator in source.generators {
                if let Some(slot) = self.generators.get_mut(&generator) {
                    slot.owner = None;
                }
            }
            self.routes.remove_object(id);
        } else if self.effects.remove(&id).is_some() {
            self.routes.remove_object(id);
        } else {
            return;
        }
        tracing::trace!(%id, "object destroyed");
    }

    /// Render one block of interleaved stereo into `out`, overwriting it.
    pub(crate) fn render_block(&mut self, out: &mut [f32]) {
        debug_assert_eq!(out.len(), BLOCK_SAMPLES);
        self.drain_commands();
        out.fill(0.0);

        let Self {
            events,
            events_enabled,
            gain,
            listener,
            generators,
            sources,
            effects,
            routes,
            scratch,
            ..
        } = self;

        for effect in effects.values_mut() {
            effect.begin_block();
        }

        for source in sources.values_mut() {
            source.begin_block();
            for i in 0..source.generators.len() {
                let id = source.generators[i];
                let Some(generator) = generators.get_mut(&id) else {
                    continue;
                };
                let channels = generator.channels();
                let buf = &mut scratch[..BLOCK_SIZE * channels];
                buf.fill(0.0);
                let mut sink = if *events_enabled {
                    EventSink::new(&mut *events, id)
                } else {
                    EventSink::disabled(id)
                };
                generator.run(buf, &mut sink);
                source.mix_in(buf, channels);
            }
            source.finish_block(listener);
            for (o, s) in out.iter_mut().zip(source.output()) {
                *o += s;
            }
        }

        routes.run(sources, effects);

        for effect in effects.values_mut() {
            effect.run(out);
        }

        gain.apply(out, OUTPUT_CHANNELS);
        self.blocks += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::command::{GeneratorCommand, SourceCommand};
    use super::*;
    use crate::engine::command::COMMAND_CAPACITY;
    use crate::engine::event::{EventKind, EVENT_CAPACITY};
    use crate::generators::noise::NoiseNode;
    use crate::generators::buffer::BufferNode;
    use crate::generators::SharedPosition;
    use crate::sources::SourceSlot;
    use crate::buffer::Buffer;
    use rtrb::RingBuffer;

    fn mixer() -> (Mixer, Producer<Command>, Consumer<Event>) {
        let (tx, rx) = RingBuffer::new(COMMAND_CAPACITY);
        let (etx, erx) = RingBuffer::new(EVENT_CAPACITY);
        (Mixer::new(rx, etx), tx, erx)
    }

    fn rms(block: &[f32]) -> f32 {
        (block.iter().map(|s| s * s).sum::<f32>() / block.len() as f32).sqrt()
    }

    fn noise(id: u64) -> Command {
        Command::InsertGenerator {
            id: ObjectId::new(id),
            slot: Box::new(GeneratorSlot::new(NoiseNode::new(1, id))),
        }
    }

    fn direct(id: u64) -> Command {
        Command::InsertSource {
            id: ObjectId::new(id),
            slot: Box::new(SourceSlot::direct()),
        }
    }

    #[test]
    fn test_empty_mixer_is_silent() {
        let (mut mixer, _tx, _rx) = mixer();
        let mut out = vec![1.0; BLOCK_SAMPLES];
        mixer.render_block(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(mixer.blocks(), 1);
    }

    #[test]
    fn test_generator_without_source_is_silent() {
        let (mut mixer, mut tx, _rx) = mixer();
        tx.push(noise(1)).ok();
        let mut out = vec![0.0; BLOCK_SAMPLES];
        mixer.render_block(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_attached_generator_is_heard() {
        let (mut mixer, mut tx, _rx) = mixer();
        tx.push(noise(1)).ok();
        tx.push(direct(2)).ok();
        tx.push(Command::AddGenerator {
            source: ObjectId::new(2),
            generator: ObjectId::new(1),
        })
        .ok();
        let mut out = vec![0.0; BLOCK_SAMPLES];
        mixer.render_block(&mut out);
        assert!(rms(&out) > 0.1);
    }

    #[test]
    fn test_attach_moves_generator() {
        let (mut mixer, _tx, _rx) = mixer();
        mixer.apply(noise(1));
        mixer.apply(direct(2));
        mixer.apply(direct(3));
        let (g, a, b) = (ObjectId::new(1), ObjectId::new(2), ObjectId::new(3));
        mixer.apply(Command::AddGenerator { source: a, generator: g });
        mixer.apply(Command::AddGenerator { source: b, generator: g });
        assert!(mixer.sources[&a].generators.is_empty());
        assert_eq!(mixer.sources[&b].generators, vec![g]);
        assert_eq!(mixer.generators[&g].owner, Some(b));
    }

    #[test]
    fn test_destroying_source_frees_generators() {
        let (mut mixer, _tx, _rx) = mixer();
        mixer.apply(noise(1));
        mixer.apply(direct(2));
        let (g, s) = (ObjectId::new(1), ObjectId::new(2));
        mixer.apply(Command::AddGenerator { source: s, generator: g });
        mixer.apply(Command::Destroy(s));
        assert_eq!(mixer.generators[&g].owner, None);
    }

    #[test]
    fn test_source_gain_zero_mutes() {
        let (mut mixer, _tx, _rx) = mixer();
        mixer.apply(noise(1));
        mixer.apply(direct(2));
        mixer.apply(Command::AddGenerator {
            source: ObjectId::new(2),
            generator: ObjectId::new(1),
        });
        mixer.apply(Command::Source {
            id: ObjectId::new(2),
            command: SourceCommand::Gain(0.0),
        });
        let mut out = vec![0.0; BLOCK_SAMPLES];
        // The first block ramps down.
        mixer.render_block(&mut out);
        mixer.render_block(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_events_only_when_enabled() {
        let (mut mixer, _tx, mut rx) = mixer();
        let buffer = Buffer::from_float_array(crate::SR, 1, &[0.5; 10]).unwrap();
        let node = BufferNode::new(SharedPosition::default());
        mixer.apply(Command::InsertGenerator {
            id: ObjectId::new(1),
            slot: Box::new(GeneratorSlot::new(node)),
        });
        mixer.apply(Command::Generator {
            id: ObjectId::new(1),
            command: GeneratorCommand::Buffer(Some(buffer.data().clone())),
        });
        mixer.apply(direct(2));
        mixer.apply(Command::AddGenerator {
            source: ObjectId::new(2),
            generator: ObjectId::new(1),
        });
        let mut out = vec![0.0; BLOCK_SAMPLES];
        mixer.render_block(&mut out);
        assert!(rx.pop().is_err());

        mixer.apply(Command::Generator {
            id: ObjectId::new(1),
            command: GeneratorCommand::Seek(0.0),
        });
        mixer.apply(Command::Context(ContextCommand::EventsEnabled(true)));
        mixer.render_block(&mut out);
        let event = rx.pop().unwrap();
        assert_eq!(event.kind, EventKind::Finished);
        assert_eq!(event.source, ObjectId::new(1));
    }
}
