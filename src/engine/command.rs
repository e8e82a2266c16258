use std::sync::Arc;

use rtrb::Consumer;

use super::route::RouteConfig;
use crate::buffer::BufferData;
use crate::dsp::filter::BiquadConfig;
use crate::dsp::spatial::{DistanceParams, Vec3};
use crate::dsp::{FdnReverbConfig, NoiseType, PannerStrategy};
use crate::effects::{EchoTap, EffectSlot};
use crate::generators::GeneratorSlot;
use crate::handle::ObjectId;
use crate::sources::SourceSlot;

/// Capacity of the user-to-audio command ring.
pub(crate) const COMMAND_CAPACITY: usize = 1024;

/// A change for the mixer to apply at the next block boundary.
pub(crate) enum Command {
    InsertGenerator { id: ObjectId, slot: Box<GeneratorSlot> },
    InsertSource { id: ObjectId, slot: Box<SourceSlot> },
    InsertEffect { id: ObjectId, slot: Box<EffectSlot> },
    Destroy(ObjectId),
    Context(ContextCommand),
    Generator { id: ObjectId, command: GeneratorCommand },
    Source { id: ObjectId, command: SourceCommand },
    Effect { id: ObjectId, command: EffectCommand },
    AddGenerator { source: ObjectId, generator: ObjectId },
    RemoveGenerator { source: ObjectId, generator: ObjectId },
    ConfigRoute { output: ObjectId, input: ObjectId, config: RouteConfig },
    RemoveRoute { output: ObjectId, input: ObjectId, fade_time: f64 },
}

pub(crate) enum ContextCommand {
    Gain(f64),
    ListenerPosition(Vec3),
    ListenerOrientation([f64; 6]),
    DefaultPannerStrategy(PannerStrategy),
    EventsEnabled(bool),
}

pub(crate) enum GeneratorCommand {
    Gain(f64),
    PitchBend(f64),
    Looping(bool),
    /// Seconds from the start.
    Seek(f64),
    NoiseType(NoiseType),
    Buffer(Option<Arc<BufferData>>),
}

pub(crate) enum SourceCommand {
    Gain(f64),
    Filter(BiquadConfig),
    FilterDirect(BiquadConfig),
    FilterEffects(BiquadConfig),
    PannerStrategy(PannerStrategy),
    Azimuth(f64),
    Elevation(f64),
    PanningScalar(f64),
    Position(Vec3),
    Orientation([f64; 6]),
    Distance(DistanceParams),
}

pub(crate) enum EffectCommand {
    Gain(f64),
    Reset,
    FdnConfig(FdnReverbConfig),
    EchoTaps(Vec<EchoTap>),
    FilterInput(BiquadConfig),
}

pub(crate) trait CommandReceiver {
    fn pop(&mut self) -> Option<Command>;
}

impl CommandReceiver for Consumer<Command> {
    fn pop(&mut self) -> Option<Command> {
        Consumer::pop(self).ok()
    }
}
