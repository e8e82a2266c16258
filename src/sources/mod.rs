//! Sources take the output of their generators and place it in the mix.
//!
//! Every source renders to stereo. Direct sources pass generator channels
//! straight through; panned and 3D sources fold them to mono first and let a
//! panner decide where they sit.

pub mod direct;
pub mod panned;
pub mod spatial;

use crate::dsp::fade::Fader;
use crate::dsp::filter::{Biquad, BiquadConfig};
use crate::dsp::panner::Panner;
use crate::dsp::PannerStrategy;
use crate::engine::command::SourceCommand;
use crate::engine::Listener;
use crate::handle::ObjectId;
use crate::{BLOCK_SIZE, OUTPUT_CHANNELS};

pub use direct::DirectSource;
pub use panned::PannedSource;
pub use spatial::Source3D;

use self::panned::PannedState;
use self::spatial::SpatialState;

pub(crate) enum SourceKind {
    Direct,
    Panned(PannedState),
    Spatial(SpatialState),
}

/// Audio-thread state of one source.
pub(crate) struct SourceSlot {
    kind: SourceKind,
    gain: Fader,
    filter: Biquad<2>,
    filter_direct: Biquad<2>,
    filter_effects: Biquad<1>,
    /// Generators playing through this source, in attach order.
    pub(crate) generators: Vec<ObjectId>,
    input: Vec<f32>,
    output: Vec<f32>,
    send: Vec<f32>,
}

impl SourceSlot {
    fn with_kind(kind: SourceKind) -> Self {
        Self {
            kind,
            gain: Fader::new(1.0),
            filter: Biquad::identity(),
            filter_direct: Biquad::identity(),
            filter_effects: Biquad::identity(),
            generators: Vec::new(),
            input: vec![0.0; BLOCK_SIZE * OUTPUT_CHANNELS],
            output: vec![0.0; BLOCK_SIZE * OUTPUT_CHANNELS],
            send: vec![0.0; BLOCK_SIZE],
        }
    }

    pub(crate) fn direct() -> Self {
        Self::with_kind(SourceKind::Direct)
    }

    pub(crate) fn panned(state: PannedState) -> Self {
        Self::with_kind(SourceKind::Panned(state))
    }

    pub(crate) fn spatial(state: SpatialState) -> Self {
        Self::with_kind(SourceKind::Spatial(state))
    }

    pub(crate) fn begin_block(&mut self) {
        self.input.fill(0.0);
    }

    /// Add one generator's block (`channels` interleaved) to the input.
    pub(crate) fn mix_in(&mut self, block: &[f32], channels: usize) {
        match self.kind {
            SourceKind::Direct => {
                let frames = self.input.chunks_exact_mut(OUTPUT_CHANNELS);
                if channels == 1 {
                    for (frame, &x) in frames.zip(block) {
                        frame[0] += x;
                        frame[1] += x;
                    }
                } else {
                    for (frame, src) in frames.zip(block.chunks_exact(channels)) {
                        frame[0] += src[0];
                        frame[1] += src[1];
                    }
                }
            }
            SourceKind::Panned(_) | SourceKind::Spatial(_) => {
                let scale = 1.0 / channels as f32;
                for (o, src) in self.input[..BLOCK_SIZE]
                    .iter_mut()
                    .zip(block.chunks_exact(channels))
                {
                    *o += src.iter().sum::<f32>() * scale;
                }
            }
        }
    }

    /// Pan, apply gain and filters, and split into direct output and send.
    pub(crate) fn finish_block(&mut self, listener: &Listener) {
        self.output.fill(0.0);
        match &mut self.kind {
            SourceKind::Direct => self.output.copy_from_slice(&self.input),
            SourceKind::Panned(state) => {
                state.run(&self.input[..BLOCK_SIZE], &mut self.output, listener)
            }
            SourceKind::Spatial(state) => {
                state.run(&self.input[..BLOCK_SIZE], &mut self.output, listener)
            }
        }
        self.gain.apply(&mut self.output, OUTPUT_CHANNELS);
        self.filter.process_interleaved(&mut self.output);

        for (s, frame) in self
            .send
            .iter_mut()
            .zip(self.output.chunks_exact(OUTPUT_CHANNELS))
        {
            *s = (frame[0] + frame[1]) * 0.5;
        }
        self.filter_effects.process_interleaved(&mut self.send);
        self.filter_direct.process_interleaved(&mut self.output);
    }

    /// Stereo output for the direct path, valid after `finish_block`.
    pub(crate) fn output(&self) -> &[f32] {
        &self.output
    }

    /// Mono feed for routes, valid after `finish_block`.
    pub(crate) fn send(&self) -> &[f32] {
        &self.send
    }

    pub(crate) fn apply(&mut self, command: SourceCommand) {
        match command {
            SourceCommand::Gain(gain) => self.gain.set_target(gain as f32, BLOCK_SIZE),
            SourceCommand::Filter(config) => self.filter.set_def(config.design()),
            SourceCommand::FilterDirect(config) => self.filter_direct.set_def(config.design()),
            SourceCommand::FilterEffects(config) => {
                self.filter_effects.set_def(config.design())
            }
            other => match &mut self.kind {
                SourceKind::Direct => {}
                SourceKind::Panned(state) => state.apply(other),
                SourceKind::Spatial(state) => state.apply(other),
            },
        }
    }
}

/// `strategy`, with `Delegate` replaced by the context default.
pub(crate) fn resolve_strategy(strategy: PannerStrategy, default: PannerStrategy) -> PannerStrategy {
    match (strategy, default) {
        (PannerStrategy::Delegate, PannerStrategy::Delegate) => PannerStrategy::Stereo,
        (PannerStrategy::Delegate, default) => default,
        (strategy, _) => strategy,
    }
}

/// Swap `panner` out if the resolved strategy changed. Returns whether it did.
pub(crate) fn refresh_panner(panner: &mut Panner, strategy: PannerStrategy, default: PannerStrategy) -> bool {
    let wanted = resolve_strategy(strategy, default);
    if panner.strategy() == wanted {
        return false;
    }
    *panner = Panner::new(wanted);
    true
}

/// Properties every source kind shares.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SourceProps {
    pub(crate) gain: f64,
    pub(crate) filter: BiquadConfig,
    pub(crate) filter_direct: BiquadConfig,
    pub(crate) filter_effects: BiquadConfig,
}

impl Default for SourceProps {
    fn default() -> Self {
        Self {
            gain: 1.0,
            filter: BiquadConfig::Identity,
            filter_direct: BiquadConfig::Identity,
            filter_effects: BiquadConfig::Identity,
        }
    }
}

/// Generates the methods every source handle has. The handle's props type
/// must carry a `common: SourceProps` field.
macro_rules! impl_source_common {
    ($ty:ty) => {
        impl $ty {
            fn send(&self, command: $crate::engine::command::SourceCommand) {
                self.inner.submit($crate::engine::command::Command::Source {
                    id: self.inner.id(),
                    command,
                });
            }

            pub fn gain(&self) -> f64 {
                self.inner.props().common.gain
            }

            pub fn set_gain(&self, gain: f64) -> $crate::error::Result<()> {
                $crate::error::check_range("gain", gain, 0.0, f64::MAX)?;
                self.inner.props().common.gain = gain;
                self.send($crate::engine::command::SourceCommand::Gain(gain));
                Ok(())
            }

            /// Filter applied to everything this source outputs.
            pub fn filter(&self) -> $crate::dsp::filter::BiquadConfig {
                self.inner.props().common.filter
            }

            pub fn set_filter(
                &self,
                filter: $crate::dsp::filter::BiquadConfig,
            ) -> $crate::error::Result<()> {
                filter.validate()?;
                self.inner.props().common.filter = filter;
                self.send($crate::engine::command::SourceCommand::Filter(filter));
                Ok(())
            }

            /// Filter on the path straight to the output, not on effect sends.
            pub fn filter_direct(&self) -> $crate::dsp::filter::BiquadConfig {
                self.inner.props().common.filter_direct
            }

            pub fn set_filter_direct(
                &self,
                filter: $crate::dsp::filter::BiquadConfig,
            ) -> $crate::error::Result<()> {
                filter.validate()?;
                self.inner.props().common.filter_direct = filter;
                self.send($crate::engine::command::SourceCommand::FilterDirect(filter));
                Ok(())
            }

            /// Filter on what this source sends to effects.
            pub fn filter_effects(&self) -> $crate::dsp::filter::BiquadConfig {
                self.inner.props().common.filter_effects
            }

            pub fn set_filter_effects(
                &self,
                filter: $crate::dsp::filter::BiquadConfig,
            ) -> $crate::error::Result<()> {
                filter.validate()?;
                self.inner.props().common.filter_effects = filter;
                self.send($crate::engine::command::SourceCommand::FilterEffects(filter));
                Ok(())
            }

            /// Play `generator` through this source, taking it from any
            /// other source it was playing through.
            pub fn add_generator(
                &self,
                generator: &impl $crate::handle::Generator,
            ) -> $crate::error::Result<()> {
                self.inner.context().check_owned(generator.context())?;
                self.inner.submit($crate::engine::command::Command::AddGenerator {
                    source: self.inner.id(),
                    generator: generator.id(),
                });
                Ok(())
            }

            pub fn remove_generator(
                &self,
                generator: &impl $crate::handle::Generator,
            ) -> $crate::error::Result<()> {
                self.inner.context().check_owned(generator.context())?;
                self.inner.submit($crate::engine::command::Command::RemoveGenerator {
                    source: self.inner.id(),
                    generator: generator.id(),
                });
                Ok(())
            }
        }
    };
}

pub(crate) use impl_source_common;
