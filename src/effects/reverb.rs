use std::sync::Arc;

use super::{EffectNode, EffectSlot};
use crate::context::Context;
use crate::dsp::fdn::{FdnReverb, FdnReverbConfig};
use crate::dsp::filter::BiquadConfig;
use crate::engine::command::{Command, EffectCommand};
use crate::error::{check_range, Result};
use crate::handle::{impl_object, Effect, HandleInner};
use crate::library::ensure_initialized;

impl EffectNode for FdnReverb {
    fn process(&mut self, input: &[f32], out: &mut [f32]) {
        FdnReverb::process(self, input, out);
    }

    fn apply(&mut self, command: EffectCommand) {
        if let EffectCommand::FdnConfig(config) = command {
            self.configure(config);
        }
    }

    fn reset(&mut self) {
        FdnReverb::reset(self);
    }
}

#[derive(Debug, Clone, Copy)]
struct ReverbProps {
    gain: f64,
    filter_input: BiquadConfig,
    config: FdnReverbConfig,
}

/// An 8-line feedback delay network reverb shared by every source routed
/// to it.
#[derive(Clone)]
pub struct GlobalFdnReverb {
    inner: Arc<HandleInner<ReverbProps>>,
}

impl_object!(GlobalFdnReverb, Effect);

/// Getter and validated setter for one field of the reverb's config.
macro_rules! fdn_property {
    ($(#[$doc:meta])* $field:ident, $setter:ident: $ty:ty) => {
        $(#[$doc])*
        pub fn $field(&self) -> $ty {
            self.inner.props().config.$field
        }

        pub fn $setter(&self, value: $ty) -> Result<()> {
            self.update(|config| config.$field = value)
        }
    };
}

impl GlobalFdnReverb {
    pub fn new(context: &Context) -> Result<Self> {
        Self::with_config(context, FdnReverbConfig::default())
    }

    pub fn with_config(context: &Context, config: FdnReverbConfig) -> Result<Self> {
        ensure_initialized()?;
        config.validate()?;
        let id = context.allocate_id();
        let inner = HandleInner::register(
            context,
            id,
            ReverbProps {
                gain: 1.0,
                filter_input: BiquadConfig::Identity,
                config,
            },
            Command::InsertEffect {
                id,
                slot: Box::new(EffectSlot::new(FdnReverb::new(config))),
            },
        );
        tracing::debug!(%id, t60 = config.t60, "fdn reverb created");
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    fn send(&self, command: EffectCommand) {
        self.inner.submit(Command::Effect {
            id: self.inner.id(),
            command,
        });
    }

    fn update(&self, change: impl FnOnce(&mut FdnReverbConfig)) -> Result<()> {
        let mut props = self.inner.props();
        let mut config = props.config;
        change(&mut config);
        config.validate()?;
        props.config = config;
        drop(props);
        self.send(EffectCommand::FdnConfig(config));
        Ok(())
    }

    pub fn gain(&self) -> f64 {
        self.inner.props().gain
    }

    pub fn set_gain(&self, gain: f64) -> Result<()> {
        check_range("gain", gain, 0.0, f64::MAX)?;
        self.inner.props().gain = gain;
        self.send(EffectCommand::Gain(gain));
        Ok(())
    }

    /// Silence the tail immediately.
    pub fn reset(&self) {
        self.send(EffectCommand::Reset);
    }

    /// Filter applied to everything routed in, before the effect runs.
    pub fn filter_input(&self) -> BiquadConfig {
        self.inner.props().filter_input
    }

    pub fn set_filter_input(&self, filter: BiquadConfig) -> Result<()> {
        filter.validate()?;
        self.inner.props().filter_input = filter;
        self.send(EffectCommand::FilterInput(filter));
        Ok(())
    }

    pub fn config(&self) -> FdnReverbConfig {
        self.inner.props().config
    }

    /// Replace every parameter at once.
    pub fn set_config(&self, config: FdnReverbConfig) -> Result<()> {
        self.update(|c| *c = config)
    }

    fdn_property!(
        /// Seconds between reflections; sets the room size.
        mean_free_path, set_mean_free_path: f64
    );
    fdn_property!(
        /// Seconds for the tail to decay by 60 dB.
        t60, set_t60: f64
    );
    fdn_property!(late_reflections_lf_rolloff, set_late_reflections_lf_rolloff: f64);
    fdn_property!(late_reflections_lf_reference, set_late_reflections_lf_reference: f64);
    fdn_property!(late_reflections_hf_rolloff, set_late_reflections_hf_rolloff: f64);
    fdn_property!(late_reflections_hf_reference, set_late_reflections_hf_reference: f64);
    fdn_property!(late_reflections_diffusion, set_late_reflections_diffusion: f64);
    fdn_property!(late_reflections_modulation_depth, set_late_reflections_modulation_depth: f64);
    fdn_property!(
        late_reflections_modulation_frequency,
        set_late_reflections_modulation_frequency: f64
    );
    fdn_property!(
        /// Pre-delay before the late reflections start.
        late_reflections_delay, set_late_reflections_delay: f64
    );
    fdn_property!(input_filter_enabled, set_input_filter_enabled: bool);
    fdn_property!(input_filter_cutoff, set_input_filter_cutoff: f64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BLOCK_SIZE, OUTPUT_CHANNELS};

    #[test]
    fn test_slot_applies_config_updates() {
        let mut slot = EffectSlot::new(FdnReverb::new(FdnReverbConfig::default()));
        slot.apply(EffectCommand::FdnConfig(FdnReverbConfig {
            t60: 0.0,
            ..FdnReverbConfig::default()
        }));
        let mut out = vec![0.0; BLOCK_SIZE * OUTPUT_CHANNELS];
        for _ in 0..40 {
            slot.begin_block();
            slot.accumulate(&[1.0; BLOCK_SIZE]);
            slot.run(&mut out);
        }
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_reset_through_slot() {
        let mut slot = EffectSlot::new(FdnReverb::new(FdnReverbConfig {
            late_reflections_delay: 0.0,
            ..FdnReverbConfig::default()
        }));
        let mut out = vec![0.0; BLOCK_SIZE * OUTPUT_CHANNELS];
        for _ in 0..20 {
            slot.begin_block();
            slot.accumulate(&[0.5; BLOCK_SIZE]);
            slot.run(&mut out);
        }
        assert!(out.iter().any(|&s| s != 0.0));

        slot.apply(EffectCommand::Reset);
        out.fill(0.0);
        slot.begin_block();
        slot.run(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
    }
}
