//! Source → effect sends.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dsp::fade::Fader;
use crate::dsp::filter::{Biquad, BiquadConfig};
use crate::effects::EffectSlot;
use crate::error::{check_range, Result};
use crate::handle::ObjectId;
use crate::sources::SourceSlot;
use crate::{BLOCK_SIZE, SR};

/// How a source feeds an effect.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteConfig {
    pub gain: f64,
    /// Seconds to crossfade when the route appears or its gain changes.
    pub fade_time: f64,
    pub filter: BiquadConfig,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            gain: 1.0,
            fade_time: 0.03,
            filter: BiquadConfig::Identity,
        }
    }
}

impl RouteConfig {
    pub fn with_gain(gain: f64) -> Self {
        Self {
            gain,
            ..Self::default()
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        check_range("route.gain", self.gain, 0.0, f64::MAX)?;
        check_range("route.fade_time", self.fade_time, 0.0, MAX_FADE_TIME)?;
        self.filter.validate()
    }
}

pub(crate) const MAX_FADE_TIME: f64 = 60.0;

pub(crate) fn fade_samples(seconds: f64) -> usize {
    (seconds.max(0.0) * SR as f64) as usize
}

struct Route {
    output: ObjectId,
    input: ObjectId,
    gain: Fader,
    filter: Biquad<1>,
    removing: bool,
}

/// Every active route in a context.
pub(crate) struct RouteTable {
    routes: Vec<Route>,
    scratch: Vec<f32>,
}

impl RouteTable {
    pub(crate) fn new() -> Self {
        Self {
            routes: Vec::new(),
            scratch: vec![0.0; BLOCK_SIZE],
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.routes.len()
    }

    fn find(&mut self, output: ObjectId, input: ObjectId) -> Option<&mut Route> {
        self.routes
            .iter_mut()
            .find(|r| r.output == output && r.input == input)
    }

    /// Create the route, or retarget an existing one.
    pub(crate) fn configure(&mut self, output: ObjectId, input: ObjectId, config: RouteConfig) {
        let len = fade_samples(config.fade_time);
        let def = config.filter.design();
        if let Some(route) = self.find(output, input) {
            route.gain.set_target(config.gain as f32, len);
            route.filter.set_def(def);
            route.removing = false;
            return;
        }
        let mut gain = Fader::new(0.0);
        gain.set_target(config.gain as f32, len);
        self.routes.push(Route {
            output,
            input,
            gain,
            filter: Biquad::new(def),
            removing: false,
        });
        tracing::debug!(%output, %input, gain = config.gain, "route configured");
    }

    /// Fade the route out over `fade_time` seconds, then drop it.
    pub(crate) fn remove(&mut self, output: ObjectId, input: ObjectId, fade_time: f64) {
        if let Some(route) = self.find(output, input) {
            route.gain.set_target(0.0, fade_samples(fade_time));
            route.removing = true;
        }
    }

    /// Drop every route touching `id` immediately.
    pub(crate) fn remove_object(&mut self, id: ObjectId) {
        self.routes.retain(|r| r.output != id && r.input != id);
    }

    /// Add each source's send into the inputs of the effects it routes to.
    pub(crate) fn run(
        &mut self,
        sources: &BTreeMap<ObjectId, SourceSlot>,
        effects: &mut BTreeMap<ObjectId, EffectSlot>,
    ) {
        let scratch = &mut self.scratch;
        for route in &mut self.routes {
            let (Some(source), Some(effect)) =
                (sources.get(&route.output), effects.get_mut(&route.input))
            else {
                continue;
            };
            scratch.copy_from_slice(source.send());
            route.filter.process_interleaved(scratch);
            route.gain.apply(scratch, 1);
            effect.accumulate(scratch);
        }
        self.routes.retain(|r| !(r.removing && r.gain.is_settled()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RouteConfig::default();
        assert_eq!(config.gain, 1.0);
        assert_eq!(config.fade_time, 0.03);
        assert_eq!(config.filter, BiquadConfig::Identity);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_negative_gain() {
        assert!(RouteConfig::with_gain(-0.5).validate().is_err());
        let bad_fade = RouteConfig {
            fade_time: -1.0,
            ..RouteConfig::default()
        };
        assert!(bad_fade.validate().is_err());
    }

    #[test]
    fn test_reconfigure_keeps_one_route() {
        let mut table = RouteTable::new();
        let (s, e) = (ObjectId::new(1), ObjectId::new(2));
        table.configure(s, e, RouteConfig::default());
        table.configure(s, e, RouteConfig::with_gain(0.5));
        assert_eq!(table.len(), 1);
        table.remove_object(e);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_removed_route_lingers_until_faded() {
        let mut table = RouteTable::new();
        let (s, e) = (ObjectId::new(1), ObjectId::new(2));
        table.configure(s, e, RouteConfig::default());
        table.remove(s, e, 0.0);
        assert_eq!(table.len(), 1);
        table.run(&BTreeMap::new(), &mut BTreeMap::new());
        assert_eq!(table.len(), 0);
    }
}
