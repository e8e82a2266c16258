use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{EffectNode, EffectSlot};
use crate::context::Context;
use crate::dsp::delay::DelayLine;
use crate::dsp::filter::BiquadConfig;
use crate::engine::command::{Command, EffectCommand};
use crate::error::{check_range, Result};
use crate::handle::{impl_object, Effect, HandleInner};
use crate::library::ensure_initialized;
use crate::SR;

/// Longest delay a tap may have, in seconds.
pub const MAX_ECHO_DELAY: f64 = 5.0;

/// One echo: the input, `delay` seconds late, at its own left/right gains.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EchoTap {
    pub delay: f64,
    pub gain_l: f64,
    pub gain_r: f64,
}

impl EchoTap {
    pub fn new(delay: f64, gain_l: f64, gain_r: f64) -> Self {
        Self {
            delay,
            gain_l,
            gain_r,
        }
    }

    fn validate(&self) -> Result<()> {
        check_range("echo.delay", self.delay, 0.0, MAX_ECHO_DELAY)?;
        check_range("echo.gain_l", self.gain_l, -f64::MAX, f64::MAX)?;
        check_range("echo.gain_r", self.gain_r, -f64::MAX, f64::MAX)
    }
}

#[derive(Debug, Clone, Copy)]
struct Tap {
    delay: usize,
    gain_l: f32,
    gain_r: f32,
}

impl From<&EchoTap> for Tap {
    fn from(tap: &EchoTap) -> Self {
        Self {
            delay: (tap.delay * SR as f64).round() as usize,
            gain_l: tap.gain_l as f32,
            gain_r: tap.gain_r as f32,
        }
    }
}

/// Multi-tap delay. New tap sets crossfade in over one block.
pub(crate) struct EchoNode {
    line: DelayLine,
    taps: Vec<Tap>,
    previous: Vec<Tap>,
}

impl EchoNode {
    pub(crate) fn new() -> Self {
        Self {
            line: DelayLine::new((MAX_ECHO_DELAY * SR as f64) as usize + 1),
            taps: Vec::new(),
            previous: Vec::new(),
        }
    }

    fn sum(line: &DelayLine, taps: &[Tap]) -> (f32, f32) {
        taps.iter().fold((0.0, 0.0), |(l, r), tap| {
            let v = line.read(tap.delay);
            (l + v * tap.gain_l, r + v * tap.gain_r)
        })
    }
}

impl EffectNode for EchoNode {
    fn process(&mut self, input: &[f32], out: &mut [f32]) {
        let crossfading = !self.previous.is_empty();
        let n = input.len().max(1) as f32;
        for (i, (&x, frame)) in input.iter().zip(out.chunks_exact_mut(2)).enumerate() {
            self.line.write(x);
            let (mut l, mut r) = Self::sum(&self.line, &self.taps);
            if crossfading {
                let t = (i + 1) as f32 / n;
                let (pl, pr) = Self::sum(&self.line, &self.previous);
                l = l * t + pl * (1.0 - t);
                r = r * t + pr * (1.0 - t);
            }
            frame[0] += l;
            frame[1] += r;
        }
        self.previous.clear();
    }

    fn apply(&mut self, command: EffectCommand) {
        if let EffectCommand::EchoTaps(taps) = command {
            self.previous = std::mem::take(&mut self.taps);
            self.taps = taps.iter().map(Tap::from).collect();
            // An empty old set still needs the new taps to fade in.
            if self.previous.is_empty() {
                self.previous.push(Tap {
                    delay: 0,
                    gain_l: 0.0,
                    gain_r: 0.0,
                });
            }
        }
    }

    fn reset(&mut self) {
        self.line.reset();
    }
}

#[derive(Debug, Clone)]
struct EchoProps {
    gain: f64,
    filter_input: BiquadConfig,
    taps: Vec<EchoTap>,
}

/// Tapped delay line shared by every source routed to it.
#[derive(Clone)]
pub struct GlobalEcho {
    inner: Arc<HandleInner<EchoProps>>,
}

impl_object!(GlobalEcho, Effect);

impl GlobalEcho {
    pub fn new(context: &Context) -> Result<Self> {
        ensure_initialized()?;
        let id = context.allocate_id();
        let inner = HandleInner::register(
            context,
            id,
            EchoProps {
                gain: 1.0,
                filter_input: BiquadConfig::Identity,
                taps: Vec::new(),
            },
            Command::InsertEffect {
                id,
                slot: Box::new(EffectSlot::new(EchoNode::new())),
            },
        );
        tracing::debug!(%id, "echo created");
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

    pub fn gain(&self) -> f64 {
        self.inner.props().gain
    }

    pub fn set_gain(&self, gain: f64) -> Result<()> {
        check_range("gain", gain, 0.0, f64::MAX)?;
        self.inner.props().gain = gain;
        self.send(EffectCommand::Gain(gain));
        Ok(())
    }

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

    pub fn taps(&self) -> Vec<EchoTap> {
        self.inner.props().taps.clone()
    }

    /// Replace every tap at once.
    pub fn set_taps(&self, taps: &[EchoTap]) -> Result<()> {
        for tap in taps {
            tap.validate()?;
        }
        self.inner.props().taps = taps.to_vec();
        self.send(EffectCommand::EchoTaps(taps.to_vec()));
        tracing::debug!(id = %self.inner.id(), taps = taps.len(), "echo taps replaced");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BLOCK_SIZE;

    fn impulse_response(node: &mut EchoNode, blocks: usize) -> Vec<f32> {
        let mut result = Vec::new();
        for b in 0..blocks {
            let mut input = vec![0.0; BLOCK_SIZE];
            if b == 0 {
                input[0] = 1.0;
            }
            let mut out = vec![0.0; BLOCK_SIZE * 2];
            node.process(&input, &mut out);
            result.extend(out);
        }
        result
    }

    #[test]
    fn test_tap_lands_at_its_delay() {
        let mut node = EchoNode::new();
        node.apply(EffectCommand::EchoTaps(vec![EchoTap::new(0.01, 1.0, 0.5)]));
        // Let the crossfade finish on silence.
        node.process(&[0.0; BLOCK_SIZE], &mut vec![0.0; BLOCK_SIZE * 2]);
        let out = impulse_response(&mut node, 4);
        let at = (0.01 * SR as f64).round() as usize;
        assert_eq!(out[at * 2], 1.0);
        assert_eq!(out[at * 2 + 1], 0.5);
        let others = out
            .iter()
            .enumerate()
            .filter(|&(i, &s)| i / 2 != at && s != 0.0)
            .count();
        assert_eq!(others, 0);
    }

    #[test]
    fn test_validation() {
        assert!(EchoTap::new(5.0, 1.0, 1.0).validate().is_ok());
        assert!(EchoTap::new(5.5, 1.0, 1.0).validate().is_err());
        assert!(EchoTap::new(1.0, f64::NAN, 1.0).validate().is_err());
    }

    #[test]
    fn test_reset_clears_pending_echoes() {
        let mut node = EchoNode::new();
        node.apply(EffectCommand::EchoTaps(vec![EchoTap::new(0.5, 1.0, 1.0)]));
        node.process(&[1.0; BLOCK_SIZE], &mut vec![0.0; BLOCK_SIZE * 2]);
        node.reset();
        let mut out = vec![0.0; BLOCK_SIZE * 2];
        for _ in 0..100 {
            out.fill(0.0);
            node.process(&[0.0; BLOCK_SIZE], &mut out);
            assert!(out.iter().all(|&s| s == 0.0));
        }
    }
}
