//! Feedback delay network reverb.
//!
//! # Architecture
//!
//! ```text
//!                  ┌──────────────────────────────────────────────┐
//!                  │                                              │
//! Input ─→ [Pre-delay] ─→ [Input LPF] ─→ (+) ─→ [Line 0..7] ─→ [Decay EQ] ─┬─→ Output L/R
//!                                         ↑                               │
//!                                         └──── [Householder matrix] ←────┘
//! ```
//!
//! Eight delay lines are fed the same (pre-delayed, optionally lowpassed)
//! input. Their outputs pass through a per-line decay filter and are mixed
//! back into the lines by a Householder matrix, which is orthogonal and so
//! neither adds nor removes energy. All the decay therefore lives in the
//! per-line filters, which makes the reverb time easy to control.
//!
//! ## Decay
//!
//! A line of `d` seconds must lose 60 dB every `t60` seconds, so each pass
//! through it is scaled by `10^(-3·d / t60)`. Low and high frequencies get
//! their own t60 (`t60 · lf_rolloff`, `t60 · hf_rolloff`), realized with a
//! low shelf at `lf_reference` and a high shelf at `hf_reference`.
//!
//! ## Line lengths
//!
//! The average line is `mean_free_path` seconds long: the average time
//! between reflections in the simulated room. `diffusion` spreads the
//! lengths apart; every length is rounded up to a prime so the lines share
//! no common period. Each line's read point is swept by a slow sine whose
//! depth and rate come from the modulation parameters, which breaks up
//! metallic ringing.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::delay::DelayLine;
use super::filter::{Biquad, BiquadDef, BUTTERWORTH_Q};
use crate::error::{check_range, Result};
use crate::SR;

pub const FDN_LINES: usize = 8;

/// Relative line lengths at full diffusion.
const LINE_RATIOS: [f64; FDN_LINES] = [1.0, 1.13, 1.27, 1.41, 1.55, 1.71, 1.87, 2.03];

const MAX_MEAN_FREE_PATH: f64 = 0.5;
const MAX_MODULATION_DEPTH: f64 = 0.3;
const MAX_PRE_DELAY: f64 = 0.5;
const MIN_LINE: usize = 3;
const INPUT_GAIN: f32 = 0.35;
const SHELF_DB_RANGE: (f64, f64) = (-60.0, 24.0);

/// Tunable parameters of the reverb.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FdnReverbConfig {
    /// Seconds; average time between reflections.
    pub mean_free_path: f64,
    /// Seconds for the tail to fall by 60 dB.
    pub t60: f64,
    pub late_reflections_lf_rolloff: f64,
    /// Hz.
    pub late_reflections_lf_reference: f64,
    pub late_reflections_hf_rolloff: f64,
    /// Hz.
    pub late_reflections_hf_reference: f64,
    pub late_reflections_diffusion: f64,
    /// Seconds.
    pub late_reflections_modulation_depth: f64,
    /// Hz.
    pub late_reflections_modulation_frequency: f64,
    /// Seconds of pre-delay before the late reflections start.
    pub late_reflections_delay: f64,
    pub input_filter_enabled: bool,
    /// Hz.
    pub input_filter_cutoff: f64,
}

impl Default for FdnReverbConfig {
    fn default() -> Self {
        Self {
            mean_free_path: 0.02,
            t60: 1.0,
            late_reflections_lf_rolloff: 1.0,
            late_reflections_lf_reference: 200.0,
            late_reflections_hf_rolloff: 0.5,
            late_reflections_hf_reference: 500.0,
            late_reflections_diffusion: 1.0,
            late_reflections_modulation_depth: 0.01,
            late_reflections_modulation_frequency: 0.5,
            late_reflections_delay: 0.03,
            input_filter_enabled: true,
            input_filter_cutoff: 1500.0,
        }
    }
}

impl FdnReverbConfig {
    pub fn validate(&self) -> Result<()> {
        let nyquist = SR as f64 / 2.0;
        check_range("mean_free_path", self.mean_free_path, 0.0, MAX_MEAN_FREE_PATH)?;
        check_range("t60", self.t60, 0.0, 100.0)?;
        check_range("late_reflections_lf_rolloff", self.late_reflections_lf_rolloff, 0.0, 2.0)?;
        check_range(
            "late_reflections_lf_reference",
            self.late_reflections_lf_reference,
            0.0,
            nyquist,
        )?;
        check_range("late_reflections_hf_rolloff", self.late_reflections_hf_rolloff, 0.0, 2.0)?;
        check_range(
            "late_reflections_hf_reference",
            self.late_reflections_hf_reference,
            0.0,
            nyquist,
        )?;
        check_range("late_reflections_diffusion", self.late_reflections_diffusion, 0.0, 1.0)?;
        check_range(
            "late_reflections_modulation_depth",
            self.late_reflections_modulation_depth,
            0.0,
            MAX_MODULATION_DEPTH,
        )?;
        check_range(
            "late_reflections_modulation_frequency",
            self.late_reflections_modulation_frequency,
            0.01,
            100.0,
        )?;
        check_range("late_reflections_delay", self.late_reflections_delay, 0.0, MAX_PRE_DELAY)?;
        check_range("input_filter_cutoff", self.input_filter_cutoff, 0.0, nyquist)
    }
}

fn is_prime(n: usize) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let mut i = 3;
    while i * i <= n {
        if n % i == 0 {
            return false;
        }
        i += 2;
    }
    true
}

fn next_prime(n: usize) -> usize {
    let mut n = n.max(2);
    while !is_prime(n) {
        n += 1;
    }
    n
}

/// Decay gain for one pass through `samples` of delay.
fn decay_gain(samples: usize, t60: f64) -> f64 {
    if t60 <= 0.0 {
        return 0.0;
    }
    10f64.powf(-3.0 * samples as f64 / (SR as f64 * t60))
}

fn ratio_db(num: f64, den: f64) -> f64 {
    if den <= 0.0 {
        return 0.0;
    }
    let ratio = (num / den).max(1e-6);
    (20.0 * ratio.log10()).clamp(SHELF_DB_RANGE.0, SHELF_DB_RANGE.1)
}

/// Mix `v` through an N×N Householder reflection: `v - (2/N)·sum(v)`.
#[inline]
fn householder(v: &mut [f32; FDN_LINES]) {
    let k = 2.0 / FDN_LINES as f32 * v.iter().sum::<f32>();
    for x in v.iter_mut() {
        *x -= k;
    }
}

pub struct FdnReverb {
    config: FdnReverbConfig,
    pre_delay: DelayLine,
    pre_delay_samples: usize,
    input_filter: Biquad<1>,
    lines: Vec<DelayLine>,
    lengths: [usize; FDN_LINES],
    gains: [f32; FDN_LINES],
    low_shelves: Vec<Biquad<1>>,
    high_shelves: Vec<Biquad<1>>,
    mod_phase: [f64; FDN_LINES],
    mod_step: f64,
    mod_depth: f64,
}

impl FdnReverb {
    pub fn new(config: FdnReverbConfig) -> Self {
        let line_capacity = ((MAX_MEAN_FREE_PATH * LINE_RATIOS[FDN_LINES - 1]
            + MAX_MODULATION_DEPTH)
            * SR as f64) as usize
            + 64;
        let mut reverb = Self {
            config,
            pre_delay: DelayLine::new((MAX_PRE_DELAY * SR as f64) as usize + 1),
            pre_delay_samples: 0,
            input_filter: Biquad::identity(),
            lines: (0..FDN_LINES).map(|_| DelayLine::new(line_capacity)).collect(),
            lengths: [MIN_LINE; FDN_LINES],
            gains: [0.0; FDN_LINES],
            low_shelves: (0..FDN_LINES).map(|_| Biquad::identity()).collect(),
            high_shelves: (0..FDN_LINES).map(|_| Biquad::identity()).collect(),
            mod_phase: std::array::from_fn(|i| i as f64 / FDN_LINES as f64),
            mod_step: 0.0,
            mod_depth: 0.0,
        };
        reverb.configure(config);
        reverb
    }

    pub fn config(&self) -> &FdnReverbConfig {
        &self.config
    }

    /// Apply new parameters. Allocation-free; the tail keeps ringing.
    pub fn configure(&mut self, config: FdnReverbConfig) {
        self.config = config;
        let sr = SR as f64;

        self.pre_delay_samples = (config.late_reflections_delay * sr) as usize;
        self.input_filter = if config.input_filter_enabled && config.input_filter_cutoff > 0.0 {
            let omega = (config.input_filter_cutoff / sr).min(0.499);
            Biquad::new(BiquadDef::lowpass(omega, BUTTERWORTH_Q))
        } else {
            Biquad::identity()
        };

        let base = config.mean_free_path * sr;
        let lf_omega = (config.late_reflections_lf_reference / sr).clamp(1e-4, 0.49);
        let hf_omega = (config.late_reflections_hf_reference / sr).clamp(1e-4, 0.49);
        for i in 0..FDN_LINES {
            let ratio = 1.0 + (LINE_RATIOS[i] - 1.0) * config.late_reflections_diffusion;
            let len = next_prime(((base * ratio) as usize).max(MIN_LINE));
            self.lengths[i] = len;

            let mid = decay_gain(len, config.t60);
            let low = decay_gain(len, config.t60 * config.late_reflections_lf_rolloff);
            let high = decay_gain(len, config.t60 * config.late_reflections_hf_rolloff);
            self.gains[i] = mid as f32;
            self.low_shelves[i].set_def(BiquadDef::lowshelf(lf_omega, ratio_db(low, mid)));
            self.high_shelves[i].set_def(BiquadDef::highshelf(hf_omega, ratio_db(high, mid)));
        }

        self.mod_depth = config.late_reflections_modulation_depth * sr;
        self.mod_step = config.late_reflections_modulation_frequency / sr;
    }

    /// Line lengths in samples, as currently configured.
    pub fn line_lengths(&self) -> &[usize; FDN_LINES] {
        &self.lengths
    }

    pub fn reset(&mut self) {
        self.pre_delay.reset();
        self.input_filter.reset();
        for line in &mut self.lines {
            line.reset();
        }
        for f in self.low_shelves.iter_mut().chain(self.high_shelves.iter_mut()) {
            f.reset();
        }
    }

    /// Process mono `input`, adding stereo interleaved output into `out`.
    pub fn process(&mut self, input: &[f32], out: &mut [f32]) {
        let mut taps = [0.0f32; FDN_LINES];
        for (&x, frame) in input.iter().zip(out.chunks_exact_mut(2)) {
            self.pre_delay.write(x);
            let delayed = self.pre_delay.read(self.pre_delay_samples);
            let fed = self.input_filter.tick(0, delayed) * INPUT_GAIN;

            for (i, tap) in taps.iter_mut().enumerate() {
                let sweep = 0.5 + 0.5 * (std::f64::consts::TAU * self.mod_phase[i]).sin();
                let delay = self.lengths[i] as f64 + self.mod_depth * sweep;
                // The line was written once since the read point was computed.
                let raw = self.lines[i].read_fractional((delay - 1.0) as f32);
                let decayed = self.high_shelves[i].tick(0, self.low_shelves[i].tick(0, raw));
                *tap = decayed * self.gains[i];

                self.mod_phase[i] += self.mod_step;
                if self.mod_phase[i] >= 1.0 {
                    self.mod_phase[i] -= 1.0;
                }
            }

            let (mut left, mut right) = (0.0, 0.0);
            for (i, &t) in taps.iter().enumerate() {
                if i % 2 == 0 {
                    left += t;
                } else {
                    right += t;
                }
            }
            frame[0] += left * 0.5;
            frame[1] += right * 0.5;

            householder(&mut taps);
            for (line, &fb) in self.lines.iter_mut().zip(taps.iter()) {
                line.write(fed + fb);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_impulse(config: FdnReverbConfig, seconds: f64) -> Vec<f32> {
        let mut reverb = FdnReverb::new(config);
        let frames = (seconds * SR as f64) as usize;
        let mut input = vec![0.0; frames];
        input[0] = 1.0;
        let mut out = vec![0.0; frames * 2];
        reverb.process(&input, &mut out);
        out
    }

    fn window_energy(out: &[f32], start_s: f64, len_s: f64) -> f32 {
        let start = (start_s * SR as f64) as usize * 2;
        let len = (len_s * SR as f64) as usize * 2;
        out[start..start + len].iter().map(|x| x * x).sum()
    }

    #[test]
    fn test_householder_preserves_energy() {
        let mut v = [1.0, -0.5, 0.25, 0.0, 0.3, 0.9, -0.2, 0.4];
        let before: f32 = v.iter().map(|x| x * x).sum();
        householder(&mut v);
        let after: f32 = v.iter().map(|x| x * x).sum();
        assert!((before - after).abs() < 1e-5);
    }

    #[test]
    fn test_lengths_are_prime_and_spread() {
        let reverb = FdnReverb::new(FdnReverbConfig::default());
        let lengths = reverb.line_lengths();
        assert!(lengths.iter().all(|&l| is_prime(l)));
        assert!(lengths.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_pre_delay_holds_back_output() {
        let out = render_impulse(FdnReverbConfig::default(), 0.2);
        // 30 ms pre-delay + 20 ms shortest line: nothing for the first 40 ms.
        let silent = (0.04 * SR as f64) as usize * 2;
        assert!(out[..silent].iter().all(|s| *s == 0.0));
        assert!(out.iter().any(|s| s.abs() > 1e-4));
    }

    #[test]
    fn test_tail_decays_with_t60() {
        let short = FdnReverbConfig {
            t60: 0.5,
            ..Default::default()
        };
        let long = FdnReverbConfig {
            t60: 3.0,
            ..Default::default()
        };
        let short_out = render_impulse(short, 2.0);
        let long_out = render_impulse(long, 2.0);
        let early = window_energy(&short_out, 0.1, 0.2);
        let late = window_energy(&short_out, 1.5, 0.2);
        assert!(late < early * 1e-3, "early {early} late {late}");
        assert!(window_energy(&long_out, 1.5, 0.2) > late * 10.0);
    }

    #[test]
    fn test_zero_t60_is_silent() {
        let config = FdnReverbConfig {
            t60: 0.0,
            ..Default::default()
        };
        let out = render_impulse(config, 0.5);
        assert!(out.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_stable_under_sustained_input() {
        let mut reverb = FdnReverb::new(FdnReverbConfig {
            t60: 100.0,
            late_reflections_lf_rolloff: 2.0,
            late_reflections_hf_rolloff: 2.0,
            ..Default::default()
        });
        let input = vec![0.1f32; 4096];
        let mut out = vec![0.0f32; 8192];
        for _ in 0..20 {
            out.fill(0.0);
            reverb.process(&input, &mut out);
            assert!(out.iter().all(|s| s.is_finite() && s.abs() < 1000.0));
        }
    }

    #[test]
    fn test_reset_silences_tail() {
        let mut reverb = FdnReverb::new(FdnReverbConfig::default());
        let mut input = vec![0.0; 4096];
        input[0] = 1.0;
        let mut out = vec![0.0; 8192];
        reverb.process(&input, &mut out);
        reverb.reset();
        out.fill(0.0);
        reverb.process(&vec![0.0; 4096], &mut out);
        assert!(out.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_config_validation() {
        assert!(FdnReverbConfig::default().validate().is_ok());
        let bad = FdnReverbConfig {
            t60: -1.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let bad = FdnReverbConfig {
            late_reflections_modulation_frequency: 0.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
