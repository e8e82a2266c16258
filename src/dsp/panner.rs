//! Mono to stereo panners.

/*
Panning
=======

Both panners take a mono block and add a stereo (interleaved L/R) block into
the output. Parameter changes are ramped across one block.

Stereo
------

Constant-power law over a scalar in [-1, 1]:

    angle = (scalar + 1) · π/4
    left  = cos(angle)      right = sin(angle)

Azimuth folds onto the scalar so front and back mirror each other:
0° → 0, 90° → +1, 180° → 0, 270° → -1.

Hrtf
----

A spherical-head approximation rather than measured responses:

  ITD  Woodworth's formula, (r / c) · (θ + sin θ), with θ the lateral
       angle. The far ear is delayed by that many seconds (at most ~0.66 ms).
  ILD  The far ear is lowpassed (head shadow) and both ears get a small
       level difference proportional to |sin θ|.
*/

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::delay::DelayLine;
use super::filter::OnePoleLowpass;
use crate::SR;

/// Which panner a source uses.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PannerStrategy {
    /// Use the context's default.
    #[default]
    Delegate,
    Hrtf,
    Stereo,
}

const HEAD_RADIUS: f64 = 0.0875;
const SPEED_OF_SOUND: f64 = 343.0;
const MAX_ITD_SAMPLES: usize = 64;
const ILD_DEPTH: f64 = 0.3;

/// Fold an azimuth in degrees onto the stereo scalar.
pub fn azimuth_to_scalar(azimuth: f64) -> f64 {
    let az = azimuth.rem_euclid(360.0);
    if az <= 90.0 {
        az / 90.0
    } else if az <= 270.0 {
        (180.0 - az) / 90.0
    } else {
        (az - 360.0) / 90.0
    }
}

/// Inverse of [`azimuth_to_scalar`] restricted to the front half.
pub fn scalar_to_azimuth(scalar: f64) -> f64 {
    let s = scalar.clamp(-1.0, 1.0);
    if s >= 0.0 {
        90.0 * s
    } else {
        360.0 + 90.0 * s
    }
}

fn constant_power(scalar: f64) -> [f32; 2] {
    let angle = (scalar.clamp(-1.0, 1.0) + 1.0) * std::f64::consts::FRAC_PI_4;
    [angle.cos() as f32, angle.sin() as f32]
}

#[derive(Debug, Clone)]
pub struct StereoPanner {
    gains: [f32; 2],
    target: [f32; 2],
}

impl StereoPanner {
    pub fn new() -> Self {
        let g = constant_power(0.0);
        Self { gains: g, target: g }
    }

    pub fn set_scalar(&mut self, scalar: f64) {
        self.target = constant_power(scalar);
    }

    pub fn run(&mut self, input: &[f32], out: &mut [f32]) {
        let n = input.len().max(1) as f32;
        let [l0, r0] = self.gains;
        let [l1, r1] = self.target;
        for (i, (&x, frame)) in input.iter().zip(out.chunks_exact_mut(2)).enumerate() {
            let t = (i + 1) as f32 / n;
            frame[0] += x * (l0 + (l1 - l0) * t);
            frame[1] += x * (r0 + (r1 - r0) * t);
        }
        self.gains = self.target;
    }
}

impl Default for StereoPanner {
    fn default() -> Self {
        Self::new()
    }
}

pub struct HrtfPanner {
    lines: [DelayLine; 2],
    shadow: [OnePoleLowpass; 2],
    delays: [f32; 2],
    target_delays: [f32; 2],
    gains: [f32; 2],
    target_gains: [f32; 2],
    shadow_omega: [f64; 2],
}

impl HrtfPanner {
    pub fn new() -> Self {
        let open = 18_000.0 / SR as f64;
        let g = std::f32::consts::FRAC_1_SQRT_2;
        Self {
            lines: [DelayLine::new(MAX_ITD_SAMPLES), DelayLine::new(MAX_ITD_SAMPLES)],
            shadow: [OnePoleLowpass::new(open), OnePoleLowpass::new(open)],
            delays: [0.0; 2],
            target_delays: [0.0; 2],
            gains: [g; 2],
            target_gains: [g; 2],
            shadow_omega: [open; 2],
        }
    }

    pub fn set_angles(&mut self, azimuth: f64, elevation: f64) {
        let az = azimuth.to_radians();
        let el = elevation.to_radians();
        // Positive lateral = right.
        let lateral = (az.sin() * el.cos()).clamp(-1.0, 1.0).asin();
        let itd = HEAD_RADIUS / SPEED_OF_SOUND * (lateral.abs() + lateral.abs().sin());
        let itd_samples = (itd * SR as f64).min(MAX_ITD_SAMPLES as f64 - 2.0) as f32;

        let s = lateral.sin();
        let base = std::f64::consts::FRAC_1_SQRT_2;
        let near = (base * (1.0 + ILD_DEPTH * s.abs())) as f32;
        let far = (base * (1.0 - ILD_DEPTH * s.abs())) as f32;
        let open = 18_000.0 / SR as f64;
        let shadowed = (18_000.0 - 16_500.0 * s.abs()) / SR as f64;

        // Index 0 is left, 1 is right; the far ear is the one away from the source.
        let (near_ear, far_ear) = if s >= 0.0 { (1, 0) } else { (0, 1) };
        self.target_delays[near_ear] = 0.0;
        self.target_delays[far_ear] = itd_samples;
        self.target_gains[near_ear] = near;
        self.target_gains[far_ear] = far;
        self.shadow_omega[near_ear] = open;
        self.shadow_omega[far_ear] = shadowed;
    }

    pub fn run(&mut self, input: &[f32], out: &mut [f32]) {
        for ear in 0..2 {
            self.shadow[ear].set_omega(self.shadow_omega[ear]);
        }
        let n = input.len().max(1) as f32;
        for (i, (&x, frame)) in input.iter().zip(out.chunks_exact_mut(2)).enumerate() {
            let t = (i + 1) as f32 / n;
            for ear in 0..2 {
                let line = &mut self.lines[ear];
                line.write(x);
                let d = self.delays[ear] + (self.target_delays[ear] - self.delays[ear]) * t;
                let g = self.gains[ear] + (self.target_gains[ear] - self.gains[ear]) * t;
                let delayed = line.read_fractional(d);
                frame[ear] += self.shadow[ear].process(delayed) * g;
            }
        }
        self.delays = self.target_delays;
        self.gains = self.target_gains;
    }
}

impl Default for HrtfPanner {
    fn default() -> Self {
        Self::new()
    }
}

/// A concrete panner, switchable at runtime.
pub enum Panner {
    Stereo(StereoPanner),
    Hrtf(Box<HrtfPanner>),
}

impl Panner {
    /// `strategy` must already be resolved; `Delegate` falls back to stereo.
    pub fn new(strategy: PannerStrategy) -> Self {
        match strategy {
            PannerStrategy::Hrtf => Panner::Hrtf(Box::new(HrtfPanner::new())),
            PannerStrategy::Stereo | PannerStrategy::Delegate => {
                Panner::Stereo(StereoPanner::new())
            }
        }
    }

    pub fn strategy(&self) -> PannerStrategy {
        match self {
            Panner::Stereo(_) => PannerStrategy::Stereo,
            Panner::Hrtf(_) => PannerStrategy::Hrtf,
        }
    }

    pub fn set_angles(&mut self, azimuth: f64, elevation: f64) {
        match self {
            Panner::Stereo(p) => p.set_scalar(azimuth_to_scalar(azimuth)),
            Panner::Hrtf(p) => p.set_angles(azimuth, elevation),
        }
    }

    pub fn set_scalar(&mut self, scalar: f64) {
        match self {
            Panner::Stereo(p) => p.set_scalar(scalar),
            Panner::Hrtf(p) => p.set_angles(scalar_to_azimuth(scalar), 0.0),
        }
    }

    pub fn run(&mut self, input: &[f32], out: &mut [f32]) {
        match self {
            Panner::Stereo(p) => p.run(input, out),
            Panner::Hrtf(p) => p.run(input, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn energy(buf: &[f32], ch: usize) -> f32 {
        buf.chunks_exact(2).map(|f| f[ch] * f[ch]).sum()
    }

    #[test]
    fn test_azimuth_folding() {
        assert_eq!(azimuth_to_scalar(0.0), 0.0);
        assert_eq!(azimuth_to_scalar(90.0), 1.0);
        assert_eq!(azimuth_to_scalar(180.0), 0.0);
        assert_eq!(azimuth_to_scalar(270.0), -1.0);
        assert_eq!(azimuth_to_scalar(-90.0), -1.0);
        assert_eq!(scalar_to_azimuth(-1.0), 270.0);
    }

    #[test]
    fn test_stereo_is_constant_power() {
        for scalar in [-1.0, -0.5, 0.0, 0.3, 1.0] {
            let [l, r] = constant_power(scalar);
            assert!((l * l + r * r - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_stereo_hard_right_settles() {
        let mut p = StereoPanner::new();
        p.set_scalar(1.0);
        let input = vec![1.0; 64];
        let mut out = vec![0.0; 128];
        p.run(&input, &mut out);
        out.fill(0.0);
        p.run(&input, &mut out);
        assert!(out[0].abs() < 1e-6);
        assert!((out[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_hrtf_favors_near_ear_and_delays_far_ear() {
        let mut p = HrtfPanner::new();
        p.set_angles(90.0, 0.0);
        let mut input = vec![0.0; 256];
        input[128] = 1.0;
        // Settle the ramp first.
        let mut out = vec![0.0; 512];
        p.run(&vec![0.0; 256], &mut out);
        out.fill(0.0);
        p.run(&input, &mut out);

        assert!(energy(&out, 1) > energy(&out, 0));
        let first = |ch: usize| out.chunks_exact(2).position(|f| f[ch].abs() > 1e-4);
        let (left, right) = (first(0).unwrap(), first(1).unwrap());
        assert!(left > right + 10, "left {left} right {right}");
    }

    #[test]
    fn test_panner_switch_reports_strategy() {
        assert_eq!(Panner::new(PannerStrategy::Hrtf).strategy(), PannerStrategy::Hrtf);
        assert_eq!(
            Panner::new(PannerStrategy::Delegate).strategy(),
            PannerStrategy::Stereo
        );
    }
}
