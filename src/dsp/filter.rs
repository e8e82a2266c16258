use std::f64::consts::PI;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{check_range, Result};
use crate::SR;

/*
Biquad Filters
==============

Every filter here is a two-pole, two-zero section designed from the audio EQ
cookbook (Robert Bristow-Johnson). Frequencies are passed as `omega`, the
fraction of the sample rate (frequency / sr), so the same designs work for
any rate.

    y[n] = b0·x[n] + b1·x[n-1] + b2·x[n-2] - a1·y[n-1] - a2·y[n-2]

Coefficients are normalized so a0 = 1. Processing uses transposed direct
form II, which keeps two state values per channel.

| design    | passes           | rejects           |
| --------- | ---------------- | ----------------- |
| lowpass   | below cutoff     | above cutoff      |
| highpass  | above cutoff     | below cutoff      |
| bandpass  | around center    | both sides        |
| lowshelf  | all, LF scaled   |                   |
| highshelf | all, HF scaled   |                   |
*/

/// Q giving a Butterworth response for lowpass/highpass.
pub const BUTTERWORTH_Q: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// Normalized biquad coefficients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadDef {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl BiquadDef {
    pub const IDENTITY: BiquadDef = BiquadDef {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    fn normalize(b: [f64; 3], a: [f64; 3]) -> Self {
        let a0 = a[0];
        Self {
            b0: (b[0] / a0) as f32,
            b1: (b[1] / a0) as f32,
            b2: (b[2] / a0) as f32,
            a1: (a[1] / a0) as f32,
            a2: (a[2] / a0) as f32,
        }
    }

    pub fn lowpass(omega: f64, q: f64) -> Self {
        let w0 = 2.0 * PI * omega;
        let (sin, cos) = w0.sin_cos();
        let alpha = sin / (2.0 * q);
        Self::normalize(
            [(1.0 - cos) / 2.0, 1.0 - cos, (1.0 - cos) / 2.0],
            [1.0 + alpha, -2.0 * cos, 1.0 - alpha],
        )
    }

    pub fn highpass(omega: f64, q: f64) -> Self {
        let w0 = 2.0 * PI * omega;
        let (sin, cos) = w0.sin_cos();
        let alpha = sin / (2.0 * q);
        Self::normalize(
            [(1.0 + cos) / 2.0, -(1.0 + cos), (1.0 + cos) / 2.0],
            [1.0 + alpha, -2.0 * cos, 1.0 - alpha],
        )
    }

    /// Constant 0 dB peak gain; `bw` is the bandwidth in octaves.
    pub fn bandpass(omega: f64, bw: f64) -> Self {
        let w0 = 2.0 * PI * omega;
        let (sin, cos) = w0.sin_cos();
        let alpha = sin * ((2.0f64.ln() / 2.0) * bw * w0 / sin).sinh();
        Self::normalize([alpha, 0.0, -alpha], [1.0 + alpha, -2.0 * cos, 1.0 - alpha])
    }

    /// Shelf below `omega` scaled by `db_gain`, shelf slope 1.
    pub fn lowshelf(omega: f64, db_gain: f64) -> Self {
        let a = 10f64.powf(db_gain / 40.0);
        let w0 = 2.0 * PI * omega;
        let (sin, cos) = w0.sin_cos();
        let alpha = sin / 2.0 * 2f64.sqrt();
        let sa = 2.0 * a.sqrt() * alpha;
        Self::normalize(
            [
                a * ((a + 1.0) - (a - 1.0) * cos + sa),
                2.0 * a * ((a - 1.0) - (a + 1.0) * cos),
                a * ((a + 1.0) - (a - 1.0) * cos - sa),
            ],
            [
                (a + 1.0) + (a - 1.0) * cos + sa,
                -2.0 * ((a - 1.0) + (a + 1.0) * cos),
                (a + 1.0) + (a - 1.0) * cos - sa,
            ],
        )
    }

    /// Shelf above `omega` scaled by `db_gain`, shelf slope 1.
    pub fn highshelf(omega: f64, db_gain: f64) -> Self {
        let a = 10f64.powf(db_gain / 40.0);
        let w0 = 2.0 * PI * omega;
        let (sin, cos) = w0.sin_cos();
        let alpha = sin / 2.0 * 2f64.sqrt();
        let sa = 2.0 * a.sqrt() * alpha;
        Self::normalize(
            [
                a * ((a + 1.0) + (a - 1.0) * cos + sa),
                -2.0 * a * ((a - 1.0) + (a + 1.0) * cos),
                a * ((a + 1.0) + (a - 1.0) * cos - sa),
            ],
            [
                (a + 1.0) - (a - 1.0) * cos + sa,
                2.0 * ((a - 1.0) - (a + 1.0) * cos),
                (a + 1.0) - (a - 1.0) * cos - sa,
            ],
        )
    }

    /// Magnitude response at `omega`, for tests and diagnostics.
    pub fn magnitude_at(&self, omega: f64) -> f64 {
        let w = 2.0 * PI * omega;
        let (s1, c1) = w.sin_cos();
        let (s2, c2) = (2.0 * w).sin_cos();
        let (b0, b1, b2) = (self.b0 as f64, self.b1 as f64, self.b2 as f64);
        let (a1, a2) = (self.a1 as f64, self.a2 as f64);
        let num_re = b0 + b1 * c1 + b2 * c2;
        let num_im = -(b1 * s1 + b2 * s2);
        let den_re = 1.0 + a1 * c1 + a2 * c2;
        let den_im = -(a1 * s1 + a2 * s2);
        (num_re.hypot(num_im)) / (den_re.hypot(den_im))
    }
}

/// User-facing filter description attached to sources and routes.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum BiquadConfig {
    #[default]
    Identity,
    Lowpass { frequency: f64, q: f64 },
    Highpass { frequency: f64, q: f64 },
    /// `bandwidth` in octaves.
    Bandpass { frequency: f64, bandwidth: f64 },
}

impl BiquadConfig {
    pub fn lowpass(frequency: f64) -> Self {
        BiquadConfig::Lowpass {
            frequency,
            q: BUTTERWORTH_Q,
        }
    }

    pub fn highpass(frequency: f64) -> Self {
        BiquadConfig::Highpass {
            frequency,
            q: BUTTERWORTH_Q,
        }
    }

    pub fn bandpass(frequency: f64, bandwidth: f64) -> Self {
        BiquadConfig::Bandpass {
            frequency,
            bandwidth,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let nyquist = SR as f64 / 2.0;
        match *self {
            BiquadConfig::Identity => Ok(()),
            BiquadConfig::Lowpass { frequency, q } | BiquadConfig::Highpass { frequency, q } => {
                check_range("filter.frequency", frequency, 1.0, nyquist - 1.0)?;
                check_range("filter.q", q, 0.01, 100.0)
            }
            BiquadConfig::Bandpass {
                frequency,
                bandwidth,
            } => {
                check_range("filter.frequency", frequency, 1.0, nyquist - 1.0)?;
                check_range("filter.bandwidth", bandwidth, 0.01, 8.0)
            }
        }
    }

    pub fn design(&self) -> BiquadDef {
        let sr = SR as f64;
        match *self {
            BiquadConfig::Identity => BiquadDef::IDENTITY,
            BiquadConfig::Lowpass { frequency, q } => BiquadDef::lowpass(frequency / sr, q),
            BiquadConfig::Highpass { frequency, q } => BiquadDef::highpass(frequency / sr, q),
            BiquadConfig::Bandpass {
                frequency,
                bandwidth,
            } => BiquadDef::bandpass(frequency / sr, bandwidth),
        }
    }
}

/// Biquad over `CH` interleaved channels.
#[derive(Debug, Clone)]
pub struct Biquad<const CH: usize> {
    def: BiquadDef,
    identity: bool,
    z1: [f32; CH],
    z2: [f32; CH],
}

impl<const CH: usize> Biquad<CH> {
    pub fn new(def: BiquadDef) -> Self {
        Self {
            identity: def == BiquadDef::IDENTITY,
            def,
            z1: [0.0; CH],
            z2: [0.0; CH],
        }
    }

    pub fn identity() -> Self {
        Self::new(BiquadDef::IDENTITY)
    }

    /// Swap coefficients, keeping state so the change doesn't click.
    pub fn set_def(&mut self, def: BiquadDef) {
        self.identity = def == BiquadDef::IDENTITY;
        self.def = def;
    }

    #[inline]
    pub fn tick(&mut self, ch: usize, x: f32) -> f32 {
        let d = &self.def;
        let y = d.b0 * x + self.z1[ch];
        self.z1[ch] = d.b1 * x - d.a1 * y + self.z2[ch];
        self.z2[ch] = d.b2 * x - d.a2 * y;
        y
    }

    pub fn process_interleaved(&mut self, buffer: &mut [f32]) {
        if self.identity {
            return;
        }
        for frame in buffer.chunks_exact_mut(CH) {
            for (ch, sample) in frame.iter_mut().enumerate() {
                *sample = self.tick(ch, *sample);
            }
        }
    }

    pub fn reset(&mut self) {
        self.z1 = [0.0; CH];
        self.z2 = [0.0; CH];
    }
}

/// One-pole lowpass, `y += (x - y) * (1 - a)`.
#[derive(Debug, Clone, Copy)]
pub struct OnePoleLowpass {
    a: f32,
    y: f32,
}

impl OnePoleLowpass {
    pub fn new(omega: f64) -> Self {
        let mut f = Self { a: 0.0, y: 0.0 };
        f.set_omega(omega);
        f
    }

    pub fn set_omega(&mut self, omega: f64) {
        self.a = (-2.0 * PI * omega.clamp(0.0, 0.5)).exp() as f32;
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        self.y += (x - self.y) * (1.0 - self.a);
        self.y
    }

    pub fn reset(&mut self) {
        self.y = 0.0;
    }
}

/// Removes DC: `y[n] = x[n] - x[n-1] + r·y[n-1]`.
#[derive(Debug, Clone, Copy)]
pub struct DcBlocker {
    r: f32,
    x1: f32,
    y1: f32,
}

impl DcBlocker {
    pub fn new(r: f32) -> Self {
        Self { r, x1: 0.0, y1: 0.0 }
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let y = x - self.x1 + self.r * self.y1;
        self.x1 = x;
        self.y1 = y;
        y
    }
}

impl Default for DcBlocker {
    fn default() -> Self {
        Self::new(0.995)
    }
}
