//! Noise sources: white, pink (Voss-McCartney) and brown.

/*
Noise Colors
============

  uniform         White noise. Flat spectrum, every sample independent.

  vm              Pink noise via the Voss-McCartney algorithm: several random
                  rows are summed, and row k is refreshed every 2^k samples.
                  The slowly changing rows pile energy into the low end,
                  approximating a -3 dB/octave slope.

  filtered brown  White noise through a leaky integrator (-6 dB/octave) with
                  a DC blocker on the output so it can't drift off.
*/

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::filter::DcBlocker;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoiseType {
    #[default]
    Uniform,
    Vm,
    FilteredBrown,
}

impl NoiseType {
    pub const ALL: [NoiseType; 3] = [NoiseType::Uniform, NoiseType::Vm, NoiseType::FilteredBrown];
}

const VM_ROWS: usize = 14;
const BROWN_LEAK: f32 = 0.998;
const BROWN_INPUT: f32 = 0.02;
const BROWN_GAIN: f32 = 3.0;

/// One channel of noise.
pub struct NoiseSource {
    rng: SmallRng,
    noise_type: NoiseType,
    vm_rows: [f32; VM_ROWS],
    vm_sum: f32,
    vm_counter: u32,
    brown: f32,
    dc: DcBlocker,
}

impl NoiseSource {
    pub fn new(seed: u64) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut vm_rows = [0.0; VM_ROWS];
        for row in vm_rows.iter_mut() {
            *row = rng.random_range(-1.0..=1.0);
        }
        let vm_sum = vm_rows.iter().sum();
        Self {
            rng,
            noise_type: NoiseType::Uniform,
            vm_rows,
            vm_sum,
            vm_counter: 0,
            brown: 0.0,
            dc: DcBlocker::default(),
        }
    }

    pub fn set_noise_type(&mut self, noise_type: NoiseType) {
        self.noise_type = noise_type;
    }

    pub fn noise_type(&self) -> NoiseType {
        self.noise_type
    }

    #[inline]
    fn white(&mut self) -> f32 {
        self.rng.random_range(-1.0..=1.0)
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        match self.noise_type {
            NoiseType::Uniform => self.white(),
            NoiseType::Vm => self.next_vm(),
            NoiseType::FilteredBrown => self.next_brown(),
        }
    }

    fn next_vm(&mut self) -> f32 {
        self.vm_counter = self.vm_counter.wrapping_add(1);
        let row = (self.vm_counter.trailing_zeros() as usize).min(VM_ROWS - 1);
        let fresh = self.white();
        self.vm_sum += fresh - self.vm_rows[row];
        self.vm_rows[row] = fresh;
        // One extra white sample per tick fills in the top octave.
        let white = self.white();
        (self.vm_sum + white) / (VM_ROWS as f32 + 1.0)
    }

    fn next_brown(&mut self) -> f32 {
        let w = self.white();
        self.brown = BROWN_LEAK * self.brown + BROWN_INPUT * w;
        (self.dc.process(self.brown) * BROWN_GAIN).clamp(-1.0, 1.0)
    }

    pub fn render(&mut self, buffer: &mut [f32]) {
        for s in buffer.iter_mut() {
            *s = self.next_sample();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Ratio of first-difference energy to signal energy; lower means darker.
    fn brightness(buf: &[f32]) -> f32 {
        let energy: f32 = buf.iter().map(|x| x * x).sum();
        let diff: f32 = buf.windows(2).map(|w| (w[1] - w[0]).powi(2)).sum();
        diff / energy
    }

    fn render(noise_type: NoiseType) -> Vec<f32> {
        let mut src = NoiseSource::new(7);
        src.set_noise_type(noise_type);
        let mut buf = vec![0.0; 44_100];
        src.render(&mut buf);
        buf
    }

    #[test]
    fn test_all_types_stay_in_range() {
        for t in NoiseType::ALL {
            let buf = render(t);
            assert!(buf.iter().all(|s| s.abs() <= 1.0), "{t:?} out of range");
            assert!(buf.iter().any(|s| s.abs() > 0.01), "{t:?} is silent");
        }
    }

    #[test]
    fn test_colors_get_darker() {
        let white = brightness(&render(NoiseType::Uniform));
        let pink = brightness(&render(NoiseType::Vm));
        let brown = brightness(&render(NoiseType::FilteredBrown));
        assert!(pink < white, "pink {pink} white {white}");
        assert!(brown < pink, "brown {brown} pink {pink}");
    }

    #[test]
    fn test_seeds_give_independent_streams() {
        let mut a = NoiseSource::new(1);
        let mut b = NoiseSource::new(2);
        let same = (0..64).filter(|_| a.next_sample() == b.next_sample()).count();
        assert!(same < 4);
    }
}
