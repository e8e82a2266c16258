/// Pull-based linear-interpolating resampler over interleaved frames.
///
/// The caller supplies input one frame at a time through a closure, which
/// lets the same code sit in front of a decoder, a slice or the mixer.
pub struct LinearResampler {
    channels: usize,
    step: f64,
    frac: f64,
    a: Vec<f32>,
    b: Vec<f32>,
    primed: bool,
    exhausted: bool,
    drained: bool,
}

impl LinearResampler {
    /// Convert from `from_sr` to `to_sr`.
    pub fn new(channels: usize, from_sr: u32, to_sr: u32) -> Self {
        Self {
            channels,
            step: from_sr as f64 / to_sr.max(1) as f64,
            frac: 0.0,
            a: vec![0.0; channels],
            b: vec![0.0; channels],
            primed: false,
            exhausted: false,
            drained: false,
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Forget all state, e.g. after the input seeks.
    pub fn reset(&mut self) {
        self.frac = 0.0;
        self.primed = false;
        self.exhausted = false;
        self.drained = false;
        self.a.fill(0.0);
        self.b.fill(0.0);
    }

    fn pull_into_b<F>(&mut self, pull: &mut F)
    where
        F: FnMut(&mut [f32]) -> bool,
    {
        if self.exhausted || !pull(&mut self.b) {
            self.b.fill(0.0);
            if self.exhausted {
                self.drained = true;
            }
            self.exhausted = true;
        }
    }

    /// Produce one output frame into `out`. Returns `false` once the input
    /// has run dry and every input frame has been emitted.
    pub fn next_frame<F>(&mut self, out: &mut [f32], mut pull: F) -> bool
    where
        F: FnMut(&mut [f32]) -> bool,
    {
        if !self.primed {
            if !pull(&mut self.a) {
                self.drained = true;
            }
            self.pull_into_b(&mut pull);
            self.primed = true;
        }
        if self.drained {
            out.fill(0.0);
            return false;
        }

        let t = self.frac as f32;
        for ((o, &a), &b) in out.iter_mut().zip(&self.a).zip(&self.b) {
            *o = a + (b - a) * t;
        }

        self.frac += self.step;
        while self.frac >= 1.0 {
            self.frac -= 1.0;
            std::mem::swap(&mut self.a, &mut self.b);
            self.pull_into_b(&mut pull);
            if self.drained {
                break;
            }
        }
        true
    }
}

/// Resample a whole interleaved signal.
pub fn resample_interleaved(input: &[f32], channels: usize, from_sr: u32, to_sr: u32) -> Vec<f32> {
    if from_sr == to_sr || input.is_empty() {
        return input.to_vec();
    }
    let frames_in = input.len() / channels;
    let frames_out = ((frames_in as u64 * to_sr as u64) / from_sr as u64) as usize;
    let mut out = vec![0.0; frames_out * channels];
    let mut rs = LinearResampler::new(channels, from_sr, to_sr);
    let mut frames = input.chunks_exact(channels);
    for frame in out.chunks_exact_mut(channels) {
        let more = rs.next_frame(frame, |dst| match frames.next() {
            Some(src) => {
                dst.copy_from_slice(src);
                true
            }
            None => false,
        });
        if !more {
            break;
        }
    }
    out
}
