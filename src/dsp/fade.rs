/// Linear ramp between parameter values.
///
/// Gains never jump: every change is spread over `len` samples so property
/// writes don't click. A zero length applies immediately.
#[derive(Debug, Clone, Copy)]
pub struct Fader {
    start: f32,
    target: f32,
    pos: usize,
    len: usize,
}

impl Fader {
    pub fn new(value: f32) -> Self {
        Self {
            start: value,
            target: value,
            pos: 0,
            len: 0,
        }
    }

    /// Ramp from the current value to `target` over `len` samples.
    pub fn set_target(&mut self, target: f32, len: usize) {
        self.start = self.value();
        self.target = target;
        self.pos = 0;
        self.len = len;
    }

    /// Value the next call to [`Fader::next`] would return.
    #[inline]
    pub fn value(&self) -> f32 {
        if self.pos >= self.len {
            self.target
        } else {
            self.start + (self.target - self.start) * (self.pos as f32 / self.len as f32)
        }
    }

    #[inline]
    pub fn next(&mut self) -> f32 {
        let v = self.value();
        if self.pos < self.len {
            self.pos += 1;
        }
        v
    }

    pub fn is_settled(&self) -> bool {
        self.pos >= self.len
    }

    /// Multiply each interleaved frame of `buffer` by successive gains.
    pub fn apply(&mut self, buffer: &mut [f32], channels: usize) {
        if self.is_settled() {
            let g = self.target;
            if g != 1.0 {
                buffer.iter_mut().for_each(|s| *s *= g);
            }
            return;
        }
        for frame in buffer.chunks_exact_mut(channels) {
            let g = self.next();
            frame.iter_mut().for_each(|s| *s *= g);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_is_linear() {
        let mut f = Fader::new(0.0);
        f.set_target(1.0, 4);
        let got: Vec<f32> = (0..6).map(|_| f.next()).collect();
        assert_eq!(got, vec![0.0, 0.25, 0.5, 0.75, 1.0, 1.0]);
        assert!(f.is_settled());
    }

    #[test]
    fn test_retarget_mid_ramp_starts_from_current() {
        let mut f = Fader::new(0.0);
        f.set_target(1.0, 4);
        f.next();
        f.next();
        f.set_target(0.0, 2);
        assert_eq!(f.next(), 0.5);
        assert_eq!(f.next(), 0.25);
        assert_eq!(f.next(), 0.0);
    }

    #[test]
    fn test_apply_scales_all_channels_of_a_frame() {
        let mut f = Fader::new(1.0);
        f.set_target(0.0, 2);
        let mut buf = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        f.apply(&mut buf, 2);
        assert_eq!(buf, [1.0, 1.0, 0.5, 0.5, 0.0, 0.0]);
    }
}
