/// Circular delay line with integer and fractional reads.
///
/// Capacity is fixed at construction so reads and writes never allocate.
pub struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl DelayLine {
    /// A line able to delay by up to `max_delay` samples.
    pub fn new(max_delay: usize) -> Self {
        Self {
            buffer: vec![0.0; max_delay.max(1) + 2],
            write_pos: 0,
        }
    }

    /// Largest delay, in samples, a read can ask for.
    pub fn max_delay(&self) -> usize {
        self.buffer.len() - 2
    }

    /// Push a sample and return the one written `delay_samples` ago.
    pub fn next_sample(&mut self, sample: f32, delay_samples: usize) -> f32 {
        self.write(sample);
        self.read(delay_samples)
    }

    pub fn write(&mut self, sample: f32) {
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
        self.buffer[self.write_pos] = sample;
    }

    /// Read the sample written `delay` writes ago (0 is the latest).
    #[inline]
    pub fn read(&self, delay: usize) -> f32 {
        let len = self.buffer.len();
        let delay = delay.min(self.max_delay());
        self.buffer[(self.write_pos + len - delay) % len]
    }

    /// Linearly interpolated read at a fractional delay.
    #[inline]
    pub fn read_fractional(&self, delay: f32) -> f32 {
        let delay = delay.clamp(0.0, self.max_delay() as f32 - 1.0);
        let whole = delay as usize;
        let frac = delay - whole as f32;
        let a = self.read(whole);
        let b = self.read(whole + 1);
        a + (b - a) * frac
    }

    pub fn render(&mut self, buffer: &mut [f32], delay_samples: usize) {
        for sample in buffer.iter_mut() {
            *sample = self.next_sample(*sample, delay_samples);
        }
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_delay() {
        let mut line = DelayLine::new(8);
        let mut buf = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        line.render(&mut buf, 3);
        assert_eq!(buf, [0.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_zero_delay_is_passthrough() {
        let mut line = DelayLine::new(4);
        assert_eq!(line.next_sample(0.25, 0), 0.25);
    }

    #[test]
    fn test_fractional_read_interpolates() {
        let mut line = DelayLine::new(8);
        line.write(1.0);
        line.write(0.0);
        // 1.0 is one write back, 0.0 is the latest.
        assert!((line.read_fractional(0.5) - 0.5).abs() < 1e-6);
        assert!((line.read_fractional(1.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_delay_is_clamped_to_capacity() {
        let mut line = DelayLine::new(4);
        for i in 0..10 {
            line.write(i as f32);
        }
        assert_eq!(line.read(100), line.read(4));
    }
}
