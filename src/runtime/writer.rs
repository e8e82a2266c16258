use cpal::{FromSample, Sample};

use crate::dsp::resample::LinearResampler;
use crate::engine::BLOCK_SAMPLES;
use crate::{OUTPUT_CHANNELS, SR};

/// Hands out mixer frames one at a time, rendering a new block when the
/// current one runs out.
struct BlockCursor {
    block: Vec<f32>,
    frame: usize,
}

impl BlockCursor {
    fn new() -> Self {
        Self {
            block: vec![0.0; BLOCK_SAMPLES],
            frame: BLOCK_SAMPLES / OUTPUT_CHANNELS,
        }
    }

    fn next<F: FnMut(&mut [f32])>(&mut self, render: &mut F) -> [f32; 2] {
        if self.frame * OUTPUT_CHANNELS >= self.block.len() {
            render(&mut self.block);
            self.frame = 0;
        }
        let i = self.frame * OUTPUT_CHANNELS;
        self.frame += 1;
        [self.block[i], self.block[i + 1]]
    }
}

/// Adapts the mixer's stereo blocks at [`SR`] to whatever the device wants.
pub(crate) struct DeviceWriter {
    channels: usize,
    cursor: BlockCursor,
    resampler: Option<LinearResampler>,
}

impl DeviceWriter {
    pub(crate) fn new(channels: usize, device_rate: u32) -> Self {
        let resampler = (device_rate != SR)
            .then(|| LinearResampler::new(OUTPUT_CHANNELS, SR, device_rate));
        Self {
            channels: channels.max(1),
            cursor: BlockCursor::new(),
            resampler,
        }
    }

    /// Fill an interleaved device buffer. Mono devices get the average of
    /// both sides; channels past the second are silent.
    pub(crate) fn fill<T, F>(&mut self, data: &mut [T], mut render: F)
    where
        T: Sample + FromSample<f32>,
        F: FnMut(&mut [f32]),
    {
        let Self {
            channels,
            cursor,
            resampler,
        } = self;
        for out in data.chunks_mut(*channels) {
            let [l, r] = match resampler {
                None => cursor.next(&mut render),
                Some(resampler) => {
                    let mut frame = [0.0; 2];
                    // The mixer never runs dry.
                    resampler.next_frame(&mut frame, |f| {
                        f.copy_from_slice(&cursor.next(&mut render));
                        true
                    });
                    frame
                }
            };
            match out {
                [mono] => *mono = T::from_sample((l + r) * 0.5),
                [left, right, rest @ ..] => {
                    *left = T::from_sample(l);
                    *right = T::from_sample(r);
                    for s in rest {
                        *s = T::from_sample(0.0f32);
                    }
                }
                [] => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BLOCK_SIZE;

    /// Left carries the frame index, right its negation.
    fn ramp() -> impl FnMut(&mut [f32]) {
        let mut n = 0.0f32;
        move |block: &mut [f32]| {
            for frame in block.chunks_exact_mut(2) {
                frame[0] = n;
                frame[1] = -n;
                n += 1.0;
            }
        }
    }

    #[test]
    fn test_stereo_passthrough_across_blocks() {
        let mut writer = DeviceWriter::new(2, SR);
        let mut data = vec![0.0f32; (BLOCK_SIZE + 10) * 2];
        writer.fill(&mut data, ramp());
        assert_eq!(&data[..4], &[0.0, -0.0, 1.0, -1.0]);
        let last = BLOCK_SIZE + 9;
        assert_eq!(data[last * 2], last as f32);
    }

    #[test]
    fn test_mono_device_gets_average() {
        let mut writer = DeviceWriter::new(1, SR);
        let mut data = vec![1.0f32; 8];
        writer.fill(&mut data, |block: &mut [f32]| {
            for frame in block.chunks_exact_mut(2) {
                frame[0] = 0.5;
                frame[1] = 0.1;
            }
        });
        assert!(data.iter().all(|&s| (s - 0.3).abs() < 1e-6));
    }

    #[test]
    fn test_extra_channels_are_silent_and_format_converts() {
        let mut writer = DeviceWriter::new(4, SR);
        let mut data = vec![7i16; 16];
        writer.fill(&mut data, |block: &mut [f32]| block.fill(0.5));
        for frame in data.chunks_exact(4) {
            assert!(frame[0] > 16_000);
            assert_eq!(frame[2], 0);
            assert_eq!(frame[3], 0);
        }
    }

    #[test]
    fn test_resamples_to_device_rate() {
        let mut writer = DeviceWriter::new(2, SR * 2);
        let mut rendered = 0;
        let mut data = vec![0.0f32; BLOCK_SIZE * 4 * 2];
        writer.fill(&mut data, |block: &mut [f32]| {
            rendered += 1;
            block.fill(0.25);
        });
        // Twice the frames out of roughly half as many mixer blocks.
        assert!((2..=3).contains(&rendered));
        assert!(data[100..].iter().all(|&s| (s - 0.25).abs() < 1e-6));
    }
}
