//! Decoded, immutable audio held in memory.

use std::io::Cursor;
use std::sync::Arc;

use crate::dsp::resample::resample_interleaved;
use crate::error::{Error, Result};
use crate::io::{decode_all, open_decoder, StreamHandle};
use crate::{MAX_CHANNELS, SR};

/// Interleaved samples at [`SR`].
#[derive(Debug)]
pub(crate) struct BufferData {
    pub(crate) samples: Vec<f32>,
    pub(crate) channels: usize,
}

impl BufferData {
    pub(crate) fn frames(&self) -> usize {
        self.samples.len() / self.channels
    }
}

/// Audio decoded up front and converted to the engine rate.
///
/// Buffers are cheap to clone and may be shared by any number of generators,
/// in any number of contexts.
#[derive(Debug, Clone)]
pub struct Buffer {
    data: Arc<BufferData>,
}

impl Buffer {
    pub fn from_stream_params(protocol: &str, path: &str, options: Option<&str>) -> Result<Self> {
        Self::from_stream_handle(StreamHandle::from_stream_params(protocol, path, options)?)
    }

    pub fn from_stream_handle(stream: StreamHandle) -> Result<Self> {
        let description = stream.description().to_string();
        let mut decoder = open_decoder(stream)?;
        let sample_rate = decoder.sample_rate();
        let channels = decoder.channels();
        let samples = decode_all(decoder.as_mut())?;
        let buffer = Self::from_interleaved(sample_rate, channels, samples)?;
        tracing::debug!(
            source = %description,
            channels,
            frames = buffer.length_in_samples(),
            "decoded buffer"
        );
        Ok(buffer)
    }

    /// Decode an encoded file (e.g. the bytes of a `.wav`) held in memory.
    pub fn from_encoded_data(data: &[u8]) -> Result<Self> {
        Self::from_stream_handle(StreamHandle::from_reader(Cursor::new(data.to_vec())))
    }

    /// Wrap interleaved `f32` samples at `sample_rate`.
    pub fn from_float_array(sample_rate: u32, channels: usize, data: &[f32]) -> Result<Self> {
        Self::from_interleaved(sample_rate, channels, data.to_vec())
    }

    fn from_interleaved(sample_rate: u32, channels: usize, mut samples: Vec<f32>) -> Result<Self> {
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(Error::InvalidChannels(channels));
        }
        if sample_rate == 0 {
            return Err(Error::InvalidProperty {
                property: "sample_rate",
                reason: "must be positive",
            });
        }
        let frames = samples.len() / channels;
        if frames == 0 {
            return Err(Error::EmptyBuffer);
        }
        samples.truncate(frames * channels);
        if sample_rate != SR {
            samples = resample_interleaved(&samples, channels, sample_rate, SR);
            if samples.is_empty() {
                return Err(Error::EmptyBuffer);
            }
        }
        Ok(Self {
            data: Arc::new(BufferData { samples, channels }),
        })
    }

    pub fn channels(&self) -> usize {
        self.data.channels
    }

    /// Length in frames at [`SR`].
    pub fn length_in_samples(&self) -> usize {
        self.data.frames()
    }

    pub fn length_in_seconds(&self) -> f64 {
        self.data.frames() as f64 / SR as f64
    }

    pub(crate) fn data(&self) -> &Arc<BufferData> {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::decoder::tests::wav_bytes;

    #[test]
    fn test_float_array_at_engine_rate() {
        let buffer = Buffer::from_float_array(SR, 2, &[0.1, 0.2, 0.3, 0.4, 0.5]).unwrap();
        assert_eq!(buffer.channels(), 2);
        // The dangling sample is dropped.
        assert_eq!(buffer.length_in_samples(), 2);
    }

    #[test]
    fn test_resamples_to_engine_rate() {
        let data = vec![0.0; 22_050];
        let buffer = Buffer::from_float_array(22_050, 1, &data).unwrap();
        assert_eq!(buffer.length_in_samples(), SR as usize);
        assert!((buffer.length_in_seconds() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_bad_shapes() {
        assert!(matches!(
            Buffer::from_float_array(SR, 0, &[0.0]),
            Err(Error::InvalidChannels(0))
        ));
        assert!(matches!(
            Buffer::from_float_array(SR, 2, &[0.0]),
            Err(Error::EmptyBuffer)
        ));
        assert!(Buffer::from_float_array(0, 1, &[0.0]).is_err());
    }

    #[test]
    fn test_from_encoded_wav() {
        let samples: Vec<f32> = (0..441).map(|i| (i as f32 * 0.01).sin() * 0.5).collect();
        let buffer = Buffer::from_encoded_data(&wav_bytes(1, SR, &samples)).unwrap();
        assert_eq!(buffer.channels(), 1);
        assert_eq!(buffer.length_in_samples(), 441);
        let data = buffer.data();
        assert!((data.samples[100] - samples[100]).abs() < 1e-3);
    }
}
