//! Audio decoders.
//!
//! Decoders turn a [`StreamHandle`] into interleaved `f32` frames at the
//! file's own sample rate. Conversion to the engine rate happens above.

use hound::{SampleFormat, WavReader};

use super::stream::{ReadSeek, StreamHandle};
use crate::error::{Error, Result};
use crate::MAX_CHANNELS;

pub trait AudioDecoder: Send {
    fn channels(&self) -> usize;

    fn sample_rate(&self) -> u32;

    /// Total length, if the container knows it.
    fn length_in_frames(&self) -> Option<u64>;

    /// Fill `out` with interleaved frames; returns frames written. Zero means
    /// the end of the stream.
    fn read_frames(&mut self, out: &mut [f32]) -> Result<usize>;

    fn supports_seek(&self) -> bool;

    fn seek_seconds(&mut self, position: f64) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
enum SampleKind {
    Float,
    Int { scale: f32 },
}

/// RIFF WAVE, integer (8 to 32 bit) or 32-bit float PCM.
pub struct WavDecoder {
    reader: WavReader<Box<dyn ReadSeek>>,
    kind: SampleKind,
    channels: usize,
    sample_rate: u32,
}

impl WavDecoder {
    pub fn new(stream: StreamHandle) -> Result<Self> {
        let reader = WavReader::new(stream.into_reader())?;
        let spec = reader.spec();
        let channels = spec.channels as usize;
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(Error::InvalidChannels(channels));
        }
        let kind = match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Float, 32) => SampleKind::Float,
            (SampleFormat::Int, bits @ 1..=32) => SampleKind::Int {
                scale: 1.0 / (1u64 << (bits - 1)) as f32,
            },
            (format, bits) => {
                return Err(Error::UnsupportedFormat(format!(
                    "{bits}-bit {format:?} wav"
                )))
            }
        };
        tracing::debug!(
            channels,
            sample_rate = spec.sample_rate,
            bits = spec.bits_per_sample,
            frames = reader.duration(),
            "opened wav decoder"
        );
        Ok(Self {
            reader,
            kind,
            channels,
            sample_rate: spec.sample_rate,
        })
    }
}

impl AudioDecoder for WavDecoder {
    fn channels(&self) -> usize {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn length_in_frames(&self) -> Option<u64> {
        Some(self.reader.duration() as u64)
    }

    fn read_frames(&mut self, out: &mut [f32]) -> Result<usize> {
        let want = out.len() / self.channels * self.channels;
        let mut written = 0;
        match self.kind {
            SampleKind::Float => {
                for sample in self.reader.samples::<f32>().take(want) {
                    out[written] = sample?;
                    written += 1;
                }
            }
            SampleKind::Int { scale } => {
                for sample in self.reader.samples::<i32>().take(want) {
                    out[written] = sample? as f32 * scale;
                    written += 1;
                }
            }
        }
        Ok(written / self.channels)
    }

    fn supports_seek(&self) -> bool {
        true
    }

    fn seek_seconds(&mut self, position: f64) -> Result<()> {
        let frame = (position.max(0.0) * self.sample_rate as f64) as u64;
        let frame = frame.min(self.reader.duration() as u64) as u32;
        self.reader.seek(frame)?;
        Ok(())
    }
}

/// Pick a decoder for `stream`.
pub fn open_decoder(stream: StreamHandle) -> Result<Box<dyn AudioDecoder>> {
    Ok(Box::new(WavDecoder::new(stream)?))
}

/// Decode everything left in `decoder`.
pub fn decode_all(decoder: &mut dyn AudioDecoder) -> Result<Vec<f32>> {
    let channels = decoder.channels();
    let mut samples = match decoder.length_in_frames() {
        Some(frames) => Vec::with_capacity(frames as usize * channels),
        None => Vec::new(),
    };
    let mut chunk = vec![0.0f32; 4096 * channels];
    loop {
        let frames = decoder.read_frames(&mut chunk)?;
        if frames == 0 {
            break;
        }
        samples.extend_from_slice(&chunk[..frames * channels]);
    }
    Ok(samples)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    /// Encode `frames` (interleaved) as a 16-bit wav in memory.
    pub(crate) fn wav_bytes(channels: u16, sample_rate: u32, samples: &[f32]) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    fn decoder_for(bytes: Vec<u8>) -> Box<dyn AudioDecoder> {
        open_decoder(StreamHandle::from_reader(Cursor::new(bytes))).unwrap()
    }

    #[test]
    fn test_decodes_stereo_16_bit() {
        let samples = [0.5, -0.5, 0.25, -0.25];
        let mut dec = decoder_for(wav_bytes(2, 22_050, &samples));
        assert_eq!(dec.channels(), 2);
        assert_eq!(dec.sample_rate(), 22_050);
        assert_eq!(dec.length_in_frames(), Some(2));
        let all = decode_all(dec.as_mut()).unwrap();
        assert_eq!(all.len(), 4);
        for (a, b) in all.iter().zip(samples.iter()) {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[test]
    fn test_seek_then_read() {
        let samples: Vec<f32> = (0..100).map(|i| i as f32 / 100.0).collect();
        let mut dec = decoder_for(wav_bytes(1, 100, &samples));
        dec.seek_seconds(0.5).unwrap();
        let mut out = [0.0; 1];
        assert_eq!(dec.read_frames(&mut out).unwrap(), 1);
        assert!((out[0] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_rejects_garbage() {
        let result = open_decoder(StreamHandle::from_reader(Cursor::new(vec![1u8, 2, 3, 4])));
        assert!(matches!(result, Err(Error::Decode(_))));
    }

    #[test]
    fn test_read_past_end_returns_zero() {
        let mut dec = decoder_for(wav_bytes(1, 100, &[0.1, 0.2]));
        let mut out = [0.0; 8];
        assert_eq!(dec.read_frames(&mut out).unwrap(), 2);
        assert_eq!(dec.read_frames(&mut out).unwrap(), 0);
    }
}
