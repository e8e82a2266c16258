use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, StreamConfig, SupportedStreamConfig};

use super::writer::DeviceWriter;
use crate::engine::Mixer;
use crate::error::{Error, Result};
use crate::{OUTPUT_CHANNELS, SR};

/// A running device stream fed by a mixer. Stops when dropped.
pub(crate) struct AudioOutput {
    stop: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl AudioOutput {
    /// Open the default output device and start pulling from `mixer`.
    /// Returns once the stream is playing or has failed to open.
    pub(crate) fn start(mixer: Arc<Mutex<Mixer>>) -> Result<Self> {
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<()>>(1);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread = thread::Builder::new()
            .name("roomtone-audio".into())
            .spawn(move || {
                let stream = match open_stream(mixer) {
                    Ok(stream) => stream,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                // Returns on an explicit stop or when the sender is dropped.
                let _ = stop_rx.recv();
                drop(stream);
                tracing::debug!("output stream closed");
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                stop: Some(stop_tx),
                thread: Some(thread),
            }),
            Ok(Err(err)) => {
                let _ = thread.join();
                Err(err)
            }
            Err(_) => {
                let _ = thread.join();
                Err(Error::AudioThread)
            }
        }
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("audio thread panicked");
            }
        }
    }
}

fn open_stream(mixer: Arc<Mutex<Mixer>>) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(Error::NoOutputDevice)?;
    let name = device.name().unwrap_or_else(|_| "<unnamed>".into());

    let supported = choose_config(&device)?;
    let format = supported.sample_format();
    let config: StreamConfig = supported.into();
    tracing::info!(
        device = %name,
        sample_rate = config.sample_rate.0,
        channels = config.channels,
        ?format,
        "opening output device"
    );

    let stream = match format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, mixer)?,
        SampleFormat::I16 => build_stream::<i16>(&device, &config, mixer)?,
        SampleFormat::U16 => build_stream::<u16>(&device, &config, mixer)?,
        other => return Err(Error::Device(format!("unsupported sample format {other:?}"))),
    };
    stream.play()?;
    Ok(stream)
}

fn usable(format: SampleFormat) -> bool {
    matches!(format, SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16)
}

/// Prefer a config that runs at the engine rate, stereo and float if on
/// offer. Otherwise take the device default and resample.
fn choose_config(device: &cpal::Device) -> Result<SupportedStreamConfig> {
    let rate = cpal::SampleRate(SR);
    let best = device
        .supported_output_configs()?
        .filter(|range| usable(range.sample_format()))
        .filter(|range| range.min_sample_rate() <= rate && rate <= range.max_sample_rate())
        .min_by_key(|range| {
            (
                range.channels() as usize != OUTPUT_CHANNELS,
                range.sample_format() != SampleFormat::F32,
            )
        });
    match best {
        Some(range) => Ok(range.with_sample_rate(rate)),
        None => {
            let config = device.default_output_config()?;
            tracing::warn!(
                device_rate = config.sample_rate().0,
                engine_rate = SR,
                "device cannot run at the engine rate; resampling"
            );
            Ok(config)
        }
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mixer: Arc<Mutex<Mixer>>,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let mut writer = DeviceWriter::new(config.channels as usize, config.sample_rate.0);
    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let mut mixer = mixer.lock().unwrap_or_else(PoisonError::into_inner);
            writer.fill(data, |block| mixer.render_block(block));
        },
        |err| tracing::error!(%err, "output stream error"),
        None,
    )?;
    Ok(stream)
}
