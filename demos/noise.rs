//! Noise through a panned source, cycling through every noise type.
//!
//! Run with: cargo run --example noise

use std::time::Duration;

use color_eyre::eyre::Result;
use roomtone::{Context, LogLevel, LoggingBackend, NoiseGenerator, NoiseType, PannedSource};

fn main() -> Result<()> {
    color_eyre::install()?;
    roomtone::configure_logging_backend(LoggingBackend::Stderr)?;
    roomtone::set_log_level(LogLevel::Debug);
    let _guard = roomtone::initialize()?;

    let ctx = Context::new()?;
    let noise = NoiseGenerator::new(&ctx, 1)?;
    noise.set_gain(0.3)?;
    let source = PannedSource::new(&ctx)?;
    source.add_generator(&noise)?;

    for noise_type in NoiseType::ALL {
        println!("{noise_type:?}");
        noise.set_noise_type(noise_type);
        // Sweep once around the listener per noise type.
        for step in 0..=36 {
            source.set_azimuth(step as f64 * 10.0)?;
            std::thread::sleep(Duration::from_millis(80));
        }
    }
    Ok(())
}
