//! A looping file through a global echo with a spread of stereo taps.
//!
//! Run with: cargo run --example echo -- <path>

use std::time::Duration;

use color_eyre::eyre::{eyre, Result};
use roomtone::{
    Buffer, BufferGenerator, Context, EchoTap, GlobalEcho, LogLevel, LoggingBackend, RouteConfig,
    Source3D,
};

fn main() -> Result<()> {
    color_eyre::install()?;
    let path = std::env::args()
        .nth(1)
        .ok_or_else(|| eyre!("usage: echo <path>"))?;

    roomtone::configure_logging_backend(LoggingBackend::Stderr)?;
    roomtone::set_log_level(LogLevel::Info);
    let _guard = roomtone::initialize()?;

    let ctx = Context::new()?;
    let generator = BufferGenerator::new(&ctx)?;
    generator.set_buffer(Some(&Buffer::from_stream_params("file", &path, None)?));
    generator.set_looping(true);
    let source = Source3D::new(&ctx)?;
    source.add_generator(&generator)?;

    let echo = GlobalEcho::new(&ctx)?;
    let taps: Vec<EchoTap> = (1..=8)
        .map(|i| {
            let gain = 0.8f64.powi(i);
            let (l, r) = if i % 2 == 0 { (gain, 0.2 * gain) } else { (0.2 * gain, gain) };
            EchoTap::new(0.15 * i as f64, l, r)
        })
        .collect();
    echo.set_taps(&taps)?;
    ctx.config_route(&source, &echo, RouteConfig::default())?;

    // Walk the source slowly from left to right.
    for step in 0..=50 {
        source.set_position([-5.0 + step as f64 * 0.2, 1.0, 0.0])?;
        std::thread::sleep(Duration::from_millis(200));
    }

    echo.set_taps(&[])?;
    std::thread::sleep(Duration::from_secs(1));
    Ok(())
}
