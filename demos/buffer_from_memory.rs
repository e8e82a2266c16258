//! Decode a buffer from encoded bytes already in memory.
//!
//! Run with: cargo run --example buffer_from_memory -- <path>

use std::io::BufRead;

use color_eyre::eyre::{eyre, Result, WrapErr};
use roomtone::{Buffer, BufferGenerator, Context, DirectSource, LogLevel, LoggingBackend};

fn main() -> Result<()> {
    color_eyre::install()?;
    let path = std::env::args()
        .nth(1)
        .ok_or_else(|| eyre!("usage: buffer_from_memory <path>"))?;

    roomtone::configure_logging_backend(LoggingBackend::Stderr)?;
    roomtone::set_log_level(LogLevel::Debug);
    let _guard = roomtone::initialize()?;

    let ctx = Context::new()?;
    let generator = BufferGenerator::new(&ctx)?;
    let source = DirectSource::new(&ctx)?;
    source.add_generator(&generator)?;

    let data = std::fs::read(&path).wrap_err_with(|| format!("unable to read {path}"))?;
    let buffer = Buffer::from_encoded_data(&data)?;
    println!(
        "{} channels, {:.2}s",
        buffer.channels(),
        buffer.length_in_seconds()
    );
    generator.set_buffer(Some(&buffer));

    println!("Press enter to quit...");
    std::io::stdin().lock().read_line(&mut String::new())?;
    Ok(())
}
