//! Build a buffer through an explicit stream handle, plus a custom protocol
//! that serves files from a fixed directory.
//!
//! Run with: cargo run --example stream_handle -- <path>

use std::io::BufRead;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{eyre, Result};
use roomtone::{
    Buffer, BufferGenerator, Context, DirectSource, LogLevel, LoggingBackend, StreamHandle,
};

fn main() -> Result<()> {
    color_eyre::install()?;
    let path = PathBuf::from(
        std::env::args()
            .nth(1)
            .ok_or_else(|| eyre!("usage: stream_handle <path>"))?,
    );

    roomtone::configure_logging_backend(LoggingBackend::Stderr)?;
    roomtone::set_log_level(LogLevel::Debug);
    let _guard = roomtone::initialize()?;

    // "assets:name.wav" resolves against the file's directory.
    let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
    roomtone::register_stream_protocol("assets", move |name, _options| {
        StreamHandle::from_file(root.join(name))
    })?;

    let ctx = Context::new()?;
    let generator = BufferGenerator::new(&ctx)?;
    let source = DirectSource::new(&ctx)?;
    source.add_generator(&generator)?;

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| eyre!("path has no file name"))?;
    let stream = StreamHandle::from_stream_params("assets", name, None)?;
    println!("opened {}", stream.description());
    let buffer = Buffer::from_stream_handle(stream)?;
    generator.set_buffer(Some(&buffer));
    generator.set_looping(true);

    println!("Press enter to quit...");
    std::io::stdin().lock().read_line(&mut String::new())?;
    Ok(())
}
