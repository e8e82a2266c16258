//! roomtone - play an audio file from a 3D source through an FDN reverb
//!
//! Run with: cargo run -- path/to/file.wav

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use color_eyre::eyre::{Result, WrapErr};
use roomtone::{
    Buffer, BufferGenerator, Context, GlobalFdnReverb, LogLevel, LoggingBackend, RouteConfig,
    Source3D,
};

#[derive(Debug, Parser)]
#[command(name = "roomtone", version, about)]
struct Args {
    /// Audio file to play
    path: PathBuf,

    /// Seconds to play before exiting
    #[arg(long, default_value_t = 5.0)]
    duration: f64,

    #[arg(long, value_enum, default_value_t = Level::Debug)]
    log_level: Level,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Level {
    Error,
    Warn,
    Info,
    Debug,
}

impl From<Level> for LogLevel {
    fn from(level: Level) -> Self {
        match level {
            Level::Error => LogLevel::Error,
            Level::Warn => LogLevel::Warn,
            Level::Info => LogLevel::Info,
            Level::Debug => LogLevel::Debug,
        }
    }
}

impl Args {
    fn play_time(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.duration)
            .wrap_err("duration must be a non-negative number of seconds within range")
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    let play_time = args.play_time()?;

    roomtone::configure_logging_backend(LoggingBackend::Stderr)?;
    roomtone::set_log_level(args.log_level.into());

    let _guard = roomtone::initialize()?;
    let ctx = Context::new().wrap_err("failed to open the audio device")?;

    let generator = BufferGenerator::new(&ctx)?;
    let path = args.path.to_string_lossy();
    let buffer = Buffer::from_stream_params("file", &path, None)
        .wrap_err_with(|| format!("failed to load {path}"))?;
    generator.set_buffer(Some(&buffer));

    let source = Source3D::new(&ctx)?;
    source.add_generator(&generator)?;

    let reverb = GlobalFdnReverb::new(&ctx)?;
    ctx.config_route(&source, &reverb, RouteConfig::default())
        .wrap_err("failed to route the source to the reverb")?;

    std::thread::sleep(play_time);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn play_time(duration: &str) -> Result<Duration> {
        Args::try_parse_from(["roomtone", "song.wav", "--duration", duration])?.play_time()
    }

    #[test]
    fn test_play_time_rejects_unrepresentable_durations() {
        assert_eq!(play_time("2.5").unwrap(), Duration::from_millis(2500));
        assert!(play_time("1e20").is_err());
        assert!(play_time("-1").is_err());
        assert!(play_time("inf").is_err());
        assert!(play_time("NaN").is_err());
    }
}
