//! Logging setup.
//!
//! roomtone logs through `tracing`. Applications that already install their
//! own subscriber get the events for free; everyone else can ask the library
//! to install a stderr subscriber whose level can be changed at runtime.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, Registry};

use crate::error::{Error, Result};

/// Where log output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingBackend {
    Stderr,
}

/// Verbosity, from least to most chatty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
}

impl LogLevel {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Error,
            1 => LogLevel::Warn,
            2 => LogLevel::Info,
            _ => LogLevel::Debug,
        }
    }

    fn filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
        }
    }
}

static LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Error as u8);
static HANDLE: OnceLock<reload::Handle<LevelFilter, Registry>> = OnceLock::new();

/// Install a subscriber for `backend`. May only succeed once per process.
pub fn configure_logging_backend(backend: LoggingBackend) -> Result<()> {
    if HANDLE.get().is_some() {
        return Err(Error::LoggingAlreadyConfigured);
    }

    let (filter, handle) = reload::Layer::new(log_level().filter());
    match backend {
        LoggingBackend::Stderr => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .try_init()
            .map_err(|e| Error::LoggingBackend(e.to_string()))?,
    }

    HANDLE
        .set(handle)
        .map_err(|_| Error::LoggingAlreadyConfigured)?;
    tracing::debug!(?backend, level = ?log_level(), "logging configured");
    Ok(())
}

/// Change the level. Takes effect immediately if a backend is installed,
/// otherwise when one is.
pub fn set_log_level(level: LogLevel) {
    LEVEL.store(level as u8, Ordering::Relaxed);
    if let Some(handle) = HANDLE.get() {
        // Only fails if the subscriber is gone, in which case nothing logs anyway.
        let _ = handle.modify(|f| *f = level.filter());
    }
}

/// The current level.
pub fn log_level() -> LogLevel {
    LogLevel::from_u8(LEVEL.load(Ordering::Relaxed))
}
