//! Error type shared by every fallible operation in the crate.

use thiserror::Error;

/// Errors reported by roomtone.
#[derive(Debug, Error)]
pub enum Error {
    #[error("library is not initialized; call roomtone::initialize() first")]
    NotInitialized,

    #[error("logging backend was already configured")]
    LoggingAlreadyConfigured,

    #[error("failed to install logging backend: {0}")]
    LoggingBackend(String),

    #[error("property {property} out of range: {value} not in [{min}, {max}]")]
    PropertyOutOfRange {
        property: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("invalid value for {property}: {reason}")]
    InvalidProperty {
        property: &'static str,
        reason: &'static str,
    },

    #[error("objects belong to different contexts")]
    ContextMismatch,

    #[error("unknown stream protocol: {0}")]
    UnknownProtocol(String),

    #[error("stream protocol already registered: {0}")]
    ProtocolExists(String),

    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("audio data contains no frames")]
    EmptyBuffer,

    #[error("channel count {0} not in 1..={max}", max = crate::MAX_CHANNELS)]
    InvalidChannels(usize),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("decode error: {0}")]
    Decode(#[from] hound::Error),

    #[error("context is playing to an audio device; only headless contexts can be pulled")]
    NotHeadless,

    #[error("output holds {0} samples; expected {expected}", expected = crate::BLOCK_SIZE * crate::OUTPUT_CHANNELS)]
    BlockLength(usize),

    #[error("no output device available")]
    NoOutputDevice,

    #[error("audio device error: {0}")]
    Device(String),

    #[error("audio thread terminated unexpectedly")]
    AudioThread,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

macro_rules! device_error {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Error {
                fn from(err: $ty) -> Self {
                    Error::Device(err.to_string())
                }
            }
        )*
    };
}

device_error!(
    cpal::DevicesError,
    cpal::DeviceNameError,
    cpal::DefaultStreamConfigError,
    cpal::SupportedStreamConfigsError,
    cpal::BuildStreamError,
    cpal::PlayStreamError,
);

/// Check that `value` is finite and lies within `[min, max]`.
pub(crate) fn check_range(property: &'static str, value: f64, min: f64, max: f64) -> Result<()> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(Error::PropertyOutOfRange {
            property,
            value,
            min,
            max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_range_accepts_bounds() {
        assert!(check_range("gain", 0.0, 0.0, 1.0).is_ok());
        assert!(check_range("gain", 1.0, 0.0, 1.0).is_ok());
    }

    #[test]
    fn test_check_range_rejects_nan_and_outside() {
        assert!(check_range("gain", f64::NAN, 0.0, 1.0).is_err());
        assert!(check_range("gain", f64::INFINITY, 0.0, f64::MAX).is_err());
        match check_range("t60", 101.0, 0.0, 100.0) {
            Err(Error::PropertyOutOfRange { property, .. }) => assert_eq!(property, "t60"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
