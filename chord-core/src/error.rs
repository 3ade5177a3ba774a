//! Error types for the chord recognition core
//!
//! Error strategy:
//! - Setup errors (config, device, format): fatal, returned from `start()`
//!   before any frame is processed
//! - Mid-stream acquisition errors: recoverable, the analysis loop ends
//!   gracefully and keeps the progression collected so far

use thiserror::Error;

/// Top-level error type for chord recognition
#[derive(Debug, Error)]
pub enum ChordError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No audio input device available")]
    NoInputDevice,

    #[error("Unsupported stream format: {0}")]
    UnsupportedFormat(String),

    #[error("Audio device error: {0}")]
    Device(String),

    #[error("Audio stream failed: {0}")]
    Stream(String),

    #[error("Analysis is already running")]
    AlreadyRunning,

    #[error("Cannot parse chord symbol '{0}'")]
    ParseChord(String),
}

/// Result type alias for chord recognition operations
pub type Result<T> = std::result::Result<T, ChordError>;

impl ChordError {
    /// Returns true if the analysis loop should wind down instead of failing
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ChordError::Stream(_))
    }

    /// Wrap any displayable device-layer error
    pub fn device(err: impl std::fmt::Display) -> Self {
        ChordError::Device(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_stream_errors_are_recoverable() {
        assert!(ChordError::Stream("overrun".into()).is_recoverable());
        assert!(!ChordError::NoInputDevice.is_recoverable());
        assert!(!ChordError::UnsupportedFormat("48000 Hz".into()).is_recoverable());
        assert!(!ChordError::AlreadyRunning.is_recoverable());
    }

    #[test]
    fn messages_carry_context() {
        let err = ChordError::InvalidConfig("frame_size must be a power of two".into());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: frame_size must be a power of two"
        );
    }
}
