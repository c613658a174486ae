//! Error types for the tune/filter/decimate stage.
//!
//! Nothing in here is fatal to the streaming engine: the engine turns every
//! reconfiguration error into a log event and a skipped block. Only the CLI
//! I/O paths propagate these with `?`.

use thiserror::Error;

use crate::input::{CHAN_RF, COL_RF};

/// A specialized Result type for stage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring or feeding the stage.
#[derive(Debug, Error)]
pub enum Error {
    /// RF tuning was requested but the stream metadata carries no RF keyword.
    #[error(
        "RF tuning requires a {col} or {chan} keyword in the stream metadata",
        col = COL_RF,
        chan = CHAN_RF
    )]
    MissingRfKeyword,

    /// The stream metadata declared a sample interval that yields no usable rate.
    #[error("invalid sample interval {0} s")]
    InvalidSampleInterval(f64),

    /// The requested filter cannot be designed.
    #[error("invalid filter specification: {0}")]
    InvalidFilterSpec(String),

    /// Malformed input data or command-line value.
    #[error("format error: {0}")]
    Format(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Wav(#[from] hound::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a filter specification error with a custom message
    pub fn filter_spec<S: Into<String>>(msg: S) -> Self {
        Error::InvalidFilterSpec(msg.into())
    }

    /// Create a format error with a custom message
    pub fn format<S: Into<String>>(msg: S) -> Self {
        Error::Format(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_rf_message_names_keywords() {
        let msg = Error::MissingRfKeyword.to_string();
        assert!(msg.contains("COL_RF"));
        assert!(msg.contains("CHAN_RF"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_filter_spec_constructor() {
        let err = Error::filter_spec("ripple out of range");
        assert_eq!(
            err.to_string(),
            "invalid filter specification: ripple out of range"
        );
    }
}
