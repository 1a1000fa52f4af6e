//! Error types for IDVKit.

use std::time::Duration;

/// Main error type for IDVKit.
///
/// Only caller-facing failures live here. Transient failures of a single
/// status check are [`CheckError`]s and never escape the poller.
#[derive(thiserror::Error, Debug)]
pub enum IdvError {
    /// Subject identifier was empty or otherwise unusable.
    #[error("Invalid subject id: {0:?}")]
    InvalidSubject(String),

    /// Polling was requested outside of a Tokio runtime.
    #[error("No Tokio runtime available to schedule polling")]
    NoRuntime,

    /// Configuration value out of range.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file could not be parsed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Failure of one status check.
///
/// Every variant is treated as transient: the poller retries on its normal
/// schedule and the error only ever shows up in logs, metrics and the audit
/// trail.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckError {
    /// The request never produced a response (network, DNS, TLS, ...).
    #[error("Transport error: {0}")]
    Transport(String),

    /// A response arrived but could not be decoded.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// The provider reported a status outside the known set.
    #[error("Unrecognized verification status: {0:?}")]
    UnrecognizedStatus(String),

    /// The check itself exceeded its own deadline.
    #[error("Status check timed out after {0:?}")]
    Timeout(Duration),
}

/// Type alias for Result with IdvError.
pub type Result<T> = std::result::Result<T, IdvError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = IdvError::InvalidSubject("".to_string());
        assert_eq!(err.to_string(), "Invalid subject id: \"\"");

        let err = CheckError::UnrecognizedStatus("PENDING".to_string());
        assert_eq!(err.to_string(), "Unrecognized verification status: \"PENDING\"");
    }

    #[test]
    fn test_yaml_error_converts() {
        let parse: std::result::Result<u32, _> = serde_yaml::from_str("[not a number");
        let err: IdvError = parse.unwrap_err().into();
        assert!(matches!(err, IdvError::Yaml(_)));
    }
}
