//! Adapter error types
//!
//! Every failure inside an adapter is one of these. They are logged where
//! they happen and collapse to `Status::Error` at the adapter boundary; only
//! `connect` and `cleanup` hand them to the caller.

use crate::config::ConfigError;
use crate::transport::TransportError;
use thiserror::Error;

/// Errors that can occur while initialising or driving an adapter
#[derive(Error, Debug)]
pub enum AdapterError {
    /// Required configuration missing or invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Transport-level failure (after retries, if any)
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The operation's arguments cannot be expressed on the wire
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Request body serialization failed
    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// The backend refused initialisation (e.g. database creation)
    #[error("Initialization failed: {0}")]
    Init(String),
}

/// Result type alias for adapter operations
pub type AdapterResult<T> = Result<T, AdapterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AdapterError::InvalidInput("empty metric name".to_string());
        assert_eq!(err.to_string(), "Invalid input: empty metric name");

        let err: AdapterError = ConfigError::MissingOption("ip").into();
        assert_eq!(
            err.to_string(),
            "Configuration error: Missing required option 'ip'"
        );
    }

    #[test]
    fn test_transport_error_conversion() {
        let err: AdapterError = TransportError::Closed.into();
        assert!(matches!(err, AdapterError::Transport(TransportError::Closed)));
    }
}
