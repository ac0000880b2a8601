//! Transport
//!
//! Executes encoded requests and hands back raw replies or a definitive
//! failure:
//!
//! - **RetryPolicy**: bounded retry of transient I/O failures, no backoff
//! - **HttpTransport**: pooled HTTP client for the query APIs and HTTP writes
//! - **IngestStream**: long-lived TCP connection for line-oriented ingestion
//!
//! Only transport-level I/O failures are retried. Malformed URLs, request
//! build errors and socket writes on the ingestion stream fail immediately.

mod http;
mod retry;
mod tcp;

pub use http::{HttpReply, HttpRequest, HttpTransport};
pub use retry::RetryPolicy;
pub use tcp::IngestStream;

use thiserror::Error;

/// Errors raised while moving bytes to or from a backend
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection refused, reset, timed out or broken mid-request
    #[error("I/O failure talking to {target}: {message}")]
    Io { target: String, message: String },

    /// The request could not be built (bad URL, encoding failure)
    #[error("Invalid request to {target}: {message}")]
    InvalidRequest { target: String, message: String },

    /// Every attempt allowed by the retry policy failed
    #[error("Connection to {target} failed {attempts} times: {last_error}")]
    RetriesExhausted {
        target: String,
        attempts: u32,
        last_error: String,
    },

    /// The ingestion socket failed
    #[error("Socket error: {0}")]
    Socket(#[from] std::io::Error),

    /// The ingestion socket was already closed
    #[error("Connection closed")]
    Closed,
}

impl TransportError {
    /// Whether another attempt could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Io { .. })
    }

    /// Classify a client error: request build problems are permanent,
    /// everything else happened on the wire.
    pub(crate) fn from_reqwest(target: &str, err: reqwest::Error) -> Self {
        if err.is_builder() || err.is_redirect() {
            TransportError::InvalidRequest {
                target: target.to_string(),
                message: err.to_string(),
            }
        } else {
            TransportError::Io {
                target: target.to_string(),
                message: err.to_string(),
            }
        }
    }
}
