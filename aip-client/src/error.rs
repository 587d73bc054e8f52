//! Client error definitions.

use hyper::StatusCode;
use thiserror::Error;

/// Result alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the AIP client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A discovery call was made without a registry endpoint configured.
    #[error("no registry endpoint configured")]
    NoRegistry,

    /// Network-level failure (connection, protocol, bad URL).
    #[error("transport error: {reason}")]
    Transport {
        /// Additional context about the failure.
        reason: String,
    },

    /// The remote answered with a non-2xx status.
    #[error("request failed with status {status}")]
    Status {
        /// The HTTP status returned by the remote.
        status: StatusCode,
    },

    /// The response body was not the expected JSON document.
    #[error("invalid response body: {reason}")]
    Response {
        /// Additional context about the decode failure.
        reason: String,
    },

    /// The response passed HTTP but failed the envelope shape check.
    #[error("invalid response envelope")]
    InvalidEnvelope,
}

impl ClientError {
    /// Convenience constructor for transport failures.
    #[must_use]
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }
}

impl From<hyper::Error> for ClientError {
    fn from(err: hyper::Error) -> Self {
        Self::transport(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Response {
            reason: err.to_string(),
        }
    }
}
