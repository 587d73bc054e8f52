//! Shared error definitions for AIP primitive types.

use thiserror::Error;

/// Result alias used throughout the AIP SDK.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building AIP primitive types.
#[derive(Debug, Error)]
pub enum Error {
    /// Capability identifier failed validation.
    #[error("invalid capability id `{id}`: {reason}")]
    InvalidCapabilityId {
        /// The offending identifier string.
        id: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Capability definition failed validation.
    #[error("invalid capability: {reason}")]
    InvalidCapability {
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Manifest definition failed validation.
    #[error("invalid manifest: {reason}")]
    InvalidManifest {
        /// Human-readable reason for rejection.
        reason: String,
    },
}
