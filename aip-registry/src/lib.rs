//! AIP discovery registry.
//!
//! An addressable in-memory store of agent manifests with filtered search, a
//! fixed-window per-source rate limiter, and the REST surface that exposes
//! both. State lives for the owning process's lifetime; nothing is persisted
//! across restarts and no liveness expiry exists.

#![warn(missing_docs, clippy::pedantic)]

mod rate_limit;
mod service;
mod store;

/// Fixed-window rate limiting applied to every registry endpoint.
pub use rate_limit::{FixedWindowLimiter, RateLimitConfig};
/// HTTP server exposing the registry REST surface.
pub use service::{RegistryHandle, RegistryServer};
/// Manifest storage, search, and the registry error type.
pub use store::{RegistryEntry, RegistryError, RegistryResult, RegistryStore};
