//! AIP client.
//!
//! Discovers agents through a registry (or fetches manifests directly from an
//! agent endpoint), builds and sends task envelopes, and validates responses.
//! Non-2xx HTTP responses are raised as typed transport errors; a `task.error`
//! envelope is a *successful* return value, and callers branch on the
//! envelope's type.

#![warn(missing_docs, clippy::pedantic)]

mod client;
mod error;
mod http;
mod registry;

/// Task client: discover, fetch manifests, send tasks, ping.
pub use client::AipClient;
/// Client error type and result alias.
pub use error::{ClientError, ClientResult};
/// Registry REST client.
pub use registry::RegistryClient;
