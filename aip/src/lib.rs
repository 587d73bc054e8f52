//! Agent Interchange Protocol (AIP) SDK facade.
//!
//! Depend on this crate via `cargo add aip`. It bundles the protocol crates
//! behind feature flags so downstream users can enable or disable components
//! as needed: a provider agent typically needs `server` (and perhaps `trust`),
//! a consumer needs `client`, and a discovery service needs `registry`.

#![warn(missing_docs, clippy::pedantic)]

/// Re-export shared wire primitives for convenience.
pub use aip_primitives as primitives;

/// Task client and registry client (enabled by the `client` feature).
#[cfg(feature = "client")]
pub use aip_client as client;

/// Discovery registry store and REST server (enabled by the `registry` feature).
#[cfg(feature = "registry")]
pub use aip_registry as registry;

/// Capability-dispatch server (enabled by the `server` feature).
#[cfg(feature = "server")]
pub use aip_server as server;

/// Ed25519 envelope signing and verification (enabled by the `trust` feature).
#[cfg(feature = "trust")]
pub use aip_trust as trust;
