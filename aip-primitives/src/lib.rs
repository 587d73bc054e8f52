//! Core wire types for the Agent Interchange Protocol (AIP).
//!
//! This crate defines the message envelope, the agent manifest, and the shared
//! vocabulary (message types, error codes, discovery DTOs) used by the registry,
//! the capability server, and the client.

#![warn(missing_docs, clippy::pedantic)]

mod capability;
mod envelope;
mod error;
mod manifest;
mod wire;

/// Capability descriptors, pricing metadata, and supporting builders.
pub use capability::{Capability, CapabilityBuilder, CapabilityId, Pricing, PricingModel};
/// Envelope construction, validation, and the canonical signable subset.
pub use envelope::{
    Envelope, ErrorCode, MessageType, PROTOCOL_VERSION, TaskErrorPayload, TaskRequestPayload,
    canonical_payload, validate_shape,
};
/// Error type and result alias shared across the SDK.
pub use error::{Error, Result};
/// Agent manifests advertised to the registry.
pub use manifest::{AgentInfo, AuthInfo, Endpoints, Manifest, ManifestBuilder, TrustInfo};
/// Discovery and registry wire DTOs.
pub use wire::{ErrorBody, HealthBody, RegisterAck, SearchAgent, SearchQuery, SearchResponse, SearchResult};
