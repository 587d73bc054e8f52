//! Task client: discovery, manifest fetch, task submission, and liveness.

use hyper::Method;
use serde_json::Value;
use tracing::debug;

use aip_primitives::{
    Envelope, Manifest, MessageType, SearchQuery, SearchResponse, TaskRequestPayload,
    validate_shape,
};

use crate::error::{ClientError, ClientResult};
use crate::http::{HttpClient, build_http_client, request_json, request_raw};
use crate::registry::RegistryClient;

const MANIFEST_PATH: &str = "/.well-known/aip-manifest.json";

/// An AIP consumer identity: discovers providers and sends them envelopes.
#[derive(Debug, Clone)]
pub struct AipClient {
    agent_id: String,
    registry: Option<RegistryClient>,
    client: HttpClient,
}

impl AipClient {
    /// Creates a client without a registry; discovery calls will fail until
    /// one is configured, but direct task submission works.
    #[must_use]
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            registry: None,
            client: build_http_client(),
        }
    }

    /// Creates a client that discovers agents through the given registry.
    #[must_use]
    pub fn with_registry(agent_id: impl Into<String>, registry_url: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            registry: Some(RegistryClient::new(registry_url)),
            client: build_http_client(),
        }
    }

    /// Returns this client's agent identifier (used as the envelope `from`).
    #[must_use]
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Returns the configured registry client, if any.
    #[must_use]
    pub fn registry(&self) -> Option<&RegistryClient> {
        self.registry.as_ref()
    }

    /// Discovers agents by delegating to the registry's search.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NoRegistry`] when no registry is configured, or
    /// a transport error when the search call fails.
    pub async fn discover(&self, query: &SearchQuery) -> ClientResult<SearchResponse> {
        let registry = self.registry.as_ref().ok_or(ClientError::NoRegistry)?;
        registry.search(query).await
    }

    /// Fetches a manifest directly from an agent endpoint's well-known path.
    ///
    /// # Errors
    ///
    /// Returns a transport error on non-2xx responses or undecodable bodies.
    pub async fn fetch_manifest(&self, endpoint: &str) -> ClientResult<Manifest> {
        let url = format!("{}{MANIFEST_PATH}", endpoint.trim_end_matches('/'));
        request_json(&self.client, Method::GET, &url, None::<&()>).await
    }

    /// Builds and sends a `task.request` envelope, returning the response
    /// envelope unconditionally.
    ///
    /// A `task.error` response is a normal successful return value; callers
    /// must branch on the returned envelope's `message_type`.
    ///
    /// # Errors
    ///
    /// Returns a transport error on non-2xx responses, or
    /// [`ClientError::InvalidEnvelope`] when the 2xx body fails the envelope
    /// shape check.
    pub async fn send_task(
        &self,
        to_agent_id: &str,
        endpoint: &str,
        capability: &str,
        input: Value,
        constraints: Option<Value>,
    ) -> ClientResult<Envelope> {
        let mut payload = TaskRequestPayload::new(capability, input);
        if let Some(constraints) = constraints {
            payload = payload.with_constraints(constraints);
        }
        let envelope = Envelope::create(
            MessageType::TaskRequest,
            self.agent_id.clone(),
            to_agent_id,
            payload.into_value(),
        );
        debug!(capability, to_agent_id, request_id = %envelope.id, "sending task");
        self.exchange(endpoint, &envelope).await
    }

    /// One-shot liveness check: sends a `ping` and returns the response
    /// envelope (a `pong` from a conforming agent).
    ///
    /// # Errors
    ///
    /// Returns a transport error on non-2xx responses, or
    /// [`ClientError::InvalidEnvelope`] for malformed response bodies.
    pub async fn ping(&self, to_agent_id: &str, endpoint: &str) -> ClientResult<Envelope> {
        let envelope = Envelope::create(
            MessageType::Ping,
            self.agent_id.clone(),
            to_agent_id,
            Value::Object(serde_json::Map::new()),
        );
        self.exchange(endpoint, &envelope).await
    }

    async fn exchange(&self, endpoint: &str, envelope: &Envelope) -> ClientResult<Envelope> {
        let bytes = request_raw(&self.client, Method::POST, endpoint, Some(envelope)).await?;
        let raw: Value = serde_json::from_slice(&bytes)?;
        if !validate_shape(&raw) {
            return Err(ClientError::InvalidEnvelope);
        }
        serde_json::from_value(raw).map_err(|_| ClientError::InvalidEnvelope)
    }
}
