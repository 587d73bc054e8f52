//! REST client for the AIP registry.

use hyper::Method;
use tracing::debug;
use url::form_urlencoded;

use aip_primitives::{Manifest, RegisterAck, SearchQuery, SearchResponse};

use crate::error::ClientResult;
use crate::http::{HttpClient, build_http_client, request_json, request_raw};

/// Client for a single registry instance.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    base_url: String,
    client: HttpClient,
}

impl RegistryClient {
    /// Creates a client for the registry at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            client: build_http_client(),
        }
    }

    /// Returns the registry base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submits a manifest for registration (upsert keyed by agent id).
    ///
    /// # Errors
    ///
    /// Returns a transport error on non-2xx responses, including the 400 the
    /// registry answers for manifests with missing required fields.
    pub async fn register(&self, manifest: &Manifest) -> ClientResult<RegisterAck> {
        let url = format!("{}/v1/agents", self.base_url);
        debug!(agent_id = %manifest.agent().id(), "registering agent");
        request_json(&self.client, Method::POST, &url, Some(manifest)).await
    }

    /// Searches the registry with the supplied filters.
    ///
    /// # Errors
    ///
    /// Returns a transport error on non-2xx responses (e.g. 429 when rate
    /// limited).
    pub async fn search(&self, query: &SearchQuery) -> ClientResult<SearchResponse> {
        let mut params = form_urlencoded::Serializer::new(String::new());
        if let Some(capability) = query.capability.as_deref() {
            params.append_pair("capability", capability);
        }
        if !query.tags.is_empty() {
            params.append_pair("tags", &query.tags.join(","));
        }
        if let Some(max_price) = query.max_price {
            params.append_pair("maxPrice", &max_price.to_string());
        }
        if let Some(operator) = query.operator.as_deref() {
            params.append_pair("operator", operator);
        }

        let encoded = params.finish();
        let url = if encoded.is_empty() {
            format!("{}/v1/agents/search", self.base_url)
        } else {
            format!("{}/v1/agents/search?{encoded}", self.base_url)
        };
        request_json(&self.client, Method::GET, &url, None::<&()>).await
    }

    /// Fetches the stored manifest for an agent id.
    ///
    /// # Errors
    ///
    /// Returns a transport error on non-2xx responses (404 for unknown ids).
    pub async fn get(&self, agent_id: &str) -> ClientResult<Manifest> {
        let url = format!("{}/v1/agents/{agent_id}", self.base_url);
        request_json(&self.client, Method::GET, &url, None::<&()>).await
    }

    /// Removes an agent's registration.
    ///
    /// # Errors
    ///
    /// Returns a transport error on non-2xx responses (404 for unknown ids).
    pub async fn deregister(&self, agent_id: &str) -> ClientResult<()> {
        let url = format!("{}/v1/agents/{agent_id}", self.base_url);
        request_raw(&self.client, Method::DELETE, &url, None::<&()>).await?;
        Ok(())
    }
}
