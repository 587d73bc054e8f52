//! Wire-level DTOs shared by the registry server and its clients.

use serde::{Deserialize, Serialize};

use crate::capability::Pricing;

/// Successful registration acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterAck {
    /// Agent identifier acknowledged by the registry.
    pub id: String,
    /// Always `"registered"`.
    pub status: String,
}

/// Identity summary embedded in a search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchAgent {
    /// Agent identifier.
    pub id: String,
    /// Human readable agent name.
    pub name: String,
}

/// One `(agent, capability)` pair matched by a registry search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Matching agent.
    pub agent: SearchAgent,
    /// Matching capability identifier.
    pub capability: String,
    /// Reputation placeholder; currently a constant, no reputation
    /// computation exists yet.
    #[serde(rename = "trustScore")]
    pub trust_score: f64,
    /// Declared pricing of the matching capability, `null` when absent.
    pub pricing: Option<Pricing>,
    /// AIP endpoint taken from the agent's manifest.
    pub endpoint: String,
    /// Timestamp of the agent's most recent registration.
    #[serde(rename = "lastSeen")]
    pub last_seen: String,
}

/// Registry search response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Matching pairs in registry insertion order.
    pub results: Vec<SearchResult>,
    /// Total number of results.
    pub total: usize,
    /// Always `1`; pagination is not implemented.
    pub page: u32,
}

/// Filters accepted by the registry search endpoint.
///
/// Filters combine with AND; an unset filter passes everything.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    /// Case-insensitive substring matched against capability id or name.
    pub capability: Option<String>,
    /// Tag list; a capability matches when it carries any of these tags.
    pub tags: Vec<String>,
    /// Upper bound on declared pricing amounts; unpriced capabilities pass.
    pub max_price: Option<f64>,
    /// Exact match against the manifest's `agent.operator`.
    pub operator: Option<String>,
}

impl SearchQuery {
    /// Sets the capability substring filter.
    #[must_use]
    pub fn capability(mut self, capability: impl Into<String>) -> Self {
        self.capability = Some(capability.into());
        self
    }

    /// Adds a tag to the tag filter.
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Sets the maximum declared price.
    #[must_use]
    pub const fn max_price(mut self, max_price: f64) -> Self {
        self.max_price = Some(max_price);
        self
    }

    /// Sets the operator filter.
    #[must_use]
    pub fn operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = Some(operator.into());
        self
    }
}

/// Transport-level JSON error body (400/404/429 responses).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human readable error description.
    pub error: String,
    /// Seconds until the rate-limit window resets; only on 429 responses.
    #[serde(rename = "retryAfter", default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl ErrorBody {
    /// Creates an error body with the supplied message.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            retry_after: None,
        }
    }
}

/// Health probe response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthBody {
    /// Always `"ok"`.
    pub status: String,
    /// Number of registered agents; reported by the registry only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agents: Option<usize>,
}

impl HealthBody {
    /// Health body without an agent count (capability server).
    #[must_use]
    pub fn ok() -> Self {
        Self {
            status: "ok".into(),
            agents: None,
        }
    }

    /// Health body carrying the registry's live agent count.
    #[must_use]
    pub fn with_agents(agents: usize) -> Self {
        Self {
            status: "ok".into(),
            agents: Some(agents),
        }
    }
}
