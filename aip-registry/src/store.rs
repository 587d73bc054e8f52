//! In-memory manifest store with filtered search.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, info};

use aip_primitives::{Manifest, RegisterAck, SearchAgent, SearchQuery, SearchResponse, SearchResult};

/// Placeholder reputation score assigned to every search result until a real
/// reputation computation exists.
const DEFAULT_TRUST_SCORE: f64 = 0.5;

/// Result alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors surfaced by the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The submitted manifest is missing required fields.
    #[error("invalid manifest: {reason}")]
    InvalidManifest {
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// No agent is registered under the requested id.
    #[error("agent `{id}` is not registered")]
    NotFound {
        /// The unknown agent identifier.
        id: String,
    },

    /// The caller exceeded the fixed-window request budget.
    #[error("rate limited; retry in {retry_after}s")]
    RateLimited {
        /// Whole seconds until the caller's window resets.
        retry_after: u64,
    },
}

/// A stored registration: the manifest plus bookkeeping timestamps.
///
/// Re-registration under the same agent id overwrites the entry in place and
/// resets both timestamps to the new registration time.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    manifest: Manifest,
    registered_at: DateTime<Utc>,
    last_seen: DateTime<Utc>,
}

impl RegistryEntry {
    /// Returns the stored manifest.
    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Returns the registration time.
    #[must_use]
    pub const fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    /// Returns the last time the agent was seen (currently equal to the most
    /// recent registration time; no heartbeat path updates it).
    #[must_use]
    pub const fn last_seen(&self) -> DateTime<Utc> {
        self.last_seen
    }
}

/// The discovery store: agent id to [`RegistryEntry`], insertion ordered.
///
/// Callers hold an instance (typically behind an `Arc`); there is no global.
/// All operations take `&self` and are atomic with respect to each other.
#[derive(Debug, Default)]
pub struct RegistryStore {
    entries: Mutex<IndexMap<String, RegistryEntry>>,
}

impl RegistryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, IndexMap<String, RegistryEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers or re-registers an agent manifest (upsert keyed by agent id).
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidManifest`] when `agent.id`,
    /// `agent.name`, or the capability list is empty. Wire manifests are
    /// deserialized permissively, so emptiness is re-checked here.
    pub fn register(&self, manifest: Manifest) -> RegistryResult<RegisterAck> {
        if manifest.agent().id().trim().is_empty() {
            return Err(RegistryError::InvalidManifest {
                reason: "agent.id is required".into(),
            });
        }
        if manifest.agent().name().trim().is_empty() {
            return Err(RegistryError::InvalidManifest {
                reason: "agent.name is required".into(),
            });
        }
        if manifest.capabilities().is_empty() {
            return Err(RegistryError::InvalidManifest {
                reason: "at least one capability is required".into(),
            });
        }

        let id = manifest.agent().id().to_owned();
        let now = Utc::now();
        self.entries().insert(
            id.clone(),
            RegistryEntry {
                manifest,
                registered_at: now,
                last_seen: now,
            },
        );
        info!(agent_id = %id, "agent registered");

        Ok(RegisterAck {
            id,
            status: "registered".into(),
        })
    }

    /// Searches every capability of every registered agent, returning the
    /// `(agent, capability)` pairs passing all supplied filters, in insertion
    /// order. No ranking or pagination is applied.
    #[must_use]
    pub fn search(&self, query: &SearchQuery) -> SearchResponse {
        let capability_filter = query
            .capability
            .as_deref()
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);
        let tag_filter: Vec<String> = query.tags.iter().map(|t| t.to_lowercase()).collect();

        let mut results = Vec::new();
        for entry in self.entries().values() {
            let manifest = entry.manifest();
            for capability in manifest.capabilities() {
                if let Some(needle) = &capability_filter {
                    let id_match = capability.id().as_str().to_lowercase().contains(needle);
                    let name_match = capability.name().to_lowercase().contains(needle);
                    if !id_match && !name_match {
                        continue;
                    }
                }

                if !tag_filter.is_empty()
                    && !capability
                        .tags()
                        .iter()
                        .any(|tag| tag_filter.contains(&tag.to_lowercase()))
                {
                    continue;
                }

                // Only capabilities declaring a parsable amount can be
                // excluded by price; unpriced capabilities always pass.
                if let Some(max_price) = query.max_price {
                    let declared = capability
                        .pricing()
                        .and_then(|p| p.amount())
                        .and_then(|a| a.parse::<f64>().ok());
                    if declared.is_some_and(|amount| amount > max_price) {
                        continue;
                    }
                }

                if let Some(operator) = query.operator.as_deref() {
                    if manifest.agent().operator() != Some(operator) {
                        continue;
                    }
                }

                results.push(SearchResult {
                    agent: SearchAgent {
                        id: manifest.agent().id().to_owned(),
                        name: manifest.agent().name().to_owned(),
                    },
                    capability: capability.id().as_str().to_owned(),
                    trust_score: DEFAULT_TRUST_SCORE,
                    pricing: capability.pricing().cloned(),
                    endpoint: manifest.endpoints().aip().to_owned(),
                    last_seen: entry
                        .last_seen()
                        .to_rfc3339_opts(SecondsFormat::Millis, true),
                });
            }
        }

        debug!(total = results.len(), "registry search");
        SearchResponse {
            total: results.len(),
            results,
            page: 1,
        }
    }

    /// Returns a defensive copy of the stored manifest.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for unknown ids.
    pub fn get(&self, agent_id: &str) -> RegistryResult<Manifest> {
        self.entries()
            .get(agent_id)
            .map(|entry| entry.manifest.clone())
            .ok_or_else(|| RegistryError::NotFound {
                id: agent_id.to_owned(),
            })
    }

    /// Removes an agent's entry. Subsequent lookups behave as if the agent
    /// was never registered.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for unknown ids.
    pub fn deregister(&self, agent_id: &str) -> RegistryResult<()> {
        // shift_remove keeps the insertion order of the remaining entries.
        if self.entries().shift_remove(agent_id).is_none() {
            return Err(RegistryError::NotFound {
                id: agent_id.to_owned(),
            });
        }
        info!(agent_id, "agent deregistered");
        Ok(())
    }

    /// Number of registered agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Drops every entry. Intended for explicit lifecycle resets between
    /// test runs.
    pub fn clear(&self) {
        self.entries().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aip_primitives::{Capability, CapabilityBuilder, CapabilityId, Pricing, PricingModel};

    fn capability(id: &str, tags: &[&str], price: Option<&str>) -> Capability {
        let mut builder = Capability::builder(CapabilityId::new(id).unwrap())
            .name(format!("Cap {id}"))
            .unwrap();
        for tag in tags {
            builder = builder.add_tag(*tag).unwrap();
        }
        if let Some(amount) = price {
            builder =
                builder.pricing(Pricing::new(PricingModel::PerTask).with_amount(amount, "USD"));
        }
        CapabilityBuilder::build(builder).unwrap()
    }

    fn manifest(id: &str, operator: Option<&str>, capabilities: Vec<Capability>) -> Manifest {
        let mut builder = Manifest::builder()
            .agent_id(id)
            .unwrap()
            .name(format!("Agent {id}"))
            .unwrap()
            .aip_endpoint(format!("http://{id}.local/aip"))
            .unwrap();
        if let Some(operator) = operator {
            builder = builder.operator(operator);
        }
        for capability in capabilities {
            builder = builder.capability(capability);
        }
        builder.build().unwrap()
    }

    #[test]
    fn register_acknowledges_and_counts() {
        let store = RegistryStore::new();
        let ack = store
            .register(manifest("a1", None, vec![capability("c1", &[], None)]))
            .unwrap();
        assert_eq!(ack.id, "a1");
        assert_eq!(ack.status, "registered");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn reregistration_overwrites_in_place() {
        let store = RegistryStore::new();
        store
            .register(manifest("a1", None, vec![capability("c1", &[], None)]))
            .unwrap();
        store
            .register(manifest("a1", None, vec![capability("c2", &[], None)]))
            .unwrap();
        assert_eq!(store.len(), 1);
        let stored = store.get("a1").unwrap();
        assert_eq!(stored.capabilities()[0].id().as_str(), "c2");
    }

    #[test]
    fn register_rejects_empty_fields() {
        let store = RegistryStore::new();
        // Wire manifests bypass the builder, so simulate one via serde.
        let wire: Manifest = serde_json::from_value(serde_json::json!({
            "agent": {"id": "", "name": "X"},
            "capabilities": [{"id": "c1", "name": "Cap1"}],
            "endpoints": {"aip": "http://x/aip"},
        }))
        .unwrap();
        let err = store.register(wire).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidManifest { .. }));

        let wire: Manifest = serde_json::from_value(serde_json::json!({
            "agent": {"id": "a1", "name": "X"},
            "capabilities": [],
            "endpoints": {"aip": "http://x/aip"},
        }))
        .unwrap();
        assert!(store.register(wire).is_err());
    }

    #[test]
    fn search_without_filters_returns_every_pair() {
        let store = RegistryStore::new();
        store
            .register(manifest(
                "a1",
                None,
                vec![capability("c1", &[], None), capability("c2", &[], None)],
            ))
            .unwrap();
        store
            .register(manifest("a2", None, vec![capability("c3", &[], None)]))
            .unwrap();

        let response = store.search(&SearchQuery::default());
        assert_eq!(response.total, 3);
        assert_eq!(response.page, 1);
        // Insertion order preserved across agents and capabilities.
        let ids: Vec<&str> = response
            .results
            .iter()
            .map(|r| r.capability.as_str())
            .collect();
        assert_eq!(ids, ["c1", "c2", "c3"]);
    }

    #[test]
    fn capability_filter_matches_id_or_name_substring() {
        let store = RegistryStore::new();
        store
            .register(manifest("a1", None, vec![capability("translate.text", &[], None)]))
            .unwrap();

        assert_eq!(store.search(&SearchQuery::default().capability("transl")).total, 1);
        // Case-insensitive, and "Cap translate.text" matches by name too.
        assert_eq!(store.search(&SearchQuery::default().capability("CAP T")).total, 1);
        assert_eq!(store.search(&SearchQuery::default().capability("missing")).total, 0);
    }

    #[test]
    fn tag_filter_uses_or_semantics() {
        let store = RegistryStore::new();
        store
            .register(manifest(
                "a1",
                None,
                vec![capability("c1", &["nlp", "i18n"], None)],
            ))
            .unwrap();
        store
            .register(manifest(
                "a2",
                None,
                vec![capability("c2", &["nlp", "text"], None)],
            ))
            .unwrap();

        assert_eq!(store.search(&SearchQuery::default().tag("nlp")).total, 2);
        assert_eq!(store.search(&SearchQuery::default().tag("i18n")).total, 1);
        assert_eq!(
            store.search(&SearchQuery::default().tag("i18n").tag("text")).total,
            2
        );
        assert_eq!(store.search(&SearchQuery::default().tag("NLP")).total, 2);
    }

    #[test]
    fn price_filter_only_excludes_declared_amounts() {
        let store = RegistryStore::new();
        store
            .register(manifest(
                "a1",
                None,
                vec![
                    capability("cheap", &[], Some("0.001")),
                    capability("pricey", &[], Some("5.0")),
                    capability("unpriced", &[], None),
                ],
            ))
            .unwrap();

        let response = store.search(&SearchQuery::default().max_price(1.0));
        let ids: Vec<&str> = response
            .results
            .iter()
            .map(|r| r.capability.as_str())
            .collect();
        assert_eq!(ids, ["cheap", "unpriced"]);
    }

    #[test]
    fn operator_filter_is_exact() {
        let store = RegistryStore::new();
        store
            .register(manifest("a1", Some("acme"), vec![capability("c1", &[], None)]))
            .unwrap();
        store
            .register(manifest("a2", Some("other"), vec![capability("c2", &[], None)]))
            .unwrap();
        store
            .register(manifest("a3", None, vec![capability("c3", &[], None)]))
            .unwrap();

        let response = store.search(&SearchQuery::default().operator("acme"));
        assert_eq!(response.total, 1);
        assert_eq!(response.results[0].agent.id, "a1");
        assert_eq!(store.search(&SearchQuery::default().operator("ACME")).total, 0);
    }

    #[test]
    fn search_results_carry_endpoint_and_placeholder_trust() {
        let store = RegistryStore::new();
        store
            .register(manifest("a1", None, vec![capability("c1", &[], None)]))
            .unwrap();
        let response = store.search(&SearchQuery::default());
        let result = &response.results[0];
        assert_eq!(result.endpoint, "http://a1.local/aip");
        assert!((result.trust_score - 0.5).abs() < f64::EPSILON);
        assert!(result.pricing.is_none());
    }

    #[test]
    fn deregister_removes_from_get_and_search() {
        let store = RegistryStore::new();
        store
            .register(manifest("a1", None, vec![capability("c1", &[], None)]))
            .unwrap();

        store.deregister("a1").unwrap();
        assert!(matches!(
            store.get("a1"),
            Err(RegistryError::NotFound { .. })
        ));
        assert_eq!(store.search(&SearchQuery::default()).total, 0);

        assert!(matches!(
            store.deregister("a1"),
            Err(RegistryError::NotFound { .. })
        ));
    }

    #[test]
    fn duplicate_capability_ids_both_surface_in_search() {
        let store = RegistryStore::new();
        store
            .register(manifest(
                "a1",
                None,
                vec![capability("dup", &[], None), capability("dup", &[], None)],
            ))
            .unwrap();
        assert_eq!(store.search(&SearchQuery::default().capability("dup")).total, 2);
    }

    #[test]
    fn clear_resets_the_store() {
        let store = RegistryStore::new();
        store
            .register(manifest("a1", None, vec![capability("c1", &[], None)]))
            .unwrap();
        store.clear();
        assert!(store.is_empty());
    }
}
