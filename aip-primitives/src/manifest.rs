//! Agent manifests: the self-description an operator publishes to a registry.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::capability::Capability;
use crate::envelope::PROTOCOL_VERSION;
use crate::error::{Error, Result};

fn default_protocol_version() -> String {
    PROTOCOL_VERSION.to_owned()
}

/// Identity block of a manifest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentInfo {
    id: String,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    homepage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    operator: Option<String>,
}

impl AgentInfo {
    /// Returns the agent identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the agent display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the agent build version, if declared.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Returns the homepage URL, if declared.
    #[must_use]
    pub fn homepage(&self) -> Option<&str> {
        self.homepage.as_deref()
    }

    /// Returns the operator identity, if declared.
    #[must_use]
    pub fn operator(&self) -> Option<&str> {
        self.operator.as_deref()
    }
}

/// Endpoint block of a manifest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Endpoints {
    aip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    health: Option<String>,
}

impl Endpoints {
    /// Returns the AIP message endpoint.
    #[must_use]
    pub fn aip(&self) -> &str {
        &self.aip
    }

    /// Returns the health probe endpoint, if declared.
    #[must_use]
    pub fn health(&self) -> Option<&str> {
        self.health.as_deref()
    }
}

/// Authentication schemes an agent accepts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthInfo {
    schemes: Vec<String>,
}

impl AuthInfo {
    /// Creates an auth block from the accepted scheme names.
    #[must_use]
    pub fn new(schemes: Vec<String>) -> Self {
        Self { schemes }
    }

    /// Returns the accepted scheme names.
    #[must_use]
    pub fn schemes(&self) -> &[String] {
        &self.schemes
    }
}

/// Trust metadata: the agent's public key plus attestations.
///
/// Attestations are carried verbatim; no verification logic exists for them in
/// this core. They are a declared extension point.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrustInfo {
    #[serde(rename = "publicKey", default, skip_serializing_if = "Option::is_none")]
    public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    attestations: Vec<Value>,
}

impl TrustInfo {
    /// Creates a trust block carrying the exported public key.
    #[must_use]
    pub fn with_public_key(public_key: impl Into<String>) -> Self {
        Self {
            public_key: Some(public_key.into()),
            attestations: Vec::new(),
        }
    }

    /// Appends an unverified attestation document.
    #[must_use]
    pub fn add_attestation(mut self, attestation: Value) -> Self {
        self.attestations.push(attestation);
        self
    }

    /// Returns the exported public key, if present.
    #[must_use]
    pub fn public_key(&self) -> Option<&str> {
        self.public_key.as_deref()
    }

    /// Returns the attestation documents.
    #[must_use]
    pub fn attestations(&self) -> &[Value] {
        &self.attestations
    }
}

/// An agent's published self-description.
///
/// Immutable once built; accessors hand out references and the registry stores
/// and returns clones, so callers can never mutate a stored manifest through
/// aliasing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default = "default_protocol_version")]
    aip: String,
    agent: AgentInfo,
    capabilities: Vec<Capability>,
    endpoints: Endpoints,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    auth: Option<AuthInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    trust: Option<TrustInfo>,
}

impl Manifest {
    /// Starts building a manifest with a fresh random agent id.
    #[must_use]
    pub fn builder() -> ManifestBuilder {
        ManifestBuilder {
            agent_id: Uuid::new_v4().to_string(),
            name: None,
            description: None,
            version: None,
            homepage: None,
            operator: None,
            capabilities: Vec::new(),
            aip_endpoint: None,
            health_endpoint: None,
            auth_schemes: Vec::new(),
            trust: None,
        }
    }

    /// Returns the protocol version the manifest was authored against.
    #[must_use]
    pub fn aip(&self) -> &str {
        &self.aip
    }

    /// Returns the identity block.
    #[must_use]
    pub fn agent(&self) -> &AgentInfo {
        &self.agent
    }

    /// Returns the advertised capabilities.
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Returns the endpoint block.
    #[must_use]
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Returns the accepted authentication schemes, if declared.
    #[must_use]
    pub fn auth(&self) -> Option<&AuthInfo> {
        self.auth.as_ref()
    }

    /// Returns the trust block, if declared.
    #[must_use]
    pub fn trust(&self) -> Option<&TrustInfo> {
        self.trust.as_ref()
    }
}

/// Builder for [`Manifest`].
#[derive(Debug)]
pub struct ManifestBuilder {
    agent_id: String,
    name: Option<String>,
    description: Option<String>,
    version: Option<String>,
    homepage: Option<String>,
    operator: Option<String>,
    capabilities: Vec<Capability>,
    aip_endpoint: Option<String>,
    health_endpoint: Option<String>,
    auth_schemes: Vec<String>,
    trust: Option<TrustInfo>,
}

impl ManifestBuilder {
    /// Overrides the generated agent identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidManifest`] when the identifier is empty.
    pub fn agent_id(mut self, id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::InvalidManifest {
                reason: "agent id cannot be empty".into(),
            });
        }
        self.agent_id = id;
        Ok(self)
    }

    /// Sets the human-readable agent name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidManifest`] when the name is empty.
    pub fn name(mut self, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::InvalidManifest {
                reason: "agent name cannot be empty".into(),
            });
        }
        self.name = Some(name);
        Ok(self)
    }

    /// Sets an optional description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the agent build version.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Sets the homepage URL.
    #[must_use]
    pub fn homepage(mut self, homepage: impl Into<String>) -> Self {
        self.homepage = Some(homepage.into());
        self
    }

    /// Sets the operator identity used by registry operator filtering.
    #[must_use]
    pub fn operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = Some(operator.into());
        self
    }

    /// Adds a capability. Duplicate ids are legal and kept as-is.
    #[must_use]
    pub fn capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    /// Sets the AIP message endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidManifest`] when the endpoint is empty.
    pub fn aip_endpoint(mut self, endpoint: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into();
        if endpoint.trim().is_empty() {
            return Err(Error::InvalidManifest {
                reason: "aip endpoint cannot be empty".into(),
            });
        }
        self.aip_endpoint = Some(endpoint);
        Ok(self)
    }

    /// Sets the optional health probe endpoint.
    #[must_use]
    pub fn health_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.health_endpoint = Some(endpoint.into());
        self
    }

    /// Adds an accepted authentication scheme.
    #[must_use]
    pub fn auth_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.auth_schemes.push(scheme.into());
        self
    }

    /// Sets the trust block.
    #[must_use]
    pub fn trust(mut self, trust: TrustInfo) -> Self {
        self.trust = Some(trust);
        self
    }

    /// Consumes the builder and returns the manifest.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidManifest`] when the name or AIP endpoint is
    /// missing, or no capability was added.
    pub fn build(self) -> Result<Manifest> {
        let name = self.name.ok_or_else(|| Error::InvalidManifest {
            reason: "agent name must be provided".into(),
        })?;
        let aip_endpoint = self.aip_endpoint.ok_or_else(|| Error::InvalidManifest {
            reason: "aip endpoint must be provided".into(),
        })?;
        if self.capabilities.is_empty() {
            return Err(Error::InvalidManifest {
                reason: "at least one capability must be declared".into(),
            });
        }

        Ok(Manifest {
            aip: default_protocol_version(),
            agent: AgentInfo {
                id: self.agent_id,
                name,
                description: self.description,
                version: self.version,
                homepage: self.homepage,
                operator: self.operator,
            },
            capabilities: self.capabilities,
            endpoints: Endpoints {
                aip: aip_endpoint,
                health: self.health_endpoint,
            },
            auth: if self.auth_schemes.is_empty() {
                None
            } else {
                Some(AuthInfo::new(self.auth_schemes))
            },
            trust: self.trust,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Capability, CapabilityId};
    use serde_json::json;

    fn base_capability() -> Capability {
        Capability::builder(CapabilityId::new("test.cap").expect("id"))
            .name("Test")
            .and_then(|b| b.add_tag("demo"))
            .and_then(crate::capability::CapabilityBuilder::build)
            .expect("capability")
    }

    #[test]
    fn builds_manifest() {
        let manifest = Manifest::builder()
            .agent_id("agent-1")
            .unwrap()
            .name("demo")
            .unwrap()
            .description("demo agent")
            .operator("acme")
            .capability(base_capability())
            .aip_endpoint("http://localhost:4000/aip")
            .unwrap()
            .health_endpoint("http://localhost:4000/health")
            .build()
            .unwrap();

        assert_eq!(manifest.aip(), "0.1");
        assert_eq!(manifest.agent().id(), "agent-1");
        assert_eq!(manifest.agent().operator(), Some("acme"));
        assert_eq!(manifest.capabilities().len(), 1);
        assert_eq!(manifest.endpoints().aip(), "http://localhost:4000/aip");
    }

    #[test]
    fn name_and_endpoint_and_capability_are_required() {
        let result = Manifest::builder().build();
        assert!(result.is_err());

        let result = Manifest::builder()
            .name("x")
            .unwrap()
            .aip_endpoint("http://x/aip")
            .unwrap()
            .build();
        assert!(matches!(result, Err(Error::InvalidManifest { .. })));
    }

    #[test]
    fn generates_agent_id_when_not_supplied() {
        let manifest = Manifest::builder()
            .name("anon")
            .unwrap()
            .capability(base_capability())
            .aip_endpoint("http://x/aip")
            .unwrap()
            .build()
            .unwrap();
        assert!(!manifest.agent().id().is_empty());
    }

    #[test]
    fn duplicate_capability_ids_are_legal() {
        let manifest = Manifest::builder()
            .name("dup")
            .unwrap()
            .capability(base_capability())
            .capability(base_capability())
            .aip_endpoint("http://x/aip")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(manifest.capabilities().len(), 2);
    }

    #[test]
    fn wire_manifest_without_version_field_decodes() {
        let manifest: Manifest = serde_json::from_value(json!({
            "agent": {"id": "a1", "name": "X"},
            "capabilities": [{"id": "c1", "name": "Cap1"}],
            "endpoints": {"aip": "http://x/aip"},
        }))
        .expect("decode");
        assert_eq!(manifest.aip(), "0.1");
        assert_eq!(manifest.agent().name(), "X");
    }

    #[test]
    fn serialization_omits_empty_blocks() {
        let manifest = Manifest::builder()
            .name("lean")
            .unwrap()
            .capability(base_capability())
            .aip_endpoint("http://x/aip")
            .unwrap()
            .build()
            .unwrap();
        let value = serde_json::to_value(&manifest).unwrap();
        assert!(value.get("auth").is_none());
        assert!(value.get("trust").is_none());
        assert!(value["agent"].get("description").is_none());
    }

    #[test]
    fn trust_block_round_trips_attestations() {
        let trust = TrustInfo::with_public_key("ed25519:AAAA")
            .add_attestation(json!({"issuer": "someone", "claim": "kyc"}));
        let manifest = Manifest::builder()
            .name("trusted")
            .unwrap()
            .capability(base_capability())
            .aip_endpoint("http://x/aip")
            .unwrap()
            .trust(trust)
            .build()
            .unwrap();

        let value = serde_json::to_value(&manifest).unwrap();
        let decoded: Manifest = serde_json::from_value(value).unwrap();
        assert_eq!(decoded.trust().unwrap().attestations().len(), 1);
        assert_eq!(decoded.trust().unwrap().public_key(), Some("ed25519:AAAA"));
    }
}
