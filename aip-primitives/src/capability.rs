//! Capability descriptors advertised in agent manifests.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

const MAX_ID_LEN: usize = 64;
const MAX_NAME_LEN: usize = 96;

/// Identifier for a capability that an agent may expose.
///
/// Identifiers are expected to be unique within a manifest, but uniqueness is
/// not enforced; search surfaces every matching capability and dispatch
/// resolves to a single handler keyed by id.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityId(String);

impl CapabilityId {
    /// Creates a new capability identifier after validating its format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCapabilityId`] if the supplied identifier is
    /// empty, too long, or contains unsupported characters.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        validate_identifier(&id)?;
        Ok(Self(id))
    }

    /// Returns the capability identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CapabilityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<CapabilityId> for String {
    fn from(value: CapabilityId) -> Self {
        value.0
    }
}

fn validate_identifier(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::InvalidCapabilityId {
            id: String::new(),
            reason: "identifier cannot be empty".into(),
        });
    }

    if id.len() > MAX_ID_LEN {
        return Err(Error::InvalidCapabilityId {
            id: id.into(),
            reason: format!("identifier length must be <= {MAX_ID_LEN}"),
        });
    }

    if !id
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '-' | '_' | '.'))
    {
        return Err(Error::InvalidCapabilityId {
            id: id.into(),
            reason: "identifier must contain lowercase alphanumeric, dash, underscore, or dot"
                .into(),
        });
    }

    Ok(())
}

/// Pricing model declared for a capability.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PricingModel {
    /// Flat price per completed task.
    PerTask,
    /// Metered by wall-clock minute.
    PerMinute,
    /// No charge.
    Free,
}

impl Default for PricingModel {
    fn default() -> Self {
        Self::Free
    }
}

/// Declared (unenforced) pricing metadata for a capability.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    #[serde(default)]
    model: PricingModel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    currency: Option<String>,
}

impl Pricing {
    /// Creates pricing metadata for the supplied model.
    #[must_use]
    pub const fn new(model: PricingModel) -> Self {
        Self {
            model,
            amount: None,
            currency: None,
        }
    }

    /// Sets the decimal amount, kept as a string to avoid float drift.
    #[must_use]
    pub fn with_amount(mut self, amount: impl Into<String>, currency: impl Into<String>) -> Self {
        self.amount = Some(amount.into());
        self.currency = Some(currency.into());
        self
    }

    /// Returns the pricing model.
    #[must_use]
    pub const fn model(&self) -> PricingModel {
        self.model
    }

    /// Returns the declared amount, if any.
    #[must_use]
    pub fn amount(&self) -> Option<&str> {
        self.amount.as_deref()
    }

    /// Returns the declared currency, if any.
    #[must_use]
    pub fn currency(&self) -> Option<&str> {
        self.currency.as_deref()
    }
}

/// Describes one callable unit exposed by an agent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    id: CapabilityId,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(rename = "inputSchema", default, skip_serializing_if = "Option::is_none")]
    input_schema: Option<Value>,
    #[serde(rename = "outputSchema", default, skip_serializing_if = "Option::is_none")]
    output_schema: Option<Value>,
    #[serde(
        rename = "estimatedDuration",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    estimated_duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pricing: Option<Pricing>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
}

impl Capability {
    /// Starts building a capability descriptor.
    #[must_use]
    pub fn builder(id: CapabilityId) -> CapabilityBuilder {
        CapabilityBuilder {
            id,
            name: None,
            description: None,
            input_schema: None,
            output_schema: None,
            estimated_duration: None,
            pricing: None,
            tags: Vec::new(),
        }
    }

    /// Returns the capability identifier.
    #[must_use]
    pub fn id(&self) -> &CapabilityId {
        &self.id
    }

    /// Human-friendly capability name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Optional capability description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// JSON schema describing the expected input document.
    #[must_use]
    pub fn input_schema(&self) -> Option<&Value> {
        self.input_schema.as_ref()
    }

    /// JSON schema describing the produced output document.
    #[must_use]
    pub fn output_schema(&self) -> Option<&Value> {
        self.output_schema.as_ref()
    }

    /// Advisory duration estimate (e.g. `"5s"`).
    #[must_use]
    pub fn estimated_duration(&self) -> Option<&str> {
        self.estimated_duration.as_deref()
    }

    /// Declared pricing, if any.
    #[must_use]
    pub fn pricing(&self) -> Option<&Pricing> {
        self.pricing.as_ref()
    }

    /// Discovery tags.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

/// Builder for [`Capability`].
#[derive(Debug)]
pub struct CapabilityBuilder {
    id: CapabilityId,
    name: Option<String>,
    description: Option<String>,
    input_schema: Option<Value>,
    output_schema: Option<Value>,
    estimated_duration: Option<String>,
    pricing: Option<Pricing>,
    tags: Vec<String>,
}

impl CapabilityBuilder {
    /// Sets the display name for the capability.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCapability`] if the name is empty or exceeds the
    /// maximum supported length.
    pub fn name(mut self, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::InvalidCapability {
                reason: "name cannot be empty".into(),
            });
        }
        if name.len() > MAX_NAME_LEN {
            return Err(Error::InvalidCapability {
                reason: format!("name length must be <= {MAX_NAME_LEN}"),
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

    /// Sets the JSON schema for the input document.
    #[must_use]
    pub fn input_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }

    /// Sets the JSON schema for the output document.
    #[must_use]
    pub fn output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// Sets the advisory duration estimate.
    #[must_use]
    pub fn estimated_duration(mut self, duration: impl Into<String>) -> Self {
        self.estimated_duration = Some(duration.into());
        self
    }

    /// Sets the declared pricing metadata.
    #[must_use]
    pub fn pricing(mut self, pricing: Pricing) -> Self {
        self.pricing = Some(pricing);
        self
    }

    /// Adds a discovery tag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCapability`] if the supplied tag is empty.
    pub fn add_tag(mut self, tag: impl Into<String>) -> Result<Self> {
        let tag = tag.into();
        if tag.trim().is_empty() {
            return Err(Error::InvalidCapability {
                reason: "tag cannot be empty".into(),
            });
        }
        self.tags.push(tag);
        Ok(self)
    }

    /// Finalises the capability descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCapability`] if the name was not provided.
    pub fn build(self) -> Result<Capability> {
        let name = self.name.ok_or_else(|| Error::InvalidCapability {
            reason: "name must be provided".into(),
        })?;

        Ok(Capability {
            id: self.id,
            name,
            description: self.description,
            input_schema: self.input_schema,
            output_schema: self.output_schema,
            estimated_duration: self.estimated_duration,
            pricing: self.pricing,
            tags: self.tags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn build_capability_success() {
        let id = CapabilityId::new("translate.text").expect("id");
        let capability = Capability::builder(id)
            .name("Translate")
            .and_then(|b| b.add_tag("nlp"))
            .map(|b| b.description("Translate text between languages"))
            .map(|b| b.pricing(Pricing::new(PricingModel::PerTask).with_amount("0.001", "USD")))
            .and_then(CapabilityBuilder::build)
            .expect("build");

        assert_eq!(capability.name(), "Translate");
        assert_eq!(capability.tags(), ["nlp"]);
        assert_eq!(capability.pricing().unwrap().amount(), Some("0.001"));
    }

    #[test]
    fn capability_requires_name() {
        let id = CapabilityId::new("no.name").expect("id");
        let err = Capability::builder(id).build().expect_err("should fail");
        assert!(matches!(err, Error::InvalidCapability { .. }));
    }

    #[test]
    fn rejects_uppercase_identifier() {
        let err = CapabilityId::new("Translate").expect_err("should fail");
        assert!(matches!(err, Error::InvalidCapabilityId { .. }));
    }

    #[test]
    fn serializes_camel_case_and_omits_empty() {
        let capability = Capability::builder(CapabilityId::new("c1").unwrap())
            .name("Cap1")
            .unwrap()
            .input_schema(json!({"type": "object"}))
            .build()
            .unwrap();

        let value = serde_json::to_value(&capability).unwrap();
        assert_eq!(value["inputSchema"], json!({"type": "object"}));
        assert!(value.get("outputSchema").is_none());
        assert!(value.get("tags").is_none());
    }

    #[test]
    fn pricing_model_uses_kebab_case() {
        assert_eq!(
            serde_json::to_string(&PricingModel::PerTask).unwrap(),
            "\"per-task\""
        );
    }

    #[test]
    fn deserializes_minimal_wire_capability() {
        let capability: Capability = serde_json::from_value(json!({
            "id": "c1",
            "name": "Cap1",
        }))
        .expect("decode");
        assert_eq!(capability.id().as_str(), "c1");
        assert!(capability.pricing().is_none());
    }
}
