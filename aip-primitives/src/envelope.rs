//! AIP message envelopes: construction, shape validation, and the canonical
//! signable subset.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Protocol version carried in the `aip` field of every envelope and manifest.
pub const PROTOCOL_VERSION: &str = "0.1";

/// Closed vocabulary of envelope types.
///
/// Only `ping` and `task.request` are dispatched by the capability server;
/// the remaining variants are reserved wire vocabulary.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// Invoke a capability on a provider agent.
    #[serde(rename = "task.request")]
    TaskRequest,
    /// Provider accepted a task for asynchronous processing.
    #[serde(rename = "task.accept")]
    TaskAccept,
    /// Progress report for a long-running task.
    #[serde(rename = "task.progress")]
    TaskProgress,
    /// Successful task outcome.
    #[serde(rename = "task.result")]
    TaskResult,
    /// Protocol-level task failure.
    #[serde(rename = "task.error")]
    TaskError,
    /// Request cancellation of an in-flight task.
    #[serde(rename = "task.cancel")]
    TaskCancel,
    /// Price quote for a prospective task.
    #[serde(rename = "task.quote")]
    TaskQuote,
    /// Unsolicited task offer.
    #[serde(rename = "task.offer")]
    TaskOffer,
    /// Negotiation round for task terms.
    #[serde(rename = "task.negotiate")]
    TaskNegotiate,
    /// Liveness probe.
    #[serde(rename = "ping")]
    Ping,
    /// Liveness probe response.
    #[serde(rename = "pong")]
    Pong,
    /// Ask an agent which capabilities it exposes.
    #[serde(rename = "capability.query")]
    CapabilityQuery,
    /// Response to a capability query.
    #[serde(rename = "capability.response")]
    CapabilityResponse,
}

impl MessageType {
    /// Returns the wire representation of the message type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TaskRequest => "task.request",
            Self::TaskAccept => "task.accept",
            Self::TaskProgress => "task.progress",
            Self::TaskResult => "task.result",
            Self::TaskError => "task.error",
            Self::TaskCancel => "task.cancel",
            Self::TaskQuote => "task.quote",
            Self::TaskOffer => "task.offer",
            Self::TaskNegotiate => "task.negotiate",
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::CapabilityQuery => "capability.query",
            Self::CapabilityResponse => "capability.response",
        }
    }
}

impl Display for MessageType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of protocol-level error codes carried by `task.error` payloads.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The request envelope or payload was malformed.
    InvalidRequest,
    /// The capability exists but cannot currently serve requests.
    CapabilityUnavailable,
    /// No handler is registered for the requested capability.
    CapabilityNotFound,
    /// Task input failed schema validation.
    InputValidationFailed,
    /// The task exceeded its declared duration budget.
    TaskTimeout,
    /// The caller exceeded a rate limit.
    RateLimited,
    /// The caller is not authenticated.
    Unauthorized,
    /// The caller is authenticated but not permitted.
    Forbidden,
    /// The handler failed while processing the task.
    InternalError,
    /// The task would exceed its declared cost budget.
    CostExceeded,
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let code = match self {
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::CapabilityUnavailable => "CAPABILITY_UNAVAILABLE",
            Self::CapabilityNotFound => "CAPABILITY_NOT_FOUND",
            Self::InputValidationFailed => "INPUT_VALIDATION_FAILED",
            Self::TaskTimeout => "TASK_TIMEOUT",
            Self::RateLimited => "RATE_LIMITED",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::InternalError => "INTERNAL_ERROR",
            Self::CostExceeded => "COST_EXCEEDED",
        };
        f.write_str(code)
    }
}

/// The AIP message unit: six header fields plus a typed payload.
///
/// Fields are public wire data; the optional trailer fields (`signature`,
/// `replyTo`, `correlationId`) are excluded from the canonical signable subset.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    /// Protocol version, always [`PROTOCOL_VERSION`] for envelopes built here.
    pub aip: String,
    /// Unique message identifier (UUID v4).
    pub id: String,
    /// Message type from the closed vocabulary.
    #[serde(rename = "type")]
    pub message_type: MessageType,
    /// Sender agent identifier.
    pub from: String,
    /// Recipient agent identifier.
    pub to: String,
    /// RFC 3339 timestamp, set at construction and never mutated.
    pub timestamp: String,
    /// Message payload; shape depends on `message_type` but is not validated
    /// at construction.
    pub payload: Value,
    /// Optional detached signature over the canonical subset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Identifier of the message this envelope replies to.
    #[serde(rename = "replyTo", default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    /// Correlation identifier threading a multi-message exchange.
    #[serde(rename = "correlationId", default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl Envelope {
    /// Creates a new envelope with a fresh random id and a current timestamp.
    ///
    /// The payload is not checked against the schema implied by the message
    /// type; the protocol is deliberately permissive at construction.
    #[must_use]
    pub fn create(
        message_type: MessageType,
        from: impl Into<String>,
        to: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            aip: PROTOCOL_VERSION.to_owned(),
            id: Uuid::new_v4().to_string(),
            message_type,
            from: from.into(),
            to: to.into(),
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            payload,
            signature: None,
            reply_to: None,
            correlation_id: None,
        }
    }

    /// Sets the `replyTo` trailer field.
    #[must_use]
    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    /// Sets the `correlationId` trailer field.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

/// Checks that raw JSON has the shape of an envelope.
///
/// True iff `aip`, `id`, `type`, `from`, `to`, and `timestamp` are present as
/// strings and `payload` is present. This is a shape check only: it does not
/// verify that `type` belongs to the closed vocabulary, nor that the payload
/// matches the schema implied by the type.
#[must_use]
pub fn validate_shape(value: &Value) -> bool {
    const REQUIRED: [&str; 6] = ["aip", "id", "type", "from", "to", "timestamp"];

    let Some(object) = value.as_object() else {
        return false;
    };

    REQUIRED
        .iter()
        .all(|key| object.get(*key).is_some_and(Value::is_string))
        && object.contains_key("payload")
}

/// Canonical signable subset, serialized in this exact field order.
#[derive(Serialize)]
struct CanonicalSubset<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    message_type: MessageType,
    from: &'a str,
    to: &'a str,
    timestamp: &'a str,
    payload: &'a Value,
}

/// Returns the deterministic serialization of the envelope's signable subset:
/// exactly `{id, type, from, to, timestamp, payload}` in that key order.
///
/// `signature`, `replyTo`, and `correlationId` never contribute to the output.
#[must_use]
pub fn canonical_payload(envelope: &Envelope) -> String {
    let subset = CanonicalSubset {
        id: &envelope.id,
        message_type: envelope.message_type,
        from: &envelope.from,
        to: &envelope.to,
        timestamp: &envelope.timestamp,
        payload: &envelope.payload,
    };
    // The subset holds only strings and a JSON value; serialization cannot fail.
    serde_json::to_string(&subset).unwrap_or_default()
}

/// Payload of a `task.request` envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskRequestPayload {
    /// Identifier of the capability to invoke.
    #[serde(default)]
    pub capability: String,
    /// Input document handed to the capability handler.
    #[serde(default = "empty_object")]
    pub input: Value,
    /// Advisory constraints (e.g. `maxDuration`, `maxCost`); never enforced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Value>,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

impl Default for TaskRequestPayload {
    fn default() -> Self {
        Self {
            capability: String::new(),
            input: empty_object(),
            constraints: None,
        }
    }
}

impl TaskRequestPayload {
    /// Creates a request payload for the given capability and input.
    #[must_use]
    pub fn new(capability: impl Into<String>, input: Value) -> Self {
        Self {
            capability: capability.into(),
            input,
            constraints: None,
        }
    }

    /// Attaches advisory constraints.
    #[must_use]
    pub fn with_constraints(mut self, constraints: Value) -> Self {
        self.constraints = Some(constraints);
        self
    }

    /// Decodes a request payload from an envelope's raw payload.
    ///
    /// Missing or malformed fields fall back to defaults, so a payload without
    /// a `capability` dispatches with an empty capability id.
    #[must_use]
    pub fn from_payload(payload: &Value) -> Self {
        serde_json::from_value(payload.clone()).unwrap_or_default()
    }

    /// Converts the payload into a JSON value for embedding in an envelope.
    #[must_use]
    pub fn into_value(self) -> Value {
        let mut object = serde_json::Map::new();
        object.insert("capability".into(), Value::String(self.capability));
        object.insert("input".into(), self.input);
        if let Some(constraints) = self.constraints {
            object.insert("constraints".into(), constraints);
        }
        Value::Object(object)
    }
}

/// Payload of a `task.error` envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskErrorPayload {
    /// Protocol error code.
    pub code: ErrorCode,
    /// Human-readable failure description.
    pub message: String,
    /// Whether the caller may retry the task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
    /// Suggested delay before retrying, in seconds.
    #[serde(rename = "retryAfter", default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl TaskErrorPayload {
    /// Creates an error payload with the given code and message.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retryable: None,
            retry_after: None,
        }
    }

    /// Converts the payload into a JSON value for embedding in an envelope.
    #[must_use]
    pub fn into_value(self) -> Value {
        let mut object = serde_json::Map::new();
        object.insert("code".into(), Value::String(self.code.to_string()));
        object.insert("message".into(), Value::String(self.message));
        if let Some(retryable) = self.retryable {
            object.insert("retryable".into(), Value::Bool(retryable));
        }
        if let Some(retry_after) = self.retry_after {
            object.insert("retryAfter".into(), Value::from(retry_after));
        }
        Value::Object(object)
    }
}
