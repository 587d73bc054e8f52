//! Capability handler seam.
//!
//! Handlers return a result type rather than raising: a success payload or a
//! [`TaskFailure`]. The server boundary maps failures to `task.error`
//! envelopes with code `INTERNAL_ERROR`, deliberately discarding the
//! failure's original classification.

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;

use aip_primitives::Envelope;

/// Outcome of a capability invocation: a result payload or a typed failure.
pub type TaskResult = Result<Value, TaskFailure>;

/// A handler-reported failure. Only the message survives the server boundary.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TaskFailure {
    message: String,
}

impl TaskFailure {
    /// Creates a failure with the supplied message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Trait implemented by capability handlers.
///
/// Handlers may perform asynchronous work; the server never cancels them, and
/// any `constraints.maxDuration` in the request is advisory metadata only.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Processes one task request.
    ///
    /// `capability` is the id the request was dispatched under, `input` the
    /// request's input document, and `envelope` the full request envelope for
    /// handlers that need header fields.
    async fn handle(&self, capability: &str, input: Value, envelope: &Envelope) -> TaskResult;
}

/// Adapter turning an async closure over the input document into a
/// [`TaskHandler`]. Handlers that need the capability id or the envelope
/// implement the trait directly.
pub struct FnHandler {
    func: Box<dyn Fn(Value) -> BoxFuture<'static, TaskResult> + Send + Sync>,
}

/// Wraps an async closure as a [`TaskHandler`].
pub fn handler_fn<F, Fut>(func: F) -> FnHandler
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = TaskResult> + Send + 'static,
{
    FnHandler {
        func: Box::new(move |input| Box::pin(func(input))),
    }
}

impl std::fmt::Debug for FnHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

#[async_trait]
impl TaskHandler for FnHandler {
    async fn handle(&self, _capability: &str, input: Value, _envelope: &Envelope) -> TaskResult {
        (self.func)(input).await
    }
}
