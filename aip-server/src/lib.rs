//! AIP capability server.
//!
//! Receives envelopes over HTTP and dispatches `task.request` messages to
//! registered capability handlers, answering with `task.result`, `task.error`,
//! or `pong` envelopes. Transport-level failures (malformed JSON, failed shape
//! validation, unknown paths) surface as 400/404; protocol-level failures
//! travel inside `task.error` envelopes at HTTP 200.

#![warn(missing_docs, clippy::pedantic)]

mod handler;
mod server;

/// Handler seam: the trait, the result-typed failure, and the closure adapter.
pub use handler::{FnHandler, TaskFailure, TaskHandler, TaskResult, handler_fn};
/// The capability server, its dispatch state machine, and the serve handle.
pub use server::{CapabilityServer, Dispatch, ServerHandle};
