//! Capability server: dispatch state machine and HTTP surface.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::header::CONTENT_TYPE;
use hyper::server::conn::AddrStream;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use aip_primitives::{
    Envelope, ErrorBody, ErrorCode, HealthBody, Manifest, MessageType, TaskErrorPayload,
    TaskRequestPayload, validate_shape,
};

use crate::handler::{TaskHandler, TaskResult, handler_fn};

/// Well-known path serving the agent's manifest.
pub const MANIFEST_PATH: &str = "/.well-known/aip-manifest.json";

/// Outcome of dispatching one envelope.
#[derive(Debug)]
pub enum Dispatch {
    /// A protocol-level reply envelope, delivered at HTTP 200.
    Reply(Envelope),
    /// A transport-level rejection, delivered as an HTTP error status.
    Transport {
        /// HTTP status to answer with.
        status: StatusCode,
        /// Human readable rejection reason.
        message: String,
    },
}

/// An agent's capability-dispatch server.
///
/// Handlers are registered against capability ids before the server starts
/// listening; registering the same id again replaces the prior handler, so a
/// manifest with duplicate capability ids dispatches to whichever handler was
/// registered last.
pub struct CapabilityServer {
    manifest: Manifest,
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl std::fmt::Debug for CapabilityServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityServer")
            .field("agent_id", &self.manifest.agent().id())
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CapabilityServer {
    /// Creates a server for the agent described by `manifest`.
    #[must_use]
    pub fn new(manifest: Manifest) -> Self {
        Self {
            manifest,
            handlers: HashMap::new(),
        }
    }

    /// Returns the manifest served at the well-known path.
    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Registers a handler for a capability id, replacing any prior handler.
    pub fn handle(
        &mut self,
        capability_id: impl Into<String>,
        handler: Arc<dyn TaskHandler>,
    ) -> &mut Self {
        self.handlers.insert(capability_id.into(), handler);
        self
    }

    /// Registers an async closure as the handler for a capability id.
    pub fn handle_fn<F, Fut>(&mut self, capability_id: impl Into<String>, func: F) -> &mut Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        self.handle(capability_id, Arc::new(handler_fn(func)))
    }

    /// Runs the state machine over one incoming envelope.
    ///
    /// `ping` answers immediately with a `pong` (from/to swapped, `replyTo`
    /// set); `task.request` looks up a handler; every other type is rejected
    /// at the transport level.
    pub async fn dispatch(&self, envelope: &Envelope) -> Dispatch {
        match envelope.message_type {
            MessageType::Ping => {
                let pong = Envelope::create(
                    MessageType::Pong,
                    self.manifest.agent().id(),
                    envelope.from.clone(),
                    Value::Object(serde_json::Map::new()),
                )
                .with_reply_to(envelope.id.clone());
                Dispatch::Reply(pong)
            }
            MessageType::TaskRequest => self.dispatch_task(envelope).await,
            other => Dispatch::Transport {
                status: StatusCode::BAD_REQUEST,
                message: format!("Unsupported type: {other}"),
            },
        }
    }

    async fn dispatch_task(&self, envelope: &Envelope) -> Dispatch {
        let request = TaskRequestPayload::from_payload(&envelope.payload);

        let Some(handler) = self.handlers.get(&request.capability) else {
            debug!(capability = %request.capability, "no handler registered");
            return Dispatch::Reply(self.error_reply(
                envelope,
                ErrorCode::CapabilityNotFound,
                format!("Unknown: {}", request.capability),
            ));
        };

        match handler
            .handle(&request.capability, request.input, envelope)
            .await
        {
            Ok(result) => {
                let reply = self
                    .reply(envelope, MessageType::TaskResult, result);
                Dispatch::Reply(reply)
            }
            Err(failure) => {
                warn!(capability = %request.capability, error = %failure, "handler failed");
                // The failure's classification is deliberately not preserved
                // across the wire; everything maps to INTERNAL_ERROR.
                let message = if failure.message().is_empty() {
                    "capability handler failed".to_owned()
                } else {
                    failure.message().to_owned()
                };
                Dispatch::Reply(self.error_reply(envelope, ErrorCode::InternalError, message))
            }
        }
    }

    fn reply(&self, request: &Envelope, message_type: MessageType, payload: Value) -> Envelope {
        let mut reply = Envelope::create(
            message_type,
            self.manifest.agent().id(),
            request.from.clone(),
            payload,
        )
        .with_reply_to(request.id.clone());
        reply.correlation_id = request.correlation_id.clone();
        reply
    }

    fn error_reply(&self, request: &Envelope, code: ErrorCode, message: String) -> Envelope {
        self.reply(
            request,
            MessageType::TaskError,
            TaskErrorPayload::new(code, message).into_value(),
        )
    }

    /// Binds the agent's HTTP surface to `addr` and serves in the background.
    ///
    /// Consumes the server, so no handler can be registered after listening
    /// begins. Binding to port 0 picks a free port.
    ///
    /// # Errors
    ///
    /// Returns the underlying `hyper` error when the address cannot be bound.
    pub fn bind(self, addr: SocketAddr) -> hyper::Result<ServerHandle> {
        let server = Arc::new(self);

        let make = make_service_fn(move |_conn: &AddrStream| {
            let server = Arc::clone(&server);
            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    handle_request(Arc::clone(&server), req)
                }))
            }
        });

        let serving = Server::try_bind(&addr)?.serve(make);
        let local_addr = serving.local_addr();
        info!(%local_addr, "capability server listening");

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let graceful = serving.with_graceful_shutdown(async {
            shutdown_rx.await.ok();
        });
        let task = tokio::spawn(graceful);

        Ok(ServerHandle {
            local_addr,
            shutdown: shutdown_tx,
            task,
        })
    }
}

/// Handle to a running capability server.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<hyper::Result<()>>,
}

impl ServerHandle {
    /// Returns the bound local address.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops the server and waits for in-flight requests to drain.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        let _ = self.task.await;
    }
}

async fn handle_request(
    server: Arc<CapabilityServer>,
    req: Request<Body>,
) -> Result<Response<Body>, Infallible> {
    let path = req.uri().path().to_owned();
    let response = match (req.method().clone(), path.as_str()) {
        (Method::GET, "/health") => json_response(StatusCode::OK, &HealthBody::ok()),
        (Method::GET, MANIFEST_PATH) => json_response(StatusCode::OK, server.manifest()),
        (Method::POST, "/aip" | "/") => handle_message(&server, req).await,
        _ => json_response(StatusCode::NOT_FOUND, &ErrorBody::new("Not found")),
    };
    Ok(response)
}

async fn handle_message(server: &CapabilityServer, req: Request<Body>) -> Response<Body> {
    let Ok(body) = hyper::body::to_bytes(req.into_body()).await else {
        return json_response(
            StatusCode::BAD_REQUEST,
            &ErrorBody::new("Unreadable request body"),
        );
    };
    let Ok(raw) = serde_json::from_slice::<Value>(&body) else {
        return json_response(StatusCode::BAD_REQUEST, &ErrorBody::new("Invalid JSON"));
    };
    if !validate_shape(&raw) {
        return json_response(StatusCode::BAD_REQUEST, &ErrorBody::new("Invalid envelope"));
    }
    // The shape check admits unrecognized type strings; the typed decode is
    // where those are rejected.
    let Ok(envelope) = serde_json::from_value::<Envelope>(raw) else {
        return json_response(
            StatusCode::BAD_REQUEST,
            &ErrorBody::new("Unsupported envelope type"),
        );
    };

    match server.dispatch(&envelope).await {
        Dispatch::Reply(reply) => json_response(StatusCode::OK, &reply),
        Dispatch::Transport { status, message } => {
            json_response(status, &ErrorBody::new(message))
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Body> {
    // Serialization of these response bodies cannot fail.
    let payload = serde_json::to_vec(body).unwrap_or_default();
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(payload))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::TaskFailure;
    use aip_primitives::{Capability, CapabilityId, TaskRequestPayload};
    use serde_json::json;

    fn manifest() -> Manifest {
        Manifest::builder()
            .agent_id("provider-1")
            .unwrap()
            .name("Provider")
            .unwrap()
            .capability(
                Capability::builder(CapabilityId::new("echo").unwrap())
                    .name("Echo")
                    .unwrap()
                    .build()
                    .unwrap(),
            )
            .aip_endpoint("http://localhost:0/aip")
            .unwrap()
            .build()
            .unwrap()
    }

    fn task_request(capability: &str) -> Envelope {
        Envelope::create(
            MessageType::TaskRequest,
            "caller-1",
            "provider-1",
            TaskRequestPayload::new(capability, json!({"text": "hello"})).into_value(),
        )
    }

    #[tokio::test]
    async fn ping_answers_pong_with_swapped_addressing() {
        let server = CapabilityServer::new(manifest());
        let ping = Envelope::create(MessageType::Ping, "caller-1", "provider-1", json!({}));

        let Dispatch::Reply(pong) = server.dispatch(&ping).await else {
            panic!("expected a reply");
        };
        assert_eq!(pong.message_type, MessageType::Pong);
        assert_eq!(pong.from, "provider-1");
        assert_eq!(pong.to, "caller-1");
        assert_eq!(pong.reply_to.as_deref(), Some(ping.id.as_str()));
    }

    #[tokio::test]
    async fn successful_handler_wraps_result() {
        let mut server = CapabilityServer::new(manifest());
        server.handle_fn("echo", |input: Value| async move { Ok(json!({"echoed": input})) });

        let request = task_request("echo");
        let Dispatch::Reply(reply) = server.dispatch(&request).await else {
            panic!("expected a reply");
        };
        assert_eq!(reply.message_type, MessageType::TaskResult);
        assert_eq!(reply.payload["echoed"]["text"], "hello");
        assert_eq!(reply.reply_to.as_deref(), Some(request.id.as_str()));
    }

    #[tokio::test]
    async fn unknown_capability_is_a_protocol_error() {
        let server = CapabilityServer::new(manifest());
        let request = task_request("missing");

        let Dispatch::Reply(reply) = server.dispatch(&request).await else {
            panic!("expected a reply");
        };
        assert_eq!(reply.message_type, MessageType::TaskError);
        assert_eq!(reply.payload["code"], "CAPABILITY_NOT_FOUND");
        assert_eq!(reply.reply_to.as_deref(), Some(request.id.as_str()));
    }

    #[tokio::test]
    async fn handler_failure_maps_to_internal_error() {
        let mut server = CapabilityServer::new(manifest());
        server.handle_fn("echo", |_| async { Err(TaskFailure::new("backend exploded")) });

        let Dispatch::Reply(reply) = server.dispatch(&task_request("echo")).await else {
            panic!("expected a reply");
        };
        assert_eq!(reply.message_type, MessageType::TaskError);
        assert_eq!(reply.payload["code"], "INTERNAL_ERROR");
        assert_eq!(reply.payload["message"], "backend exploded");
    }

    #[tokio::test]
    async fn empty_failure_message_gets_a_generic_one() {
        let mut server = CapabilityServer::new(manifest());
        server.handle_fn("echo", |_| async { Err(TaskFailure::new("")) });

        let Dispatch::Reply(reply) = server.dispatch(&task_request("echo")).await else {
            panic!("expected a reply");
        };
        assert_eq!(reply.payload["message"], "capability handler failed");
    }

    #[tokio::test]
    async fn reserved_types_are_transport_rejections() {
        let server = CapabilityServer::new(manifest());
        let envelope = Envelope::create(
            MessageType::TaskCancel,
            "caller-1",
            "provider-1",
            json!({}),
        );
        let Dispatch::Transport { status, .. } = server.dispatch(&envelope).await else {
            panic!("expected a transport rejection");
        };
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn payload_without_capability_dispatches_to_nothing() {
        let server = CapabilityServer::new(manifest());
        let request = Envelope::create(
            MessageType::TaskRequest,
            "caller-1",
            "provider-1",
            json!({"input": {"x": 1}}),
        );
        let Dispatch::Reply(reply) = server.dispatch(&request).await else {
            panic!("expected a reply");
        };
        assert_eq!(reply.payload["code"], "CAPABILITY_NOT_FOUND");
    }

    #[tokio::test]
    async fn reregistering_a_capability_replaces_the_handler() {
        let mut server = CapabilityServer::new(manifest());
        server.handle_fn("echo", |_| async { Ok(json!({"version": 1})) });
        server.handle_fn("echo", |_| async { Ok(json!({"version": 2})) });

        let Dispatch::Reply(reply) = server.dispatch(&task_request("echo")).await else {
            panic!("expected a reply");
        };
        assert_eq!(reply.payload["version"], 2);
    }

    #[tokio::test]
    async fn correlation_id_is_propagated() {
        let mut server = CapabilityServer::new(manifest());
        server.handle_fn("echo", |input: Value| async move { Ok(input) });

        let request = task_request("echo").with_correlation_id("corr-7");
        let Dispatch::Reply(reply) = server.dispatch(&request).await else {
            panic!("expected a reply");
        };
        assert_eq!(reply.correlation_id.as_deref(), Some("corr-7"));
    }
}
