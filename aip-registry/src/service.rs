//! REST surface for the registry.
//!
//! Every endpoint, including read-only search, passes through the fixed-window
//! rate limiter before dispatch. Transport failures (malformed bodies, unknown
//! paths, rate limiting) surface as 400/404/429 with a small JSON error body.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use hyper::header::CONTENT_TYPE;
use hyper::server::conn::AddrStream;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde::Serialize;
use serde_json::json;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use aip_primitives::{ErrorBody, HealthBody, Manifest, SearchQuery};

use crate::rate_limit::{FixedWindowLimiter, RateLimitConfig};
use crate::store::{RegistryError, RegistryStore};

/// HTTP server exposing a [`RegistryStore`] over the AIP registry REST surface.
#[derive(Debug)]
pub struct RegistryServer {
    store: Arc<RegistryStore>,
    limiter: Arc<FixedWindowLimiter>,
}

impl RegistryServer {
    /// Creates a server over the supplied store with the given rate budget.
    #[must_use]
    pub fn new(store: Arc<RegistryStore>, rate_limit: RateLimitConfig) -> Self {
        Self {
            store,
            limiter: Arc::new(FixedWindowLimiter::new(rate_limit)),
        }
    }

    /// Binds the server to `addr` and starts serving in a background task.
    ///
    /// Binding to port 0 picks a free port; the bound address is available on
    /// the returned handle. Shutting the handle down releases the socket; the
    /// store's contents are not persisted.
    ///
    /// # Errors
    ///
    /// Returns the underlying `hyper` error when the address cannot be bound.
    pub fn bind(self, addr: SocketAddr) -> hyper::Result<RegistryHandle> {
        let store = self.store;
        let limiter = self.limiter;

        let make = make_service_fn(move |conn: &AddrStream| {
            let remote = conn.remote_addr().ip();
            let store = Arc::clone(&store);
            let limiter = Arc::clone(&limiter);
            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    handle_request(Arc::clone(&store), Arc::clone(&limiter), remote, req)
                }))
            }
        });

        let server = Server::try_bind(&addr)?.serve(make);
        let local_addr = server.local_addr();
        info!(%local_addr, "registry listening");

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let graceful = server.with_graceful_shutdown(async {
            shutdown_rx.await.ok();
        });
        let task = tokio::spawn(graceful);

        Ok(RegistryHandle {
            local_addr,
            shutdown: shutdown_tx,
            task,
        })
    }
}

/// Handle to a running registry server.
#[derive(Debug)]
pub struct RegistryHandle {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<hyper::Result<()>>,
}

impl RegistryHandle {
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
    store: Arc<RegistryStore>,
    limiter: Arc<FixedWindowLimiter>,
    remote: IpAddr,
    req: Request<Body>,
) -> Result<Response<Body>, Infallible> {
    if let Err(RegistryError::RateLimited { retry_after }) = limiter.check(remote) {
        warn!(%remote, retry_after, "request rate limited");
        return Ok(json_response(
            StatusCode::TOO_MANY_REQUESTS,
            &ErrorBody {
                error: "Rate limited".into(),
                retry_after: Some(retry_after),
            },
        ));
    }

    let path = req.uri().path().to_owned();
    let response = match (req.method().clone(), path.as_str()) {
        (Method::GET, "/health") => {
            json_response(StatusCode::OK, &HealthBody::with_agents(store.len()))
        }
        (Method::POST, "/v1/agents") => register(&store, req).await,
        (Method::GET, "/v1/agents/search") => {
            let query = parse_search_query(req.uri().query());
            json_response(StatusCode::OK, &store.search(&query))
        }
        (Method::GET, path) if path.starts_with("/v1/agents/") => {
            let agent_id = &path["/v1/agents/".len()..];
            match store.get(agent_id) {
                Ok(manifest) => json_response(StatusCode::OK, &manifest),
                Err(_) => not_found_agent(),
            }
        }
        (Method::DELETE, path) if path.starts_with("/v1/agents/") => {
            let agent_id = &path["/v1/agents/".len()..];
            match store.deregister(agent_id) {
                Ok(()) => json_response(StatusCode::OK, &json!({"status": "deregistered"})),
                Err(_) => not_found_agent(),
            }
        }
        _ => json_response(StatusCode::NOT_FOUND, &ErrorBody::new("Not found")),
    };

    Ok(response)
}

async fn register(store: &RegistryStore, req: Request<Body>) -> Response<Body> {
    let Ok(body) = hyper::body::to_bytes(req.into_body()).await else {
        return json_response(
            StatusCode::BAD_REQUEST,
            &ErrorBody::new("Unreadable request body"),
        );
    };
    let Ok(manifest) = serde_json::from_slice::<Manifest>(&body) else {
        return json_response(
            StatusCode::BAD_REQUEST,
            &ErrorBody::new("Invalid manifest: need agent.id, agent.name, and capabilities"),
        );
    };
    match store.register(manifest) {
        Ok(ack) => json_response(StatusCode::CREATED, &ack),
        Err(err) => json_response(StatusCode::BAD_REQUEST, &ErrorBody::new(err.to_string())),
    }
}

fn not_found_agent() -> Response<Body> {
    json_response(StatusCode::NOT_FOUND, &ErrorBody::new("Agent not found"))
}

fn parse_search_query(raw: Option<&str>) -> SearchQuery {
    let mut query = SearchQuery::default();
    let Some(raw) = raw else {
        return query;
    };
    for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
        if value.is_empty() {
            continue;
        }
        match key.as_ref() {
            "capability" => query.capability = Some(value.into_owned()),
            "tags" => {
                query.tags = value
                    .split(',')
                    .map(|tag| tag.trim().to_owned())
                    .filter(|tag| !tag.is_empty())
                    .collect();
            }
            "maxPrice" => query.max_price = value.parse().ok(),
            "operator" => query.operator = Some(value.into_owned()),
            _ => {}
        }
    }
    query
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
