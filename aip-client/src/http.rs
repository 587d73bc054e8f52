//! Shared HTTP plumbing: a TLS-capable hyper client and JSON request helpers.

use std::sync::Arc;

use hyper::client::HttpConnector;
use hyper::header::CONTENT_TYPE;
use hyper::{Body, Client, Method, Request};
use hyper_rustls::HttpsConnector;
use rustls::{ClientConfig, OwnedTrustAnchor, RootCertStore};
use serde::Serialize;
use serde::de::DeserializeOwned;
use webpki_roots::TLS_SERVER_ROOTS;

use crate::error::{ClientError, ClientResult};

pub(crate) type HttpClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Builds a client that speaks HTTPS against the webpki root set and falls
/// through to plain HTTP for `http://` endpoints.
pub(crate) fn build_http_client() -> HttpClient {
    let mut roots = RootCertStore::empty();
    roots.add_trust_anchors(TLS_SERVER_ROOTS.iter().map(|anchor| {
        OwnedTrustAnchor::from_subject_spki_name_constraints(
            anchor.subject,
            anchor.spki,
            anchor.name_constraints,
        )
    }));

    let config = ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth();

    let mut http = HttpConnector::new();
    http.enforce_http(false);

    let connector = HttpsConnector::from((http, Arc::new(config)));

    Client::builder().build::<_, Body>(connector)
}

/// Sends a request and decodes the JSON response body.
///
/// Any non-2xx status is raised as [`ClientError::Status`] without reading the
/// body; protocol-level errors ride inside 2xx bodies and are not raised here.
pub(crate) async fn request_json<T: DeserializeOwned>(
    client: &HttpClient,
    method: Method,
    url: &str,
    body: Option<&impl Serialize>,
) -> ClientResult<T> {
    let bytes = request_raw(client, method, url, body).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Sends a request and returns the raw response bytes after the status check.
pub(crate) async fn request_raw(
    client: &HttpClient,
    method: Method,
    url: &str,
    body: Option<&impl Serialize>,
) -> ClientResult<hyper::body::Bytes> {
    let uri: hyper::Uri = url
        .parse()
        .map_err(|_| ClientError::transport(format!("invalid url `{url}`")))?;

    let mut builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => {
            let payload = serde_json::to_vec(body)?;
            builder = builder.header(CONTENT_TYPE, "application/json");
            builder
                .body(Body::from(payload))
                .map_err(|err| ClientError::transport(err.to_string()))?
        }
        None => builder
            .body(Body::empty())
            .map_err(|err| ClientError::transport(err.to_string()))?,
    };

    let response = client.request(request).await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ClientError::Status { status });
    }
    Ok(hyper::body::to_bytes(response.into_body()).await?)
}
