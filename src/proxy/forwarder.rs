//! Forwarding requests to the upstream.
//!
//! # Responsibilities
//! - Turn an inbound request into the forwarded request (URI, version, headers)
//! - Send it over a pooled keep-alive connection
//! - Classify failures: connect → 502, no response head in time → 504,
//!   exchange dropped before the head → 502
//! - Hand the response back with its body still streaming
//!
//! # Design Decisions
//! - Exactly one attempt per request; nothing is retried, not even a request
//!   whose pooled connection turned out to be closed
//! - `Location` and every other upstream header except hop-by-hop ones are
//!   relayed as-is. Redirects are not rewritten: the upstream is trusted to
//!   emit client-facing URLs
//! - The pool keeps a connection only after its response body was read to the
//!   end on a keep-alive exchange; anything cut short is discarded
//! - Dropping the returned future or body (client went away) closes the
//!   upstream connection
//! - The response timeout starts when the request is handed to the pool, so it
//!   also bounds streaming the request body. A large upload slower than
//!   `response_timeout_secs` ends in 504 even if the upstream is healthy
//! - A request body that fails mid-upload is the client's fault (400), not an
//!   upstream reset

use std::time::{Duration, Instant};

use axum::{
    body::Body,
    http::{Request, Version},
    response::Response,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioTimer},
};

use crate::config::UpstreamConfig;
use crate::error::ProxyError;
use crate::net::ClientConnection;
use crate::proxy::headers::{self, ForwardingHeaders};
use crate::proxy::target::UpstreamTarget;

/// Forwards requests to an upstream over a shared connection pool.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    headers: ForwardingHeaders,
    response_timeout: Duration,
}

impl Forwarder {
    pub fn new(config: &UpstreamConfig, headers: ForwardingHeaders) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
            .pool_max_idle_per_host(config.pool_max_idle)
            .retry_canceled_requests(false)
            .build(connector);

        Self {
            client,
            headers,
            response_timeout: Duration::from_secs(config.response_timeout_secs),
        }
    }

    /// Forward `request` to `target` on behalf of `client`.
    pub async fn forward(
        &self,
        target: &UpstreamTarget,
        request: Request<Body>,
        client: &ClientConnection,
    ) -> Result<Response, ProxyError> {
        let (mut parts, body) = request.into_parts();

        let original_host = headers::original_host(&parts.headers, &parts.uri);
        headers::strip_hop_by_hop(&mut parts.headers);
        self.headers
            .apply(&mut parts.headers, client, original_host)?;

        let mut forwarded = Request::new(body);
        *forwarded.method_mut() = parts.method;
        *forwarded.uri_mut() = target.uri_for(parts.uri.path_and_query())?;
        *forwarded.version_mut() = Version::HTTP_11;
        *forwarded.headers_mut() = parts.headers;

        let started = Instant::now();
        let response = match tokio::time::timeout(self.response_timeout, self.client.request(forwarded)).await {
            Ok(Ok(response)) => response,
            Ok(Err(source)) if source.is_connect() => {
                return Err(ProxyError::UpstreamUnavailable {
                    target: target.to_string(),
                    source,
                });
            }
            Ok(Err(source)) if request_body_failed(&source) => {
                return Err(ProxyError::ClientAborted {
                    target: target.to_string(),
                    source,
                });
            }
            Ok(Err(source)) => {
                return Err(ProxyError::UpstreamReset {
                    target: target.to_string(),
                    source,
                });
            }
            Err(_) => {
                return Err(ProxyError::UpstreamTimeout {
                    target: target.to_string(),
                    timeout: self.response_timeout,
                });
            }
        };

        tracing::debug!(
            upstream = %target,
            status = %response.status(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Upstream response head received"
        );

        let (mut parts, body) = response.into_parts();
        headers::strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

/// True if the exchange failed because the inbound request body errored.
fn request_body_failed(error: &hyper_util::client::legacy::Error) -> bool {
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        if cause.is::<axum::Error>() {
            return true;
        }
        source = cause.source();
    }
    false
}
