//! Per-request access records.
//!
//! The record rides along with the response body and is emitted when the body
//! is finished or dropped, so byte counts and latency cover the whole
//! transfer, and a client that disconnects mid-stream still gets a line.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    body::{Body, HttpBody},
    http::{header, HeaderValue, Method, StatusCode},
    response::Response,
};
use futures_util::{stream, StreamExt};

use crate::observability::metrics;

/// Log target for access records.
pub const ACCESS_TARGET: &str = "edge_proxy::access";

/// How the response body transfer ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Complete,
    /// The body stream failed after the head was sent; the connection is closed.
    Aborted,
    /// The body was dropped before its end, normally because the client left.
    Disconnected,
}

impl Outcome {
    fn as_str(&self) -> &'static str {
        match self {
            Outcome::Complete => "complete",
            Outcome::Aborted => "aborted",
            Outcome::Disconnected => "disconnected",
        }
    }
}

/// One access log entry under construction.
#[derive(Debug)]
pub struct AccessRecord {
    request_id: String,
    method: Method,
    path: String,
    route: &'static str,
    client: SocketAddr,
    started: Instant,
    status: u16,
    bytes: u64,
    outcome: Outcome,
}

impl AccessRecord {
    pub fn new(
        request_id: String,
        method: Method,
        path: String,
        route: &'static str,
        client: SocketAddr,
        started: Instant,
    ) -> Self {
        Self {
            request_id,
            method,
            path,
            route,
            client,
            started,
            status: 0,
            bytes: 0,
            outcome: Outcome::Disconnected,
        }
    }

    fn finish(&mut self, outcome: Outcome) {
        self.outcome = outcome;
    }
}

impl Drop for AccessRecord {
    fn drop(&mut self) {
        tracing::info!(
            target: ACCESS_TARGET,
            request_id = %self.request_id,
            method = %self.method,
            path = %self.path,
            route = self.route,
            status = self.status,
            bytes = self.bytes,
            latency_ms = self.started.elapsed().as_millis() as u64,
            client = %self.client,
            outcome = self.outcome.as_str(),
            "access"
        );
    }
}

fn has_body(method: &Method, status: StatusCode) -> bool {
    method != Method::HEAD
        && !status.is_informational()
        && status != StatusCode::NO_CONTENT
        && status != StatusCode::NOT_MODIFIED
}

/// Attach `record` to `response`, counting body bytes as they are sent.
pub fn instrument(response: Response, mut record: AccessRecord) -> Response {
    record.status = response.status().as_u16();

    if !has_body(&record.method, response.status()) {
        record.finish(Outcome::Complete);
        return response;
    }

    let (mut parts, body) = response.into_parts();
    if !parts.headers.contains_key(header::CONTENT_LENGTH)
        && !parts.headers.contains_key(header::TRANSFER_ENCODING)
    {
        // Keep fixed-length framing for bodies whose size is known up front.
        if let Some(len) = body.size_hint().exact() {
            parts
                .headers
                .insert(header::CONTENT_LENGTH, HeaderValue::from(len));
        }
    }

    let data = body.into_data_stream();
    let counted = stream::unfold((data, record), |(mut data, mut record)| async move {
        match data.next().await {
            Some(Ok(chunk)) => {
                record.bytes += chunk.len() as u64;
                Some((Ok(chunk), (data, record)))
            }
            Some(Err(error)) => {
                record.finish(Outcome::Aborted);
                if record.route == "upstream" {
                    metrics::record_upstream_error("upstream_reset");
                }
                tracing::error!(
                    request_id = %record.request_id,
                    method = %record.method,
                    path = %record.path,
                    client = %record.client,
                    route = record.route,
                    bytes_sent = record.bytes,
                    error = %error,
                    "Response body failed mid-stream, closing client connection"
                );
                Some((Err(error), (data, record)))
            }
            None => {
                record.finish(Outcome::Complete);
                None
            }
        }
    });

    Response::from_parts(parts, Body::from_stream(counted))
}
