//! Request-level error taxonomy.
//!
//! Every failure a handler can hit maps onto one variant here. The listener
//! boundary turns a `ProxyError` into a response carrying only the status and
//! its canonical reason phrase; the `Display` text (which may name paths or the
//! upstream address) goes to the error log and nowhere else.

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};

/// Errors raised while routing or handling a single request.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// No routing rule matched. Unreachable while the catch-all invariant holds.
    #[error("no routing rule matched path {path}")]
    Routing { path: String },

    /// The request tried to reach a file outside the static root.
    #[error("path {path} escapes the static root")]
    Forbidden { path: String },

    /// No file exists at the resolved location.
    #[error("no static file at {path}")]
    NotFound { path: String },

    /// Static files only answer GET and HEAD.
    #[error("method {method} not allowed on static files")]
    MethodNotAllowed { method: Method },

    /// The request path could not be decoded.
    #[error("malformed request path: {reason}")]
    BadRequest { reason: &'static str },

    /// The upstream refused the connection or did not accept it in time.
    #[error("upstream {target} unavailable: {source}")]
    UpstreamUnavailable {
        target: String,
        #[source]
        source: hyper_util::client::legacy::Error,
    },

    /// The upstream accepted the request but sent no response head in time.
    #[error("upstream {target} sent no response within {timeout:?}")]
    UpstreamTimeout { target: String, timeout: Duration },

    /// The upstream dropped the exchange before a response head arrived.
    #[error("upstream {target} reset the exchange: {source}")]
    UpstreamReset {
        target: String,
        #[source]
        source: hyper_util::client::legacy::Error,
    },

    /// The client's request body failed while it was being relayed upstream.
    #[error("client request body failed while forwarding to {target}: {source}")]
    ClientAborted {
        target: String,
        #[source]
        source: hyper_util::client::legacy::Error,
    },

    /// Unexpected local I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProxyError {
    /// Status code returned to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Routing { .. } | ProxyError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ProxyError::NotFound { .. } => StatusCode::NOT_FOUND,
            ProxyError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::BadRequest { .. } | ProxyError::ClientAborted { .. } => {
                StatusCode::BAD_REQUEST
            }
            ProxyError::UpstreamUnavailable { .. } | ProxyError::UpstreamReset { .. } => {
                StatusCode::BAD_GATEWAY
            }
            ProxyError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::Routing { .. } => "routing",
            ProxyError::Forbidden { .. } => "forbidden",
            ProxyError::NotFound { .. } => "not_found",
            ProxyError::MethodNotAllowed { .. } => "method_not_allowed",
            ProxyError::BadRequest { .. } => "bad_request",
            ProxyError::UpstreamUnavailable { .. } => "upstream_unavailable",
            ProxyError::UpstreamTimeout { .. } => "upstream_timeout",
            ProxyError::UpstreamReset { .. } => "upstream_reset",
            ProxyError::ClientAborted { .. } => "client_aborted",
            ProxyError::Io(_) => "io",
        }
    }

    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            ProxyError::UpstreamUnavailable { .. }
                | ProxyError::UpstreamTimeout { .. }
                | ProxyError::UpstreamReset { .. }
        )
    }

    /// True for faults of the proxy or its upstream, as opposed to bad client input.
    pub fn is_server_fault(&self) -> bool {
        self.status().is_server_error()
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = status.canonical_reason().unwrap_or("Error");
        let mut response = (status, body).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        if let ProxyError::MethodNotAllowed { .. } = self {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static("GET, HEAD"));
        }
        response
    }
}
