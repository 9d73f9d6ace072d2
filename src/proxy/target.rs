//! The upstream backend address.

use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::Uri;

use crate::error::ProxyError;

/// Why an upstream address was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    #[error("address must not be empty")]
    Empty,
    #[error("'{0}' is not a host:port address")]
    Invalid(String),
    #[error("'{0}' has no port")]
    MissingPort(String),
    #[error("'{0}' uses an unsupported scheme; upstreams are plain http")]
    UnsupportedScheme(String),
}

/// A single backend endpoint, written as `host:port` or `http://host:port`.
///
/// The host may be a name (resolved per connection by the connector) or an IP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    authority: Authority,
}

impl UpstreamTarget {
    pub fn parse(address: &str) -> Result<Self, TargetError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(TargetError::Empty);
        }

        let rest = match address.split_once("://") {
            Some(("http", rest)) => rest,
            Some(_) => return Err(TargetError::UnsupportedScheme(address.to_string())),
            None => address,
        };
        let rest = rest.strip_suffix('/').unwrap_or(rest);

        if rest.is_empty() || rest.contains(['@', '/', '?', '#']) {
            return Err(TargetError::Invalid(address.to_string()));
        }
        let authority: Authority = rest
            .parse()
            .map_err(|_| TargetError::Invalid(address.to_string()))?;
        if authority.port_u16().is_none() {
            return Err(TargetError::MissingPort(address.to_string()));
        }

        Ok(Self { authority })
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Absolute URI for forwarding a request target to this upstream.
    pub fn uri_for(&self, path_and_query: Option<&PathAndQuery>) -> Result<Uri, ProxyError> {
        let path_and_query = path_and_query
            .cloned()
            .unwrap_or_else(|| PathAndQuery::from_static("/"));

        Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
            .map_err(|_| ProxyError::BadRequest {
                reason: "request target cannot be forwarded",
            })
    }
}

impl std::fmt::Display for UpstreamTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.authority)
    }
}
