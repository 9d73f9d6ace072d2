//! Header rewriting for forwarded requests.
//!
//! # Rules
//! 1. Client-address chain: prior hops are kept, the direct client's IP is appended
//! 2. Original host: the Host the client sent (":authority" for HTTP/2)
//! 3. Original protocol: the scheme this listener terminated
//!
//! Everything else passes through untouched, except hop-by-hop headers,
//! which only describe the connection they arrived on.

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Uri};

use crate::config::ForwardingConfig;
use crate::error::ProxyError;
use crate::net::ClientConnection;

/// Headers that are meaningful for a single connection only.
const HOP_BY_HOP: [HeaderName; 6] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::TE,
    header::TRAILER,
    header::UPGRADE,
];

/// Remove hop-by-hop headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect();

    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// The host the client addressed: last `Host` header, else the URI authority.
pub fn original_host(headers: &HeaderMap, uri: &Uri) -> Option<HeaderValue> {
    headers
        .get_all(header::HOST)
        .iter()
        .last()
        .cloned()
        .or_else(|| {
            uri.authority()
                .and_then(|authority| HeaderValue::from_str(authority.as_str()).ok())
        })
}

/// Configured names for the three forwarding headers.
#[derive(Debug, Clone)]
pub struct ForwardingHeaders {
    client_address: HeaderName,
    host: HeaderName,
    proto: HeaderName,
}

impl ForwardingHeaders {
    pub fn new(client_address: HeaderName, host: HeaderName, proto: HeaderName) -> Self {
        Self {
            client_address,
            host,
            proto,
        }
    }

    pub fn from_config(config: &ForwardingConfig) -> Result<Self, header::InvalidHeaderName> {
        Ok(Self::new(
            HeaderName::from_bytes(config.client_address_header.as_bytes())?,
            HeaderName::from_bytes(config.host_header.as_bytes())?,
            HeaderName::from_bytes(config.proto_header.as_bytes())?,
        ))
    }

    /// Apply the rewrite rules to a forwarded header map.
    pub fn apply(
        &self,
        headers: &mut HeaderMap,
        client: &ClientConnection,
        original_host: Option<HeaderValue>,
    ) -> Result<(), ProxyError> {
        let chain = self.client_chain(headers, client)?;
        headers.insert(self.client_address.clone(), chain);

        if let Some(host) = original_host {
            headers.insert(self.host.clone(), host);
        }

        headers.insert(
            self.proto.clone(),
            HeaderValue::from_static(client.scheme.as_str()),
        );
        Ok(())
    }

    fn client_chain(
        &self,
        headers: &HeaderMap,
        client: &ClientConnection,
    ) -> Result<HeaderValue, ProxyError> {
        let mut chain: Vec<u8> = Vec::new();
        for value in headers.get_all(&self.client_address) {
            let hops = value.as_bytes().trim_ascii();
            if hops.is_empty() {
                continue;
            }
            if !chain.is_empty() {
                chain.extend_from_slice(b", ");
            }
            chain.extend_from_slice(hops);
        }
        if !chain.is_empty() {
            chain.extend_from_slice(b", ");
        }
        chain.extend_from_slice(client.peer.ip().to_canonical().to_string().as_bytes());

        HeaderValue::from_bytes(&chain).map_err(|_| ProxyError::BadRequest {
            reason: "unusable client address header",
        })
    }
}

impl Default for ForwardingHeaders {
    fn default() -> Self {
        Self::new(
            HeaderName::from_static("x-forwarded-for"),
            header::HOST,
            HeaderName::from_static("x-forwarded-proto"),
        )
    }
}
