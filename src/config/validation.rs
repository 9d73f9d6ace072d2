//! Configuration validation.
//!
//! Serde handles syntax; this module checks semantics. Every problem is
//! collected so an operator sees the whole list at once, and a config that
//! fails here never reaches the running proxy.

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::HeaderName;
use tracing_subscriber::EnvFilter;

use crate::config::schema::ProxyConfig;
use crate::proxy::UpstreamTarget;

/// A single semantic problem, tagged with the offending field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new(
            "listener.max_connections",
            "must be greater than zero",
        ));
    }
    if config.listener.host.trim().is_empty() {
        errors.push(ValidationError::new("listener.host", "must not be empty"));
    }
    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.trim().is_empty() {
            errors.push(ValidationError::new("listener.tls.cert_path", "must not be empty"));
        }
        if tls.key_path.trim().is_empty() {
            errors.push(ValidationError::new("listener.tls.key_path", "must not be empty"));
        }
    }

    let mut prefixes = HashSet::new();
    for (i, mount) in config.static_files.iter().enumerate() {
        let field = format!("static_files[{}]", i);
        if !mount.prefix.starts_with('/') {
            errors.push(ValidationError::new(
                format!("{}.prefix", field),
                format!("'{}' must start with '/'", mount.prefix),
            ));
        } else if mount.prefix == "/" {
            errors.push(ValidationError::new(
                format!("{}.prefix", field),
                "'/' is reserved for the upstream catch-all",
            ));
        }
        if !prefixes.insert(mount.prefix.as_str()) {
            errors.push(ValidationError::new(
                format!("{}.prefix", field),
                format!("'{}' is declared more than once", mount.prefix),
            ));
        }
        if mount.root.trim().is_empty() {
            errors.push(ValidationError::new(format!("{}.root", field), "must not be empty"));
        }
        if let Some(index) = &mount.index {
            if index.is_empty() || index.contains('/') || index == ".." {
                errors.push(ValidationError::new(
                    format!("{}.index", field),
                    "must be a plain file name",
                ));
            }
        }
    }

    if let Err(e) = UpstreamTarget::parse(&config.upstream.address) {
        errors.push(ValidationError::new("upstream.address", e.to_string()));
    }
    if config.upstream.connect_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "upstream.connect_timeout_secs",
            "must be greater than zero",
        ));
    }
    if config.upstream.response_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "upstream.response_timeout_secs",
            "must be greater than zero",
        ));
    }
    // A connect failure must surface as 502 before the response deadline turns it into a 504.
    if config.upstream.connect_timeout_secs >= config.upstream.response_timeout_secs {
        errors.push(ValidationError::new(
            "upstream.connect_timeout_secs",
            "must be less than upstream.response_timeout_secs",
        ));
    }

    let headers = [
        ("forwarding.client_address_header", &config.forwarding.client_address_header),
        ("forwarding.host_header", &config.forwarding.host_header),
        ("forwarding.proto_header", &config.forwarding.proto_header),
    ];
    for (field, name) in headers {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                field,
                format!("'{}' is not a valid header name", name),
            ));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }
    if EnvFilter::try_new(&config.observability.log_level).is_err() {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("'{}' is not a valid filter", config.observability.log_level),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
