//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the edge proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the edge proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Path prefixes served from local directories.
    pub static_files: Vec<StaticFilesConfig>,

    /// The single backend every non-static request is forwarded to.
    pub upstream: UpstreamConfig,

    /// Names of the headers rewritten on forwarded requests.
    pub forwarding: ForwardingConfig,

    /// Startup and shutdown behavior.
    pub lifecycle: LifecycleConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Host or IP to bind (e.g., "0.0.0.0").
    pub host: String,

    /// Port to bind. Zero picks an ephemeral port.
    pub port: u16,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl ListenerConfig {
    /// `host:port` as handed to the socket layer.
    pub fn bind_address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_connections: 10_000,
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// A path prefix served straight from a directory.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StaticFilesConfig {
    /// Request path prefix, e.g. "/static/".
    pub prefix: String,

    /// Directory the prefix maps onto.
    pub root: String,

    /// File served for directory requests. Directories 404 when unset.
    #[serde(default)]
    pub index: Option<String>,
}

/// Upstream backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Backend address as `host:port` (an `http://` prefix is accepted).
    pub address: String,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Time allowed for the response head to arrive, in seconds.
    pub response_timeout_secs: u64,

    /// Idle keep-alive connections retained for the backend.
    pub pool_max_idle: usize,

    /// How long an idle pooled connection is kept, in seconds.
    pub pool_idle_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8000".to_string(),
            connect_timeout_secs: 5,
            response_timeout_secs: 60,
            pool_max_idle: 32,
            pool_idle_timeout_secs: 90,
        }
    }
}

/// Header names used by the forwarding rewrite rules.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ForwardingConfig {
    /// Header carrying the comma-separated client address chain.
    pub client_address_header: String,

    /// Header carrying the Host the client asked for.
    pub host_header: String,

    /// Header carrying the scheme the listener terminated.
    pub proto_header: String,
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            client_address_header: "X-Forwarded-For".to_string(),
            host_header: "Host".to_string(),
            proto_header: "X-Forwarded-Proto".to_string(),
        }
    }
}

/// Lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// How long in-flight connections may take to finish after shutdown starts.
    pub drain_timeout_secs: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable, one line per event.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter directive (trace, debug, info, warn, error or a full env-filter).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: ProxyConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.port, 8080);
        assert!(config.static_files.is_empty());
        assert_eq!(config.forwarding.client_address_header, "X-Forwarded-For");
        assert_eq!(config.observability.log_format, LogFormat::Text);
    }

    #[test]
    fn full_document_parses() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [listener]
            port = 9000

            [[static_files]]
            prefix = "/static/"
            root = "/app/static"

            [upstream]
            address = "backend:8000"
            response_timeout_secs = 10

            [forwarding]
            host_header = "X-Forwarded-Host"

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.bind_address(), "0.0.0.0:9000");
        assert_eq!(config.static_files[0].prefix, "/static/");
        assert_eq!(config.static_files[0].index, None);
        assert_eq!(config.upstream.address, "backend:8000");
        assert_eq!(config.upstream.connect_timeout_secs, 5);
        assert_eq!(config.forwarding.host_header, "X-Forwarded-Host");
        assert_eq!(config.forwarding.proto_header, "X-Forwarded-Proto");
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }

    #[test]
    fn ipv6_host_is_bracketed() {
        let listener = ListenerConfig {
            host: "::1".into(),
            port: 80,
            ..ListenerConfig::default()
        };
        assert_eq!(listener.bind_address(), "[::1]:80");
    }
}
