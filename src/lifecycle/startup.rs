//! Startup orchestration.
//!
//! # Responsibilities
//! - Turn a validated configuration into the runtime context
//! - Open static roots and the upstream pool before any traffic arrives
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)

use std::time::Duration;

use axum::http::header::InvalidHeaderName;
use axum_server::tls_rustls::RustlsAcceptor;

use crate::config::ProxyConfig;
use crate::net::tls;
use crate::proxy::{Forwarder, ForwardingHeaders, TargetError, UpstreamTarget};
use crate::routing::{Router, RouterError, RoutingRule};
use crate::static_files::StaticFiles;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("static root '{root}' for prefix '{prefix}': {source}")]
    StaticRoot {
        prefix: String,
        root: String,
        #[source]
        source: std::io::Error,
    },
    #[error("upstream address: {0}")]
    Upstream(#[from] TargetError),
    #[error("routing table: {0}")]
    Routing(#[from] RouterError),
    #[error("forwarding header: {0}")]
    Header(#[from] InvalidHeaderName),
    #[error("TLS setup: {0}")]
    Tls(#[source] std::io::Error),
}

/// Everything a request needs, shared by all connections.
#[derive(Debug)]
pub struct ProxyContext {
    pub router: Router,
    pub forwarder: Forwarder,
    pub tls: Option<RustlsAcceptor>,
    pub drain_timeout: Duration,
}

impl ProxyContext {
    pub async fn init(config: &ProxyConfig) -> Result<Self, StartupError> {
        let mut rules = Vec::with_capacity(config.static_files.len() + 1);
        for mount in &config.static_files {
            let files = StaticFiles::new(&mount.root, mount.index.clone()).map_err(|source| {
                StartupError::StaticRoot {
                    prefix: mount.prefix.clone(),
                    root: mount.root.clone(),
                    source,
                }
            })?;
            tracing::info!(
                prefix = %mount.prefix,
                root = %files.root().display(),
                "Static mount ready"
            );
            rules.push(RoutingRule::static_files(mount.prefix.clone(), files));
        }

        let target = UpstreamTarget::parse(&config.upstream.address)?;
        tracing::info!(upstream = %target, "Upstream configured");
        rules.push(RoutingRule::upstream(target));

        let router = Router::new(rules)?;
        let headers = ForwardingHeaders::from_config(&config.forwarding)?;
        let forwarder = Forwarder::new(&config.upstream, headers);
        let tls = tls::acceptor(config.listener.tls.as_ref())
            .await
            .map_err(StartupError::Tls)?;

        Ok(Self {
            router,
            forwarder,
            tls,
            drain_timeout: Duration::from_secs(config.lifecycle.drain_timeout_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticFilesConfig;
    use tempfile::TempDir;

    #[tokio::test]
    async fn builds_rules_for_every_mount() {
        let dir = TempDir::new().unwrap();
        let mut config = ProxyConfig::default();
        config.static_files.push(StaticFilesConfig {
            prefix: "/static/".into(),
            root: dir.path().display().to_string(),
            index: None,
        });

        let context = ProxyContext::init(&config).await.unwrap();
        assert_eq!(context.router.rules().len(), 2);
        assert!(context.tls.is_none());
        assert_eq!(context.router.rules()[0].prefix().as_str(), "/static/");
    }

    #[tokio::test]
    async fn missing_static_root_is_fatal() {
        let mut config = ProxyConfig::default();
        config.static_files.push(StaticFilesConfig {
            prefix: "/static/".into(),
            root: "/definitely/not/here".into(),
            index: None,
        });

        let err = ProxyContext::init(&config).await.unwrap_err();
        assert!(matches!(err, StartupError::StaticRoot { .. }));
    }
}
