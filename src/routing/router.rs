//! Route lookup and dispatch.
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) path prefix scan (acceptable for typical route counts)
//! - Rules are stably sorted by prefix length at construction, so the first
//!   match is also the longest-prefix match and the catch-all is always last
//! - Explicit `ProxyError::Routing` rather than a silent default

use std::cmp::Reverse;

use crate::error::ProxyError;
use crate::proxy::UpstreamTarget;
use crate::routing::matcher::PathPrefix;
use crate::static_files::StaticFiles;

/// What a matched rule does with the request.
#[derive(Debug)]
pub enum Handler {
    /// Answer from a local directory.
    StaticFile(StaticFiles),
    /// Forward to the upstream backend.
    ProxyUpstream(UpstreamTarget),
}

impl Handler {
    /// Short label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Handler::StaticFile(_) => "static",
            Handler::ProxyUpstream(_) => "upstream",
        }
    }
}

/// A (prefix, handler) pair.
#[derive(Debug)]
pub struct RoutingRule {
    prefix: PathPrefix,
    handler: Handler,
}

impl RoutingRule {
    pub fn new(prefix: PathPrefix, handler: Handler) -> Self {
        Self { prefix, handler }
    }

    /// Serve `prefix` from `files`.
    pub fn static_files(prefix: impl Into<String>, files: StaticFiles) -> Self {
        Self::new(PathPrefix::new(prefix), Handler::StaticFile(files))
    }

    /// The "/" catch-all forwarding to `target`.
    pub fn upstream(target: UpstreamTarget) -> Self {
        Self::new(PathPrefix::new("/"), Handler::ProxyUpstream(target))
    }

    pub fn prefix(&self) -> &PathPrefix {
        &self.prefix
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }
}

/// Reasons a rule table is rejected at startup.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    #[error("no catch-all upstream rule for '/'")]
    MissingCatchAll,
    #[error("more than one rule claims '/'")]
    DuplicateCatchAll,
    #[error("the '/' catch-all must forward to the upstream")]
    StaticCatchAll,
    #[error("prefix '{0}' is declared more than once")]
    DuplicatePrefix(String),
}

/// The outcome of a successful lookup.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub rule: &'a RoutingRule,
    /// Path left after the matched prefix.
    pub remainder: &'a str,
}

/// The compiled routing table.
#[derive(Debug)]
pub struct Router {
    rules: Vec<RoutingRule>,
}

impl Router {
    /// Build the table, enforcing that exactly one upstream rule covers "/".
    pub fn new(mut rules: Vec<RoutingRule>) -> Result<Self, RouterError> {
        let mut catch_alls = rules.iter().filter(|r| r.prefix.is_catch_all());
        match (catch_alls.next(), catch_alls.next()) {
            (None, _) => return Err(RouterError::MissingCatchAll),
            (Some(_), Some(_)) => return Err(RouterError::DuplicateCatchAll),
            (Some(rule), None) => {
                if !matches!(rule.handler, Handler::ProxyUpstream(_)) {
                    return Err(RouterError::StaticCatchAll);
                }
            }
        }

        for (i, rule) in rules.iter().enumerate() {
            if rules[..i].iter().any(|other| other.prefix == rule.prefix) {
                return Err(RouterError::DuplicatePrefix(rule.prefix.to_string()));
            }
        }

        rules.sort_by_key(|rule| Reverse(rule.prefix.specificity()));

        for rule in &rules {
            tracing::debug!(
                prefix = %rule.prefix,
                handler = rule.handler.label(),
                "Route registered"
            );
        }

        Ok(Self { rules })
    }

    /// Select the rule for `path`.
    pub fn route<'a>(&'a self, path: &'a str) -> Result<RouteMatch<'a>, ProxyError> {
        self.rules
            .iter()
            .find_map(|rule| {
                rule.prefix
                    .strip(path)
                    .map(|remainder| RouteMatch { rule, remainder })
            })
            .ok_or_else(|| ProxyError::Routing {
                path: path.to_string(),
            })
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[RoutingRule] {
        &self.rules
    }
}
