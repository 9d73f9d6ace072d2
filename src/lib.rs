//! Edge proxy library.
//!
//! A single listener in front of one upstream: configured path prefixes are
//! served from local directories, everything else is forwarded.
//!
//! ```text
//!     Client ──▶ net::Listener ──▶ http::server ──▶ routing::Router
//!                                                      │
//!                                   ┌──────────────────┴─────────────────┐
//!                                   ▼                                    ▼
//!                          static_files::StaticFiles            proxy::Forwarder ──▶ Upstream
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod proxy;
pub mod routing;
pub mod static_files;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::{ProxyContext, Shutdown};
