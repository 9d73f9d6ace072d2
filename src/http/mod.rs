//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (hyper auto connection: HTTP/1.1 or HTTP/2)
//!     → request.rs (assign X-Request-Id)
//!     → routing (longest prefix wins)
//!     → static_files or proxy::Forwarder
//!     → observability::access (byte counting, access record)
//!     → Send to client
//! ```

pub mod request;
pub mod server;

pub use request::{RequestIdExt, UuidRequestId, X_REQUEST_ID};
pub use server::HttpServer;
