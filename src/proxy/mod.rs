//! Upstream forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! Request routed to the catch-all
//!     → headers.rs (drop hop-by-hop, rewrite client chain / host / proto)
//!     → target.rs (absolute URI on the upstream authority)
//!     → forwarder.rs (pooled client, timeouts, error classification)
//!     → Response head + streaming body back to the listener
//! ```

pub mod forwarder;
pub mod headers;
pub mod target;

pub use forwarder::Forwarder;
pub use headers::ForwardingHeaders;
pub use target::{TargetError, UpstreamTarget};
