//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → tls.rs (optional TLS handshake, decides http vs https)
//!     → connection.rs (ClientConnection identity, lifetime tracking)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked for graceful shutdown
//! - TLS is optional; the scheme it implies travels with every request

pub mod connection;
pub mod listener;
pub mod tls;

pub use connection::{ClientConnection, ConnectionGuard, ConnectionId, ConnectionTracker, ListenerScheme};
pub use listener::{ConnectionPermit, Listener, ListenerError};
