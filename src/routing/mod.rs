//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → router.rs (ordered rule scan)
//!     → matcher.rs (prefix test, remainder extraction)
//!     → Return: RouteMatch { StaticFile | ProxyUpstream, remainder }
//!
//! Route Compilation (at startup):
//!     [[static_files]] + [upstream]
//!     → one StaticFile rule per mount, one "/" ProxyUpstream catch-all
//!     → Sort by prefix length (longest first)
//!     → Freeze as immutable Router
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route
//! - First match wins, and every path matches at least the catch-all

pub mod matcher;
pub mod router;

pub use matcher::PathPrefix;
pub use router::{Handler, RouteMatch, Router, RouterError, RoutingRule};
