//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Upgraded client connection
//!     → connection.rs (lifecycle tracking)
//!     → Hand off to the chat bridge
//!
//! Shutdown:
//!     wait_idle() until every guard has dropped or the grace period ends
//! ```
//!
//! # Design Decisions
//! - Each bridge tracked for graceful shutdown
//! - Tracking is lock-free (atomic counter plus notify)

pub mod connection;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
