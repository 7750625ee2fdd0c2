//! Real-time chat bridge.
//!
//! # Data Flow
//! ```text
//! client WebSocket ──▶ inbound.rs ──Send──▶ session.rs ──▶ backend stream
//!                                                             │
//! client WebSocket ◀── outbound.rs ◀──ServerEvent── session.rs ◀┘
//!
//! supervisor.rs: open → join → spawn both relays → first to finish
//!                → cancel → teardown once
//! ```
//!
//! # Design Decisions
//! - One backend stream per client connection, bound to one room
//! - Relays never close shared resources; they hand their halves back
//!   and the supervisor closes them
//! - A per-connection cancellation token, child of the process shutdown
//!   token, aborts pending backend calls
//! - No retries at this layer

use std::time::Duration;

pub mod backend;
pub mod envelope;
pub mod error;
pub mod event;
pub mod inbound;
pub mod outbound;
pub mod room;
pub mod session;
pub mod supervisor;

pub use backend::{ChatBackend, MemoryBackend, MemorySession, WsChatBackend};
pub use envelope::ClientEnvelope;
pub use error::{RelayEnd, SessionError};
pub use event::{ClientEvent, ServerEvent};
pub use room::{RoomId, RoomIdError};
pub use session::{RoomSession, SessionReceiver, SessionSender, SessionState};
pub use supervisor::{Bridge, BridgeOutcome, BridgeSettings};

/// Text frame sent when the backend stream cannot be opened.
pub const STREAM_CONNECT_ERROR: &str = "stream connect error";

/// Text frame sent when the backend stream fails or ends.
pub const STREAM_CLOSED: &str = "stream closed";

/// Upper bound on a best-effort diagnostic write.
pub(crate) const DIAGNOSTIC_WRITE_TIMEOUT: Duration = Duration::from_millis(250);
