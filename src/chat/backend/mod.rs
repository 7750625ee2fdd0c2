//! Transport to the messaging backend.
//!
//! # Data Flow
//! ```text
//! RoomSession
//!     → ChatBackend::open (one duplex stream per connection)
//!     → EventSink   (ClientEvent out)
//!     → EventStream (ServerEvent in)
//! ```
//!
//! # Design Decisions
//! - The backend handle is process-wide and read-only after init
//! - Streams opened from it are independent and never shared
//! - Opening honours the connection's cancellation token

pub mod memory;
pub mod ws;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Sink, Stream};
use tokio_util::sync::CancellationToken;

use crate::chat::error::SessionError;
use crate::chat::event::{ClientEvent, ServerEvent};

pub use memory::{MemoryBackend, MemorySession};
pub use ws::WsChatBackend;

/// Outbound half of a backend stream.
pub type EventSink = Pin<Box<dyn Sink<ClientEvent, Error = SessionError> + Send>>;

/// Inbound half of a backend stream. Ends when the backend closes.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<ServerEvent, SessionError>> + Send>>;

/// A freshly opened duplex stream.
pub struct BackendStream {
    pub sink: EventSink,
    pub events: EventStream,
}

/// Something that can open chat streams against the messaging service.
#[async_trait]
pub trait ChatBackend: Send + Sync + 'static {
    /// Open one bidirectional stream. Must return promptly once `cancel`
    /// fires.
    async fn open(&self, cancel: &CancellationToken) -> Result<BackendStream, SessionError>;
}
