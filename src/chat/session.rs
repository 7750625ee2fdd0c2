//! Room stream session.
//!
//! # State Machine
//! ```text
//! Opening ──join──▶ Joined ──first send──▶ Active
//!    │                 │                      │
//!    └──── any send/receive error, cancel ────┴──▶ Closed (terminal)
//! ```
//!
//! # Design Decisions
//! - One session per connection, bound to one room for its whole life
//! - After the join the session splits into a send half and a receive half,
//!   so one writer and one reader run concurrently without locks
//! - The state is shared by both halves; a failure on either side closes it

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::chat::backend::{ChatBackend, EventSink, EventStream};
use crate::chat::error::SessionError;
use crate::chat::event::{ClientEvent, ServerEvent};
use crate::chat::room::RoomId;

/// Lifecycle of a room session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Opening = 0,
    Joined = 1,
    Active = 2,
    Closed = 3,
}

impl SessionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Opening,
            1 => Self::Joined,
            2 => Self::Active,
            _ => Self::Closed,
        }
    }
}

/// State cell shared by both halves of a session.
#[derive(Debug, Clone)]
struct SharedState(Arc<AtomicU8>);

impl SharedState {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(SessionState::Opening as u8)))
    }

    fn get(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move `from → to`; fails if another transition got there first.
    fn advance(&self, from: SessionState, to: SessionState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn close(&self) {
        self.0.store(SessionState::Closed as u8, Ordering::Release);
    }
}

/// A session before it is split, used for the join handshake.
pub struct RoomSession {
    room: RoomId,
    sink: EventSink,
    events: EventStream,
    state: SharedState,
    cancel: CancellationToken,
}

impl RoomSession {
    /// Open a backend stream for `room`. Aborted when `cancel` fires.
    pub async fn open(
        backend: &dyn ChatBackend,
        room: RoomId,
        cancel: CancellationToken,
    ) -> Result<Self, SessionError> {
        let stream = backend.open(&cancel).await?;
        Ok(Self {
            room,
            sink: stream.sink,
            events: stream.events,
            state: SharedState::new(),
            cancel,
        })
    }

    pub fn room(&self) -> RoomId {
        self.room
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// Send the one `Join` for this session's room.
    pub async fn join(&mut self) -> Result<(), SessionError> {
        match self.state.get() {
            SessionState::Opening => {}
            SessionState::Closed => return Err(SessionError::Closed),
            SessionState::Joined | SessionState::Active => {
                return Err(SessionError::Protocol("room already joined"))
            }
        }

        let res = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(SessionError::Cancelled),
            res = self.sink.send(ClientEvent::join(self.room)) => res,
        };

        match res {
            Ok(()) => {
                self.state.advance(SessionState::Opening, SessionState::Joined);
                Ok(())
            }
            Err(e) => {
                self.state.close();
                Err(e)
            }
        }
    }

    /// Close the send half without splitting, for a failed handshake.
    pub async fn close_send(self) -> Result<(), SessionError> {
        let (mut sender, _receiver) = self.split();
        sender.close_send().await
    }

    /// Split into the halves the two relays own.
    pub fn split(self) -> (SessionSender, SessionReceiver) {
        let sender = SessionSender {
            room: self.room,
            sink: Some(self.sink),
            state: self.state.clone(),
        };
        let receiver = SessionReceiver {
            room: self.room,
            events: self.events,
            state: self.state,
            cancel: self.cancel,
        };
        (sender, receiver)
    }
}

/// Send half of a session.
pub struct SessionSender {
    room: RoomId,
    sink: Option<EventSink>,
    state: SharedState,
}

impl SessionSender {
    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// Forward a `Send` event to the backend.
    ///
    /// Joins are rejected; the join happens once, before the split.
    pub async fn send(&mut self, event: ClientEvent) -> Result<(), SessionError> {
        let sink = match (self.state.get(), self.sink.as_mut()) {
            (SessionState::Closed, _) | (_, None) => return Err(SessionError::Closed),
            (SessionState::Opening, _) => return Err(SessionError::Protocol("send before join")),
            (_, Some(sink)) => sink,
        };
        if event.is_join() {
            return Err(SessionError::Protocol("room already joined"));
        }
        if event.room_id() != self.room {
            return Err(SessionError::Protocol("event for another room"));
        }

        match sink.send(event).await {
            Ok(()) => {
                self.state.advance(SessionState::Joined, SessionState::Active);
                Ok(())
            }
            Err(e) => {
                self.state.close();
                Err(e)
            }
        }
    }

    /// Close the send half. A second call returns [`SessionError::Closed`].
    pub async fn close_send(&mut self) -> Result<(), SessionError> {
        let mut sink = self.sink.take().ok_or(SessionError::Closed)?;
        self.state.close();
        sink.close().await
    }

    pub fn is_send_closed(&self) -> bool {
        self.sink.is_none()
    }
}

/// Receive half of a session.
pub struct SessionReceiver {
    room: RoomId,
    events: EventStream,
    state: SharedState,
    cancel: CancellationToken,
}

impl SessionReceiver {
    pub fn room(&self) -> RoomId {
        self.room
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// Wait for the next server event.
    ///
    /// Stream end is reported as [`SessionError::Ended`]; cancellation of the
    /// connection unblocks a pending receive with [`SessionError::Cancelled`].
    pub async fn receive(&mut self) -> Result<ServerEvent, SessionError> {
        if self.state.get() == SessionState::Closed {
            return Err(SessionError::Closed);
        }

        let next = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                self.state.close();
                return Err(SessionError::Cancelled);
            }
            next = self.events.next() => next,
        };

        match next {
            Some(Ok(event)) => Ok(event),
            Some(Err(e)) => {
                self.state.close();
                Err(e)
            }
            None => {
                self.state.close();
                Err(SessionError::Ended)
            }
        }
    }
}
