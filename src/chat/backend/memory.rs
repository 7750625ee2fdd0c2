//! In-process messaging backend.
//!
//! Every stream opened through [`MemoryBackend`] is handed to the owner as a
//! [`MemorySession`], which sees the client events the gateway sends and
//! injects server events. The unit and integration tests drive the bridge
//! through it.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures_util::{stream, Sink};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::chat::backend::{BackendStream, ChatBackend};
use crate::chat::error::SessionError;
use crate::chat::event::{ClientEvent, ServerEvent};

/// Backend that keeps every stream in memory.
#[derive(Debug)]
pub struct MemoryBackend {
    sessions: mpsc::UnboundedSender<MemorySession>,
    opened: AtomicUsize,
    refuse_open: AtomicBool,
    refuse_events: AtomicBool,
}

impl MemoryBackend {
    /// Create a backend and the receiver its sessions are delivered to.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MemorySession>) {
        let (sessions, rx) = mpsc::unbounded_channel();
        let backend = Self {
            sessions,
            opened: AtomicUsize::new(0),
            refuse_open: AtomicBool::new(false),
            refuse_events: AtomicBool::new(false),
        };
        (backend, rx)
    }

    /// Make subsequent `open` calls fail.
    pub fn refuse_open(&self, refuse: bool) {
        self.refuse_open.store(refuse, Ordering::SeqCst);
    }

    /// Make streams opened afterwards reject every client event.
    pub fn refuse_events(&self, refuse: bool) {
        self.refuse_events.store(refuse, Ordering::SeqCst);
    }

    /// Number of streams successfully opened.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatBackend for MemoryBackend {
    async fn open(&self, cancel: &CancellationToken) -> Result<BackendStream, SessionError> {
        if cancel.is_cancelled() {
            return Err(SessionError::Cancelled);
        }
        if self.refuse_open.load(Ordering::SeqCst) {
            return Err(SessionError::Connect("connection refused".to_string()));
        }

        let (client_tx, client_rx) = mpsc::unbounded_channel();
        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let send_closed = Arc::new(AtomicBool::new(false));

        let session = MemorySession {
            client_events: client_rx,
            server_events: Some(server_tx),
            send_closed: send_closed.clone(),
        };
        self.sessions
            .send(session)
            .map_err(|_| SessionError::Connect("backend shut down".to_string()))?;
        self.opened.fetch_add(1, Ordering::SeqCst);

        let sink = MemorySink {
            tx: client_tx,
            closed: send_closed,
            refuse: self.refuse_events.load(Ordering::SeqCst),
        };
        let events = stream::unfold(server_rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });

        Ok(BackendStream {
            sink: Box::pin(sink),
            events: Box::pin(events),
        })
    }
}

/// The backend's end of one stream.
#[derive(Debug)]
pub struct MemorySession {
    client_events: mpsc::UnboundedReceiver<ClientEvent>,
    server_events: Option<mpsc::UnboundedSender<Result<ServerEvent, SessionError>>>,
    send_closed: Arc<AtomicBool>,
}

impl MemorySession {
    /// Next event the gateway sent, or `None` once the send half is gone.
    pub async fn next_client_event(&mut self) -> Option<ClientEvent> {
        self.client_events.recv().await
    }

    /// Deliver a server event to the gateway.
    pub fn emit(&self, event: impl Into<ServerEvent>) -> bool {
        self.deliver(Ok(event.into()))
    }

    /// Make the gateway's next receive fail with `error`.
    pub fn fail(&self, error: SessionError) -> bool {
        self.deliver(Err(error))
    }

    /// End the server side of the stream, as a backend closing it would.
    pub fn end(&mut self) {
        self.server_events = None;
    }

    fn deliver(&self, item: Result<ServerEvent, SessionError>) -> bool {
        self.server_events
            .as_ref()
            .is_some_and(|tx| tx.send(item).is_ok())
    }

    /// Whether the gateway closed its send half.
    pub fn send_closed(&self) -> bool {
        self.send_closed.load(Ordering::SeqCst)
    }
}

struct MemorySink {
    tx: mpsc::UnboundedSender<ClientEvent>,
    closed: Arc<AtomicBool>,
    refuse: bool,
}

impl Sink<ClientEvent> for MemorySink {
    type Error = SessionError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        if self.closed.load(Ordering::SeqCst) {
            return Poll::Ready(Err(SessionError::Closed));
        }
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: ClientEvent) -> Result<(), Self::Error> {
        if self.refuse {
            return Err(SessionError::Transport("event rejected".to_string()));
        }
        self.tx
            .send(item)
            .map_err(|_| SessionError::Transport("backend stream dropped".to_string()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.closed.store(true, Ordering::SeqCst);
        Poll::Ready(Ok(()))
    }
}
