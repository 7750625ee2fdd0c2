//! Client → backend relay.

use std::time::Duration;

use axum::extract::ws::Message;
use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::chat::envelope::{unix_now, ClientEnvelope};
use crate::chat::error::RelayEnd;
use crate::chat::room::RoomId;
use crate::chat::session::SessionSender;
use crate::observability::metrics;

/// Reads client frames and forwards each envelope as a `Send` event.
///
/// Malformed frames are skipped. A read error, EOF, close frame, idle
/// timeout or forwarding failure ends the relay.
pub struct InboundRelay<R> {
    room: RoomId,
    frames: R,
    sender: SessionSender,
    cancel: CancellationToken,
    idle_timeout: Option<Duration>,
}

enum Next {
    Frame(Option<Result<Message, axum::Error>>),
    Idle,
}

impl<R> InboundRelay<R>
where
    R: Stream<Item = Result<Message, axum::Error>> + Unpin + Send,
{
    pub fn new(
        room: RoomId,
        frames: R,
        sender: SessionSender,
        cancel: CancellationToken,
        idle_timeout: Option<Duration>,
    ) -> Self {
        Self {
            room,
            frames,
            sender,
            cancel,
            idle_timeout,
        }
    }

    /// Run until the relay terminates.
    pub async fn run(&mut self) -> RelayEnd {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return RelayEnd::Cancelled,
                next = next_frame(&mut self.frames, self.idle_timeout) => next,
            };

            let msg = match next {
                Next::Idle => return RelayEnd::IdleTimeout,
                Next::Frame(None) => return RelayEnd::ClientClosed,
                Next::Frame(Some(Err(e))) => return RelayEnd::ClientError(e.to_string()),
                Next::Frame(Some(Ok(msg))) => msg,
            };

            let envelope = match msg {
                Message::Text(text) => ClientEnvelope::parse(text.as_str().as_bytes()),
                Message::Binary(bytes) => ClientEnvelope::parse(&bytes),
                Message::Close(_) => return RelayEnd::ClientClosed,
                Message::Ping(_) | Message::Pong(_) => continue,
            };

            let envelope = match envelope {
                Ok(envelope) => envelope,
                Err(e) => {
                    tracing::warn!(room_id = %self.room, error = %e, "WS: unmarshal error, frame skipped");
                    metrics::record_malformed_frame();
                    continue;
                }
            };

            let event = envelope.into_event(self.room, unix_now());
            let sent = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return RelayEnd::Cancelled,
                res = self.sender.send(event) => res,
            };
            if let Err(e) = sent {
                return RelayEnd::Session(e);
            }
            metrics::record_frame(metrics::Direction::Inbound);
        }
    }

    /// Hand the owned halves back to the supervisor.
    pub fn into_parts(self) -> (R, SessionSender) {
        (self.frames, self.sender)
    }
}

async fn next_frame<R>(frames: &mut R, idle_timeout: Option<Duration>) -> Next
where
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    match idle_timeout {
        Some(limit) => match tokio::time::timeout(limit, frames.next()).await {
            Ok(frame) => Next::Frame(frame),
            Err(_) => Next::Idle,
        },
        None => Next::Frame(frames.next().await),
    }
}
