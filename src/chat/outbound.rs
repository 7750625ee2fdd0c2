//! Backend → client relay.

use std::time::Duration;

use axum::extract::ws::Message;
use futures_util::{Sink, SinkExt};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::chat::error::{RelayEnd, SessionError};
use crate::chat::event::ServerEvent;
use crate::chat::room::RoomId;
use crate::chat::session::SessionReceiver;
use crate::chat::{DIAGNOSTIC_WRITE_TIMEOUT, STREAM_CLOSED};
use crate::observability::metrics;

/// Receives server events and writes each as one JSON text frame, in order.
pub struct OutboundRelay<W> {
    room: RoomId,
    sink: W,
    receiver: SessionReceiver,
    cancel: CancellationToken,
    ping_interval: Option<Duration>,
}

enum Step {
    Event(Result<ServerEvent, SessionError>),
    Ping,
}

impl<W> OutboundRelay<W>
where
    W: Sink<Message, Error = axum::Error> + Unpin + Send,
{
    pub fn new(
        room: RoomId,
        sink: W,
        receiver: SessionReceiver,
        cancel: CancellationToken,
        ping_interval: Option<Duration>,
    ) -> Self {
        Self {
            room,
            sink,
            receiver,
            cancel,
            ping_interval,
        }
    }

    /// Run until the relay terminates.
    pub async fn run(&mut self) -> RelayEnd {
        let mut keepalive = self.ping_interval.map(|period| {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        loop {
            let step = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return RelayEnd::Cancelled,
                res = self.receiver.receive() => Step::Event(res),
                _ = tick(&mut keepalive) => Step::Ping,
            };

            let frame = match step {
                Step::Ping => Message::Ping(Default::default()),
                Step::Event(Ok(event)) => match event.to_json() {
                    Ok(json) => Message::Text(json.into()),
                    Err(e) => {
                        tracing::warn!(room_id = %self.room, error = %e, "WS: event encode error, skipped");
                        continue;
                    }
                },
                Step::Event(Err(SessionError::Cancelled)) => return RelayEnd::Cancelled,
                Step::Event(Err(e)) => {
                    tracing::info!(room_id = %self.room, error = %e, "WS: stream recv error");
                    self.send_diagnostic(STREAM_CLOSED).await;
                    return RelayEnd::Session(e);
                }
            };

            let is_event = matches!(frame, Message::Text(_));
            let written = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return RelayEnd::Cancelled,
                res = self.sink.send(frame) => res,
            };
            if let Err(e) = written {
                tracing::info!(room_id = %self.room, error = %e, "WS: write error");
                return RelayEnd::WriteFailed(e.to_string());
            }
            if is_event {
                metrics::record_frame(metrics::Direction::Outbound);
            }
        }
    }

    /// Attempt one text frame; failures and slow peers are ignored.
    async fn send_diagnostic(&mut self, text: &'static str) {
        let _ = time::timeout(
            DIAGNOSTIC_WRITE_TIMEOUT,
            self.sink.send(Message::Text(text.into())),
        )
        .await;
    }

    /// Hand the owned halves back to the supervisor.
    pub fn into_parts(self) -> (W, SessionReceiver) {
        (self.sink, self.receiver)
    }
}

async fn tick(keepalive: &mut Option<Interval>) {
    match keepalive {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
