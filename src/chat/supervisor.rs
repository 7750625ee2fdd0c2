//! Connection supervisor.
//!
//! # Lifecycle
//! ```text
//! track ─▶ open session ──fail──▶ "stream connect error" ─▶ close client
//!              │
//!              ▼
//!            join ──fail──▶ close send ─▶ close client
//!              │
//!              ▼
//!    spawn inbound + outbound relays
//!              │  first to finish
//!              ▼
//!   cancel ─▶ wait other (grace, then abort) ─▶ close send ─▶ close client
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::task::{JoinError, JoinHandle};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::chat::backend::ChatBackend;
use crate::chat::error::{RelayEnd, SessionError};
use crate::chat::inbound::InboundRelay;
use crate::chat::outbound::OutboundRelay;
use crate::chat::room::RoomId;
use crate::chat::session::{RoomSession, SessionSender};
use crate::chat::{DIAGNOSTIC_WRITE_TIMEOUT, STREAM_CONNECT_ERROR};
use crate::config::ChatConfig;
use crate::net::ConnectionTracker;
use crate::observability::metrics::{self, FailureStage};

/// Per-connection timing knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeSettings {
    pub idle_timeout: Option<Duration>,
    pub ping_interval: Option<Duration>,
    pub teardown_grace: Duration,
}

impl BridgeSettings {
    pub fn from_config(config: &ChatConfig) -> Self {
        let non_zero = |secs: u64| (secs > 0).then(|| Duration::from_secs(secs));
        Self {
            idle_timeout: non_zero(config.idle_timeout_secs),
            ping_interval: non_zero(config.ping_interval_secs),
            teardown_grace: Duration::from_millis(config.teardown_grace_ms),
        }
    }
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self::from_config(&ChatConfig::default())
    }
}

/// How a bridge ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeOutcome {
    /// The backend stream could not be opened.
    ConnectFailed(SessionError),
    /// The join directive was not accepted.
    JoinFailed(SessionError),
    /// Both relays ran. `None` means the relay panicked or was aborted.
    Finished {
        inbound: Option<RelayEnd>,
        outbound: Option<RelayEnd>,
    },
}

/// Bridges client WebSocket connections to backend room streams.
///
/// Cheap to clone; one instance is shared by every connection.
#[derive(Clone)]
pub struct Bridge {
    backend: Arc<dyn ChatBackend>,
    settings: BridgeSettings,
    shutdown: CancellationToken,
    connections: ConnectionTracker,
}

type Relay<T> = Option<(RelayEnd, T)>;

enum First<A, B> {
    Inbound(Result<A, JoinError>),
    Outbound(Result<B, JoinError>),
}

impl Bridge {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        settings: BridgeSettings,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            backend,
            settings,
            shutdown,
            connections: ConnectionTracker::new(),
        }
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    /// Live bridge tracking, used by shutdown to drain.
    pub fn connections(&self) -> &ConnectionTracker {
        &self.connections
    }

    /// Serve one upgraded client connection until either side ends.
    pub async fn run<S>(&self, socket: S, room: RoomId) -> BridgeOutcome
    where
        S: Stream<Item = Result<Message, axum::Error>>
            + Sink<Message, Error = axum::Error>
            + Send
            + Unpin
            + 'static,
    {
        let guard = self.connections.track();
        let span = tracing::info_span!("bridge", room_id = %room, connection_id = %guard.id());
        let outcome = self.serve(socket, room).instrument(span).await;
        drop(guard);
        outcome
    }

    async fn serve<S>(&self, socket: S, room: RoomId) -> BridgeOutcome
    where
        S: Stream<Item = Result<Message, axum::Error>>
            + Sink<Message, Error = axum::Error>
            + Send
            + Unpin
            + 'static,
    {
        tracing::info!(room_id = %room, "WS: client connected");
        let cancel = self.shutdown.child_token();
        let (mut ws_tx, ws_rx) = socket.split();

        let mut session = match RoomSession::open(self.backend.as_ref(), room, cancel.clone()).await
        {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(room_id = %room, error = %e, "WS: stream connect error");
                metrics::record_session_failure(FailureStage::Connect);
                let _ = time::timeout(
                    DIAGNOSTIC_WRITE_TIMEOUT,
                    ws_tx.send(Message::Text(STREAM_CONNECT_ERROR.into())),
                )
                .await;
                self.close_client(&mut ws_tx).await;
                return BridgeOutcome::ConnectFailed(e);
            }
        };

        if let Err(e) = session.join().await {
            tracing::error!(room_id = %room, error = %e, "WS: join room failed");
            metrics::record_session_failure(FailureStage::Join);
            if let Err(close_err) = session.close_send().await {
                tracing::debug!(room_id = %room, error = %close_err, "WS: close send after failed join");
            }
            self.close_client(&mut ws_tx).await;
            return BridgeOutcome::JoinFailed(e);
        }
        tracing::debug!(room_id = %room, "WS: joined room");

        let (sender, receiver) = session.split();
        let mut inbound = InboundRelay::new(
            room,
            ws_rx,
            sender,
            cancel.clone(),
            self.settings.idle_timeout,
        );
        let mut outbound = OutboundRelay::new(
            room,
            ws_tx,
            receiver,
            cancel.clone(),
            self.settings.ping_interval,
        );

        let mut inbound_task = tokio::spawn(async move {
            let end = inbound.run().await;
            (end, inbound)
        });
        let mut outbound_task = tokio::spawn(async move {
            let end = outbound.run().await;
            (end, outbound)
        });

        let first = tokio::select! {
            res = &mut inbound_task => First::Inbound(res),
            res = &mut outbound_task => First::Outbound(res),
        };
        cancel.cancel();

        let grace = self.settings.teardown_grace;
        let (inbound, outbound) = match first {
            First::Inbound(res) => (settle(res, "inbound"), finish(outbound_task, grace, "outbound").await),
            First::Outbound(res) => (finish(inbound_task, grace, "inbound").await, settle(res, "outbound")),
        };

        if let Some((end, _)) = inbound.as_ref().filter(|(end, _)| !end.is_clean()) {
            tracing::warn!(room_id = %room, reason = %end, "WS: inbound relay failed");
            metrics::record_session_failure(FailureStage::Relay);
        }
        if let Some((end, _)) = outbound.as_ref().filter(|(end, _)| !end.is_clean()) {
            tracing::warn!(room_id = %room, reason = %end, "WS: outbound relay failed");
            metrics::record_session_failure(FailureStage::Relay);
        }

        let (inbound_end, sender) = split_relay(inbound, |relay| relay.into_parts().1);
        let (outbound_end, ws_tx) = split_relay(outbound, |relay| relay.into_parts().0);

        if let Some(sender) = sender {
            self.close_session(room, sender).await;
        }
        if let Some(mut ws_tx) = ws_tx {
            self.close_client(&mut ws_tx).await;
        }

        tracing::info!(
            room_id = %room,
            inbound = ?inbound_end,
            outbound = ?outbound_end,
            "WS: client disconnected"
        );
        BridgeOutcome::Finished {
            inbound: inbound_end,
            outbound: outbound_end,
        }
    }

    async fn close_session(&self, room: RoomId, mut sender: SessionSender) {
        if sender.is_send_closed() {
            return;
        }
        match time::timeout(self.settings.teardown_grace, sender.close_send()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(room_id = %room, error = %e, "WS: close send"),
            Err(_) => tracing::debug!(room_id = %room, "WS: close send timed out"),
        }
    }

    async fn close_client<W>(&self, ws_tx: &mut W)
    where
        W: Sink<Message, Error = axum::Error> + Unpin,
    {
        let _ = time::timeout(self.settings.teardown_grace, ws_tx.close()).await;
    }
}

fn settle<T>(res: Result<(RelayEnd, T), JoinError>, relay: &'static str) -> Relay<T> {
    match res {
        Ok(done) => Some(done),
        Err(e) => {
            tracing::error!(relay, error = %e, "WS: relay task failed");
            None
        }
    }
}

/// Wait for a cancelled relay, aborting it once `grace` runs out.
async fn finish<T>(
    mut task: JoinHandle<(RelayEnd, T)>,
    grace: Duration,
    relay: &'static str,
) -> Relay<T> {
    match time::timeout(grace, &mut task).await {
        Ok(res) => settle(res, relay),
        Err(_) => {
            task.abort();
            tracing::warn!(relay, "WS: relay did not stop in time, aborted");
            None
        }
    }
}

fn split_relay<T, P>(relay: Relay<T>, part: impl FnOnce(T) -> P) -> (Option<RelayEnd>, Option<P>) {
    match relay {
        Some((end, relay)) => (Some(end), Some(part(relay))),
        None => (None, None),
    }
}
