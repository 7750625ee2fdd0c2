//! WebSocket transport to the messaging backend.
//!
//! Client events go out as JSON text messages; every text or binary message
//! that comes back is one server event. A close message ends the stream.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{future, SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;

use crate::chat::backend::{BackendStream, ChatBackend};
use crate::chat::error::SessionError;
use crate::chat::event::{ClientEvent, ServerEvent};

/// Dials the messaging backend over WebSocket, one connection per stream.
#[derive(Debug, Clone)]
pub struct WsChatBackend {
    endpoint: String,
    connect_timeout: Duration,
}

impl WsChatBackend {
    pub fn new(endpoint: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            connect_timeout,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatBackend for WsChatBackend {
    async fn open(&self, cancel: &CancellationToken) -> Result<BackendStream, SessionError> {
        let connect = tokio::time::timeout(
            self.connect_timeout,
            tokio_tungstenite::connect_async(self.endpoint.as_str()),
        );

        let (socket, _response) = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SessionError::Cancelled),
            res = connect => match res {
                Ok(Ok(pair)) => pair,
                Ok(Err(e)) => return Err(SessionError::Connect(e.to_string())),
                Err(_) => return Err(SessionError::ConnectTimeout(self.connect_timeout.as_secs())),
            },
        };

        tracing::debug!(endpoint = %self.endpoint, "Backend stream opened");

        let (tx, rx) = socket.split();

        let sink = tx
            .sink_map_err(|e| SessionError::Transport(e.to_string()))
            .with(|event: ClientEvent| future::ready(encode(&event)));

        let events = rx
            .take_while(|msg| future::ready(!matches!(msg, Ok(Message::Close(_)))))
            .filter_map(|msg| future::ready(decode(msg)));

        Ok(BackendStream {
            sink: Box::pin(sink),
            events: Box::pin(events),
        })
    }
}

fn encode(event: &ClientEvent) -> Result<Message, SessionError> {
    serde_json::to_string(event)
        .map(|text| Message::Text(text.into()))
        .map_err(|e| SessionError::Codec(e.to_string()))
}

fn decode(msg: Result<Message, WsError>) -> Option<Result<ServerEvent, SessionError>> {
    let parse = |bytes: &[u8]| {
        serde_json::from_slice::<serde_json::Value>(bytes)
            .map(ServerEvent::new)
            .map_err(|e| SessionError::Codec(e.to_string()))
    };

    match msg {
        Ok(Message::Text(text)) => Some(parse(text.as_bytes())),
        Ok(Message::Binary(bytes)) => Some(parse(&bytes)),
        Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_) | Message::Close(_)) => None,
        Err(e) => Some(Err(SessionError::Transport(e.to_string()))),
    }
}
