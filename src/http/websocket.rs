//! Room WebSocket endpoint.
//!
//! # Responsibilities
//! - Validate the room id before anything is upgraded
//! - Complete the upgrade handshake with the client
//! - Hand the upgraded socket to the chat bridge
//!
//! # Data Flow
//! ```text
//! GET /api/v1/ws/rooms/{roomId}
//!     → parse room id (400 "invalid room id")
//!     → upgrade (framework rejection if not an upgrade request)
//!     → Bridge::run(socket, room)
//! ```

use axum::{
    extract::{
        rejection::PathRejection,
        ws::{rejection::WebSocketUpgradeRejection, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::chat::{Bridge, RoomId, RoomIdError};

/// Path of the room endpoint as registered on the router.
pub const ROOM_WS_PATH: &str = "/api/v1/ws/rooms/{room_id}";

/// State for the room endpoint.
#[derive(Clone)]
pub struct ChatState {
    pub bridge: Bridge,
    pub max_frame_bytes: usize,
}

pub async fn room_ws_handler(
    State(state): State<ChatState>,
    raw_room: Result<Path<String>, PathRejection>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let room = match raw_room
        .map_err(|_| RoomIdError)
        .and_then(|Path(raw)| raw.parse::<RoomId>())
    {
        Ok(room) => room,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            tracing::debug!(room_id = %room, error = %rejection, "WS: upgrade rejected");
            return rejection.into_response();
        }
    };

    let bridge = state.bridge;
    ws.max_message_size(state.max_frame_bytes)
        .max_frame_size(state.max_frame_bytes)
        .on_failed_upgrade(move |e| {
            tracing::warn!(room_id = %room, error = %e, "WS: upgrade failed");
        })
        .on_upgrade(move |socket| async move {
            bridge.run(socket, room).await;
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{BridgeSettings, MemoryBackend};
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::get;
    use axum::Router;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    fn app() -> (Router, Arc<MemoryBackend>) {
        let (backend, _sessions) = MemoryBackend::new();
        let backend = Arc::new(backend);
        let state = ChatState {
            bridge: Bridge::new(
                backend.clone(),
                BridgeSettings::default(),
                CancellationToken::new(),
            ),
            max_frame_bytes: 1024,
        };
        let router = Router::new()
            .route(ROOM_WS_PATH, get(room_ws_handler))
            .with_state(state);
        (router, backend)
    }

    async fn status_of(uri: &str) -> (StatusCode, String) {
        let (router, backend) = app();
        let res = router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = res.status();
        let body = axum::body::to_bytes(res.into_body(), 1024).await.unwrap();
        assert_eq!(backend.opened(), 0);
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    #[tokio::test]
    async fn bad_room_ids_are_rejected_before_upgrade() {
        for uri in [
            "/api/v1/ws/rooms/0",
            "/api/v1/ws/rooms/-1",
            "/api/v1/ws/rooms/abc",
            "/api/v1/ws/rooms/4294967296",
        ] {
            let (status, body) = status_of(uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body, "invalid room id");
        }
    }

    #[tokio::test]
    async fn plain_get_with_valid_room_is_not_upgraded() {
        let (status, body) = status_of("/api/v1/ws/rooms/42").await;
        assert!(status.is_client_error());
        assert_ne!(body, "invalid room id");
    }
}
