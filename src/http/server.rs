//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, CORS)
//! - Bind server to listener
//! - Stop accepting on shutdown and drain live bridges

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::FromRef,
    http::Request,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::Span;

use crate::chat::{Bridge, BridgeSettings, ChatBackend};
use crate::config::GatewayConfig;
use crate::http::cors::cors_layer;
use crate::http::proxy::{proxy_handler, ProxyState};
use crate::http::request::{request_id, UuidRequestId, X_REQUEST_ID};
use crate::http::websocket::{room_ws_handler, ChatState, ROOM_WS_PATH};
use crate::lifecycle::Shutdown;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub chat: ChatState,
    pub proxy: ProxyState,
}

impl FromRef<AppState> for ChatState {
    fn from_ref(state: &AppState) -> Self {
        state.chat.clone()
    }
}

impl FromRef<AppState> for ProxyState {
    fn from_ref(state: &AppState) -> Self {
        state.proxy.clone()
    }
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    bridge: Bridge,
    shutdown: Shutdown,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig, backend: Arc<dyn ChatBackend>, shutdown: Shutdown) -> Self {
        let bridge = Bridge::new(
            backend,
            BridgeSettings::from_config(&config.chat),
            shutdown.token(),
        );

        let state = AppState {
            chat: ChatState {
                bridge: bridge.clone(),
                max_frame_bytes: config.chat.max_frame_bytes,
            },
            proxy: ProxyState::new(&config),
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            bridge,
            shutdown,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route(ROOM_WS_PATH, get(room_ws_handler))
            .fallback(proxy_handler)
            .with_state(state)
            .layer(cors_layer(&config.cors))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
    }

    /// The fully layered router, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Returns after shutdown is triggered and live bridges have drained
    /// or the grace period has run out.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();
        let token = self.shutdown.token();
        let server = axum::serve(listener, app)
            .with_graceful_shutdown(async move { token.cancelled().await })
            .into_future();

        let grace = Duration::from_secs(self.config.timeouts.shutdown_grace_secs);
        let shutdown = self.shutdown.clone();
        tokio::select! {
            res = server => res?,
            _ = async {
                shutdown.wait().await;
                tokio::time::sleep(grace).await;
            } => {
                tracing::warn!("HTTP connections still open after shutdown grace");
            }
        }

        let connections = self.bridge.connections();
        if !connections.wait_idle(grace).await {
            tracing::warn!(
                active = connections.active_count(),
                "Bridges still active after shutdown grace"
            );
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

fn make_span(request: &Request<Body>) -> Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %request_id(request.headers()),
    )
}
