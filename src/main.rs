//! Room gateway (v1)
//!
//! Edge gateway built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────┐
//!                         │                   ROOM GATEWAY                   │
//!                         │                                                  │
//!   Browser ──────────────┼─▶ http server ──▶ /api/v1/ws/rooms/{id}          │
//!   (HTTP / WebSocket)    │   request id        │                            │
//!                         │   trace, CORS       ▼                            │
//!                         │               chat bridge ◀──────────────────────┼──▶ messaging
//!                         │              (supervisor, relays, session)       │    backend
//!                         │                                                  │
//!                         │               fallback ──▶ route table ──────────┼──▶ user REST
//!                         │                            (exact / prefix)      │    service
//!                         │                                                  │
//!                         │  config · logging · metrics · lifecycle          │
//!                         └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use room_gateway::chat::WsChatBackend;
use room_gateway::config::load_config;
use room_gateway::lifecycle::{spawn_signal_handler, Shutdown};
use room_gateway::observability::{logging, metrics};
use room_gateway::HttpServer;

#[derive(Parser, Debug)]
#[command(author, version, about = "Room gateway: REST proxy and real-time chat bridge")]
struct Args {
    /// Optional TOML config file; defaults and environment apply without it.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    logging::init_logging(&config.observability)?;

    tracing::info!("room-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        chat_endpoint = %config.services.chat_endpoint,
        user_rest = %config.services.user_rest,
        user_grpc = %config.services.user_grpc,
        post_grpc = %config.services.post_grpc,
        event_grpc = %config.services.event_grpc,
        routes = config.routes.proxy.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let backend = Arc::new(WsChatBackend::new(
        config.services.chat_endpoint.clone(),
        Duration::from_secs(config.timeouts.connect_secs),
    ));

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(config, backend, shutdown);
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
