//! Room gateway library: HTTP/WebSocket edge gateway with a real-time
//! chat bridge.

pub mod chat;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;

pub use config::schema::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
