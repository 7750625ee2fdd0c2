//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID)
//!     → websocket.rs (room endpoint → chat bridge)
//!     → proxy.rs (everything else → route table → upstream or 404)
//!     → cors.rs (policy on every response)
//! ```

pub mod cors;
pub mod proxy;
pub mod request;
pub mod server;
pub mod websocket;

pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::HttpServer;
