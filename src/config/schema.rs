//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Backend service endpoints.
    pub services: ServicesConfig,

    /// Static reverse-proxy routes.
    pub routes: RoutesConfig,

    /// CORS policy applied to every response.
    pub cors: CorsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Chat bridge tuning.
    pub chat: ChatConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Endpoints of the backend services the gateway talks to.
///
/// The gRPC endpoints are carried for the transcoding layer and logged at
/// startup; the gateway itself dials only `chat_endpoint` and `user_rest`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServicesConfig {
    pub user_grpc: String,
    pub post_grpc: String,
    pub event_grpc: String,

    /// Messaging backend stream endpoint (`ws://` or `wss://`).
    pub chat_endpoint: String,

    /// Base URL of the user service REST API.
    pub user_rest: String,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            user_grpc: "localhost:50061".to_string(),
            post_grpc: "localhost:50062".to_string(),
            event_grpc: "localhost:50063".to_string(),
            chat_endpoint: "ws://localhost:50064".to_string(),
            user_rest: "http://localhost:8001".to_string(),
        }
    }
}

/// How a route path is compared with the request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PathMatch {
    Exact,
    Prefix,
}

/// Upstream a proxy route forwards to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Upstream {
    UserRest,
}

/// A single static reverse-proxy route.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Path to match.
    pub path: String,

    /// Exact or prefix comparison.
    #[serde(rename = "match", default = "default_path_match")]
    pub path_match: PathMatch,

    /// Upstream to forward to.
    #[serde(default = "default_upstream")]
    pub upstream: Upstream,
}

fn default_path_match() -> PathMatch {
    PathMatch::Exact
}

fn default_upstream() -> Upstream {
    Upstream::UserRest
}

impl RouteConfig {
    fn user_rest(name: &str, path: &str, path_match: PathMatch) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            path_match,
            upstream: Upstream::UserRest,
        }
    }
}

/// Route table wrapper so `[[routes.proxy]]` can be given in TOML.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutesConfig {
    pub proxy: Vec<RouteConfig>,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        use PathMatch::{Exact, Prefix};
        Self {
            proxy: vec![
                RouteConfig::user_rest("google-login", "/api/v1/auth/google/login", Exact),
                RouteConfig::user_rest("google-callback", "/auth/google/callback", Exact),
                RouteConfig::user_rest("signin", "/api/v1/auth/signin", Exact),
                RouteConfig::user_rest("signup", "/api/v1/auth/signup", Exact),
                RouteConfig::user_rest("signout", "/api/v1/auth/signout", Exact),
                RouteConfig::user_rest("users", "/api/v1/users/", Prefix),
                RouteConfig::user_rest("me", "/api/v1/me", Exact),
            ],
        }
    }
}

/// CORS policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allow_origin: String,
    pub allow_methods: Vec<String>,
    pub allow_headers: Vec<String>,
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origin: "http://localhost:3000".to_string(),
            allow_methods: ["GET", "POST", "PUT", "DELETE", "OPTIONS"]
                .into_iter()
                .map(String::from)
                .collect(),
            allow_headers: ["Content-Type", "Authorization"]
                .into_iter()
                .map(String::from)
                .collect(),
            allow_credentials: true,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Backend connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout for proxied REST calls in seconds.
    pub request_secs: u64,

    /// How long shutdown waits for live bridges to drain.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 15,
            shutdown_grace_secs: 30,
        }
    }
}

/// Chat bridge tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Close a connection when the client sends nothing (pongs included)
    /// for this long. 0 disables the timeout.
    pub idle_timeout_secs: u64,

    /// Interval between keepalive pings. 0 disables pings.
    pub ping_interval_secs: u64,

    /// How long teardown waits for the second relay before aborting it.
    /// At least the 250ms diagnostic write timeout.
    pub teardown_grace_ms: u64,

    /// Largest client frame accepted by the upgrade.
    pub max_frame_bytes: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 0,
            ping_interval_secs: 30,
            teardown_grace_ms: 500,
            max_frame_bytes: 64 * 1024,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
