//! CORS policy layer.

use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::CorsConfig;

/// Build the CORS layer from a validated config.
///
/// Entries that fail to parse are skipped; validation rejects them first.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origin = if config.allow_origin == "*" {
        AllowOrigin::any()
    } else {
        match HeaderValue::from_str(&config.allow_origin) {
            Ok(origin) => AllowOrigin::exact(origin),
            Err(_) => AllowOrigin::list(Vec::<HeaderValue>::new()),
        }
    };
    let methods: Vec<Method> = config
        .allow_methods
        .iter()
        .filter_map(|m| Method::from_bytes(m.as_bytes()).ok())
        .collect();
    let headers: Vec<HeaderName> = config
        .allow_headers
        .iter()
        .filter_map(|h| HeaderName::from_bytes(h.as_bytes()).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(config.allow_credentials)
}

/// Response headers the gateway owns; upstream copies are dropped.
pub const UPSTREAM_CORS_HEADERS: [HeaderName; 4] = [
    axum::http::header::ACCESS_CONTROL_ALLOW_ORIGIN,
    axum::http::header::ACCESS_CONTROL_ALLOW_METHODS,
    axum::http::header::ACCESS_CONTROL_ALLOW_HEADERS,
    axum::http::header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
];

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(cors_layer(&CorsConfig::default()))
    }

    #[tokio::test]
    async fn answers_preflight() {
        let res = app()
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/ping")
                    .header(header::ORIGIN, "http://localhost:3000")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(res.status().is_success());
        assert_eq!(
            res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:3000"
        );
        assert_eq!(res.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    }

    #[tokio::test]
    async fn decorates_simple_requests() {
        let res = app()
            .oneshot(
                Request::builder()
                    .uri("/ping")
                    .header(header::ORIGIN, "http://localhost:3000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:3000"
        );
    }
}
