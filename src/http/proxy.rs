//! Static REST reverse proxy.
//!
//! # Responsibilities
//! - Match the request path against the static route table
//! - Forward method, path, query, headers and body to the upstream unchanged
//! - Strip upstream CORS headers so the gateway's policy is the only one
//!
//! # Design Decisions
//! - Bodies are streamed, never buffered
//! - No retries: an upstream failure is a 502, a timeout a 504
//! - Unmatched paths get 404 (no transcoding layer behind it)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::{GatewayConfig, Upstream};
use crate::http::cors::UPSTREAM_CORS_HEADERS;
use crate::http::request::request_id;
use crate::observability::metrics;
use crate::routing::Router as RouteTable;

/// Headers that describe one hop and are never forwarded.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// State shared by proxy requests.
#[derive(Clone)]
pub struct ProxyState {
    routes: Arc<RouteTable>,
    client: Client<HttpConnector, Body>,
    user_rest: Arc<str>,
    request_timeout: Duration,
}

impl ProxyState {
    pub fn new(config: &GatewayConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.timeouts.connect_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            routes: Arc::new(RouteTable::from_config(&config.routes.proxy)),
            client,
            user_rest: config.services.user_rest.trim_end_matches('/').into(),
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
        }
    }

    fn base_url(&self, upstream: Upstream) -> &str {
        match upstream {
            Upstream::UserRest => &self.user_rest,
        }
    }
}

/// Fallback handler: every path not owned by another route lands here.
pub async fn proxy_handler(State(state): State<ProxyState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let request_id = request_id(request.headers()).to_string();
    let path = request.uri().path().to_string();

    let Some(route) = state.routes.match_path(&path) else {
        tracing::debug!(request_id = %request_id, path = %path, "No route matched");
        metrics::record_proxy_request("none", StatusCode::NOT_FOUND.as_u16(), start);
        return (StatusCode::NOT_FOUND, "404 page not found").into_response();
    };
    let route_name = route.name.clone();

    let client_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let (mut parts, body) = request.into_parts();
    let target = match upstream_uri(state.base_url(route.upstream), &parts.uri) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(request_id = %request_id, route = %route_name, error = %e, "Invalid upstream URI");
            metrics::record_proxy_request(&route_name, StatusCode::BAD_GATEWAY.as_u16(), start);
            return (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response();
        }
    };

    tracing::debug!(
        request_id = %request_id,
        route = %route_name,
        method = %parts.method,
        upstream = %target,
        "Proxying request"
    );

    prepare_headers(&mut parts.headers, client_addr.map(|ip| ip.to_string()));
    parts.uri = target;
    let upstream_req = Request::from_parts(parts, body);

    match tokio::time::timeout(state.request_timeout, state.client.request(upstream_req)).await {
        Ok(Ok(response)) => {
            let status = response.status();
            metrics::record_proxy_request(&route_name, status.as_u16(), start);
            let (mut parts, body) = response.into_parts();
            strip_response_headers(&mut parts.headers);
            Response::from_parts(parts, Body::new(body))
        }
        Ok(Err(e)) => {
            tracing::error!(request_id = %request_id, route = %route_name, error = %e, "Upstream error");
            metrics::record_proxy_request(&route_name, StatusCode::BAD_GATEWAY.as_u16(), start);
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
        Err(_) => {
            tracing::error!(request_id = %request_id, route = %route_name, "Upstream timed out");
            metrics::record_proxy_request(&route_name, StatusCode::GATEWAY_TIMEOUT.as_u16(), start);
            (StatusCode::GATEWAY_TIMEOUT, "Upstream request timed out").into_response()
        }
    }
}

/// Join the upstream base URL with the request's path and query.
fn upstream_uri(base: &str, incoming: &Uri) -> Result<Uri, axum::http::uri::InvalidUri> {
    let path_and_query = incoming
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    format!("{}{}", base, path_and_query).parse()
}

/// Drop hop-by-hop headers and record the forwarding chain.
///
/// The client's `Host` is forwarded as is; hyper only fills it in when
/// missing.
fn prepare_headers(headers: &mut HeaderMap, client_ip: Option<String>) {
    strip_hop_by_hop(headers);

    if let Some(ip) = client_ip {
        let chain = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(prior) => format!("{}, {}", prior, ip),
            None => ip,
        };
        if let Ok(value) = HeaderValue::from_str(&chain) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }
}

fn strip_response_headers(headers: &mut HeaderMap) {
    strip_hop_by_hop(headers);
    for name in &UPSTREAM_CORS_HEADERS {
        headers.remove(name);
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    // Headers named by `Connection` are hop-by-hop too.
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_base_and_path_and_query() {
        let incoming: Uri = "/api/v1/users/7?full=1".parse().unwrap();
        let uri = upstream_uri("http://localhost:8001", &incoming).unwrap();
        assert_eq!(uri.to_string(), "http://localhost:8001/api/v1/users/7?full=1");

        let uri = upstream_uri("http://users:80/base", &"/api/v1/me".parse().unwrap()).unwrap();
        assert_eq!(uri.to_string(), "http://users:80/base/api/v1/me");
    }

    #[test]
    fn request_headers_are_prepared_for_the_next_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("gateway:8080"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-hop"));
        headers.insert("x-hop", HeaderValue::from_static("1"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer t"));
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("10.0.0.1"));

        prepare_headers(&mut headers, Some("127.0.0.1".into()));

        assert_eq!(headers[header::HOST], "gateway:8080");
        assert!(headers.get("x-forwarded-host").is_none());
        assert!(headers.get(header::CONNECTION).is_none());
        assert!(headers.get("x-hop").is_none());
        assert_eq!(headers[header::AUTHORIZATION], "Bearer t");
        assert_eq!(headers[X_FORWARDED_FOR], "10.0.0.1, 127.0.0.1");
    }

    #[test]
    fn upstream_cors_headers_are_stripped() {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        headers.insert(header::ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        headers.insert(header::SET_COOKIE, HeaderValue::from_static("sid=1"));

        strip_response_headers(&mut headers);

        assert!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        assert!(headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).is_none());
        assert_eq!(headers[header::SET_COOKIE], "sid=1");
    }
}
