use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use reqwest::Url;
use serde::Deserialize;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    /// Client used for upstream log fetches.
    pub client: reqwest::Client,
}

pub type SharedState = Arc<AppState>;

#[derive(Deserialize)]
pub struct StreamLogsQuery {
    pub url: Option<String>,
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    /// The upstream log host failed or answered with a non-success status.
    BadGateway(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/stream-logs", get(stream_logs))
        .route("/health", get(health_check))
}

// ── Helpers ───────────────────────────────────────────────────────────

/// Accept only absolute http(s) URLs as upstream targets.
fn parse_target(raw: Option<&str>) -> Result<Url, ApiError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing 'url' query parameter".into()))?;
    let url = Url::parse(raw)
        .map_err(|e| ApiError::BadRequest(format!("Invalid url '{}': {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ApiError::BadRequest(format!(
            "Unsupported url scheme '{}'. Expected http or https",
            other
        ))),
    }
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn stream_logs(
    State(state): State<SharedState>,
    Query(query): Query<StreamLogsQuery>,
) -> Result<Response, ApiError> {
    let target = parse_target(query.url.as_deref())?;

    let upstream = state.client.get(target.clone()).send().await.map_err(|e| {
        tracing::warn!(target = %target, error = %e, "Upstream log request failed");
        ApiError::BadGateway(format!("Failed to reach {}", target))
    })?;

    let status = upstream.status();
    if !status.is_success() {
        tracing::warn!(target = %target, status = status.as_u16(), "Upstream log host returned an error");
        return Err(ApiError::BadGateway(format!(
            "Upstream returned {}",
            status.as_u16()
        )));
    }

    tracing::debug!(target = %target, "Relaying upstream log body");
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|e| ApiError::BadGateway(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_app() -> Router {
        let state = Arc::new(AppState {
            client: reqwest::Client::new(),
        });
        api_router().with_state(state)
    }

    async fn body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn send_get(app: Router, uri: &str) -> Response {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        app.oneshot(request).await.unwrap()
    }

    /// Serve `router` on an ephemeral local port and return its base URL.
    async fn spawn_upstream(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = send_get(test_app(), "/health").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_missing_url_is_bad_request() {
        let response = send_get(test_app(), "/api/stream-logs").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response.into_body()).await;
        assert!(json["error"].as_str().unwrap().contains("url"));
    }

    #[tokio::test]
    async fn test_non_http_scheme_is_bad_request() {
        let response = send_get(test_app(), "/api/stream-logs?url=file:///etc/passwd").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response.into_body()).await;
        assert!(json["error"].as_str().unwrap().contains("scheme"));
    }

    #[tokio::test]
    async fn test_relative_url_is_bad_request() {
        let response = send_get(test_app(), "/api/stream-logs?url=build.log").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_relays_upstream_body() {
        let upstream = Router::new().route(
            "/build.log",
            get(|| async { "Building...\nDone" }),
        );
        let base = spawn_upstream(upstream).await;

        let uri = format!("/api/stream-logs?url={}/build.log", base);
        let response = send_get(test_app(), &uri).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"Building...\nDone");
    }

    #[tokio::test]
    async fn test_upstream_error_status_is_bad_gateway() {
        let upstream = Router::new().route(
            "/build.log",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base = spawn_upstream(upstream).await;

        let uri = format!("/api/stream-logs?url={}/build.log", base);
        let response = send_get(test_app(), &uri).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = body_json(response.into_body()).await;
        assert!(json["error"].as_str().unwrap().contains("500"));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_bad_gateway() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let uri = format!("/api/stream-logs?url=http://127.0.0.1:{}/build.log", port);
        let response = send_get(test_app(), &uri).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_parse_target_trims_whitespace() {
        let url = parse_target(Some("  https://logs.example.com/a.log ")).unwrap();
        assert_eq!(url.as_str(), "https://logs.example.com/a.log");
        assert!(parse_target(Some("   ")).is_err());
        assert!(parse_target(None).is_err());
    }
}
