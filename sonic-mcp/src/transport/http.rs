//! JSON-RPC over HTTP.
//!
//! `POST /mcp` (and its alias `POST /api`) accept one JSON-RPC message per
//! request. Capability failures still answer HTTP 200 with an error-shaped
//! result; only a body that is not JSON gets HTTP 400.

use std::net::SocketAddr;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{Method, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router, response::IntoResponse};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tower_http::cors;
use tracing::instrument;

use crate::error::Error;
use crate::protocol::{McpServer, PROTOCOL_VERSION, Response};

/// Creates the router with every endpoint and a permissive CORS policy.
pub fn router(server: McpServer) -> Router {
    Router::new()
        .route("/", get(get_root))
        .route("/health", get(get_health))
        .route("/mcp", post(post_rpc))
        .route("/api", post(post_rpc))
        .with_state(server)
        .layer(
            cors::CorsLayer::new()
                .allow_origin(cors::Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers(cors::Any),
        )
}

/// Binds `addr` and serves `app` until `shutdown` is cancelled.
///
/// # Errors
///
/// Fails if the address cannot be bound or the server stops abnormally.
pub async fn serve(app: Router, addr: SocketAddr, shutdown: CancellationToken) -> Result<(), Error> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .inspect_err(|e| tracing::error!("Failed to bind to {}: {}", addr, e))
        .map_err(|e| Error::server_with(format!("failed to bind {addr}"), e))?;
    tracing::info!("Starting server at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| Error::server_with("HTTP server error", e))
}

/// `GET /` — server description.
#[instrument(skip_all)]
async fn get_root(State(server): State<McpServer>) -> impl IntoResponse {
    let registry = server.registry();
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "protocolVersion": PROTOCOL_VERSION,
        "endpoints": { "mcp": "/mcp", "api": "/api", "health": "/health" },
        "capabilities": registry.capabilities(),
    }))
}

/// `GET /health` — lightweight liveness check.
#[instrument(skip_all)]
async fn get_health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// `POST /mcp`, `POST /api` — one JSON-RPC message.
#[instrument(skip_all)]
async fn post_rpc(
    State(server): State<McpServer>,
    body: Result<Json<Value>, JsonRejection>,
) -> axum::response::Response {
    let message = match body {
        Ok(Json(message)) => message,
        Err(rejection) => {
            tracing::debug!(%rejection, "rejected request body");
            return (
                StatusCode::BAD_REQUEST,
                Json(Response::parse_error(format!("invalid request body: {rejection}"))),
            )
                .into_response();
        }
    };
    match server.handle_value(message).await {
        Some(response) => (StatusCode::OK, Json(response)).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use tower::ServiceExt;

    use super::*;
    use crate::protocol::testing::mock_server;

    fn app() -> Router {
        router(mock_server().0)
    }

    async fn send(request: Request<Body>) -> (StatusCode, Value) {
        let response = app().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, body)
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_owned()))
            .expect("request")
    }

    #[tokio::test]
    async fn health_and_root() {
        let (status, body) = send(Request::get("/health").body(Body::empty()).expect("request")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));

        let (status, body) = send(Request::get("/").body(Body::empty()).expect("request")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(body["capabilities"].as_array().map(Vec::len), Some(37));
    }

    #[tokio::test]
    async fn both_rpc_paths_dispatch() {
        for path in ["/mcp", "/api"] {
            let (status, body) = send(post(path, r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["id"], 1);
            assert_eq!(body["result"], json!({}));
        }
    }

    #[tokio::test]
    async fn notifications_are_accepted_without_body() {
        let (status, body) =
            send(post("/mcp", r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert!(body.is_null());
    }

    #[tokio::test]
    async fn malformed_body_is_a_parse_error() {
        let (status, body) = send(post("/mcp", "{oops")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn capability_errors_are_http_success() {
        let (status, body) = send(post(
            "/mcp",
            r#"{"jsonrpc":"2.0","id":5,"method":"resources/read","params":{"uri":"sonic://nowhere"}}"#,
        ))
        .await;
        assert_eq!(status, StatusCode::OK);
        let text = body["result"]["contents"][0]["text"].as_str().unwrap_or_default();
        assert!(text.contains("unknown_capability"));
    }

    #[tokio::test]
    async fn cors_preflight_is_allowed() {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/mcp")
            .header(header::ORIGIN, "https://example.org")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .expect("request");
        let response = app().oneshot(request).await.expect("response");
        assert!(response.status().is_success());
        assert!(response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }
}
