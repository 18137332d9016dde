//! Tempo forwarder HTTP API
//!
//! Axum-based server that translates the local request shapes into the
//! scheduling backend's shapes and back. One inbound request makes exactly one
//! backend call; every failure is flattened to a 500 with an `error` body.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to a pure
//! inner function. The inner functions are directly testable without axum
//! dispatch machinery.
//!
//! Endpoints:
//! - POST /api/chat            : chat exchange (`/zeta/chat`)
//! - GET  /api/availability    : calendar events (`/availability`)
//! - POST /api/schedule_meeting: meeting creation (`/schedule_meeting`)
//! - GET  /api/health          : backend health (`/zeta/health`)
//! - GET  /version             : server version info

use std::sync::Arc;

use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use tempo_core::api::{AvailabilityQuery, BackendChatRequest, ChatReply, ChatRequest, ErrorBody};
use tempo_core::TempoConfig;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::backend::BackendClient;

pub const CHAT_FAILED: &str = "Failed to process chat request";
pub const AVAILABILITY_FAILED: &str = "Failed to fetch availability";
pub const SCHEDULE_FAILED: &str = "Failed to schedule meeting";
pub const HEALTH_FAILED: &str = "Failed to check health";

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub backend: BackendClient,
    pub config: TempoConfig,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/availability", get(availability_handler))
        .route("/api/schedule_meeting", post(schedule_meeting_handler))
        .route("/api/health", get(health_handler))
        .route("/version", get(version_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    config: TempoConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = config.http_addr();
    let backend = BackendClient::new(&config.backend)?;
    tracing::info!(backend = %backend.base_url(), "Forwarding to scheduling backend");
    let state = Arc::new(HttpState { backend, config });

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Tempo forwarder listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Inner (directly testable) forwarding functions
// ============================================================================

/// Inner version: returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "tempo/1",
    })
}

/// Inner chat: `{message, session_id?}` in, `{session_id, response}` out.
pub async fn chat_inner(
    backend: &BackendClient,
    req: ChatRequest,
) -> (StatusCode, serde_json::Value) {
    let backend_req = BackendChatRequest::from(req);
    match backend.chat(&backend_req).await {
        Ok(resp) => {
            let reply = ChatReply::from(resp);
            tracing::debug!(
                session_id = reply.session_id.as_deref().unwrap_or("none"),
                "Chat forwarded"
            );
            (StatusCode::OK, to_value(&reply))
        }
        Err(e) => chat_failure(e.to_string()),
    }
}

/// Inner availability: query string passed through, absent or empty params omitted.
pub async fn availability_inner(
    backend: &BackendClient,
    query: AvailabilityQuery,
) -> (StatusCode, serde_json::Value) {
    match backend.availability(&query.normalized()).await {
        Ok(data) => (StatusCode::OK, data),
        Err(e) => {
            tracing::error!(error = %e, "Availability forward failed");
            failure(ErrorBody::new(AVAILABILITY_FAILED))
        }
    }
}

/// Inner schedule meeting: body forwarded verbatim both ways.
pub async fn schedule_meeting_inner(
    backend: &BackendClient,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    match backend.schedule_meeting(&body).await {
        Ok(data) => (StatusCode::OK, data),
        Err(e) => {
            tracing::error!(error = %e, "Schedule meeting forward failed");
            failure(ErrorBody::new(SCHEDULE_FAILED))
        }
    }
}

/// Inner health: backend health payload passed through.
pub async fn health_inner(backend: &BackendClient) -> (StatusCode, serde_json::Value) {
    match backend.health().await {
        Ok(data) => (StatusCode::OK, data),
        Err(e) => {
            tracing::error!(error = %e, "Health forward failed");
            failure(ErrorBody::new(HEALTH_FAILED).with_details(e.to_string()))
        }
    }
}

// ============================================================================
// Axum handler wrappers (thin, delegate to inner functions)
// ============================================================================

pub async fn chat_handler(
    State(state): State<Arc<HttpState>>,
    req: Result<Json<ChatRequest>, JsonRejection>,
) -> impl IntoResponse {
    let (status, body) = match req {
        Ok(Json(req)) => chat_inner(&state.backend, req).await,
        Err(rejection) => chat_failure(rejection.body_text()),
    };
    (status, Json(body))
}

pub async fn availability_handler(
    State(state): State<Arc<HttpState>>,
    Query(query): Query<AvailabilityQuery>,
) -> impl IntoResponse {
    let (status, body) = availability_inner(&state.backend, query).await;
    (status, Json(body))
}

pub async fn schedule_meeting_handler(
    State(state): State<Arc<HttpState>>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> impl IntoResponse {
    let (status, body) = match body {
        Ok(Json(body)) => schedule_meeting_inner(&state.backend, body).await,
        Err(rejection) => {
            tracing::warn!(error = %rejection.body_text(), "Rejected schedule meeting body");
            failure(ErrorBody::new(SCHEDULE_FAILED))
        }
    };
    (status, Json(body))
}

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.backend).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

// ============================================================================
// Helpers
// ============================================================================

fn chat_failure(details: String) -> (StatusCode, serde_json::Value) {
    tracing::error!(details = %details, "Chat forward failed");
    failure(
        ErrorBody::new(CHAT_FAILED)
            .with_details(details)
            .with_timestamp(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
    )
}

fn failure(body: ErrorBody) -> (StatusCode, serde_json::Value) {
    (StatusCode::INTERNAL_SERVER_ERROR, to_value(&body))
}

fn to_value<T: serde::Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or_else(|_| serde_json::json!({}))
}

// ============================================================================
// Unit Tests (inner functions called directly)
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend_for(server: &MockServer) -> BackendClient {
        BackendClient::with_base_url(server.uri(), Duration::from_secs(5))
            .expect("Failed to create backend client")
    }

    // ========================================================================
    // TEST 1: version_inner is pure and returns correct fields
    // ========================================================================
    #[test]
    fn test_version_inner_pure() {
        let v = version_inner();
        assert!(v["version"].is_string(), "version must be string");
        assert_eq!(v["protocol"], "tempo/1", "protocol must be tempo/1");
    }

    // ========================================================================
    // TEST 2: chat_inner: translates both directions
    // ========================================================================
    #[tokio::test]
    async fn test_chat_inner_translates_shapes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/zeta/chat"))
            .and(body_json(json!({"prompt": "Schedule lunch tomorrow at noon"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "session_id": "abc123",
                "neura_z_response": "Done!"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let req = ChatRequest::new("Schedule lunch tomorrow at noon", None);
        let (status, body) = chat_inner(&backend_for(&server), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"session_id": "abc123", "response": "Done!"}));
    }

    // ========================================================================
    // TEST 3: chat_inner: empty session id is not forwarded
    // ========================================================================
    #[tokio::test]
    async fn test_chat_inner_drops_empty_session_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/zeta/chat"))
            .and(body_json(json!({"prompt": "hi"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"neura_z_response": "hey"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let req = ChatRequest::new("hi", Some(String::new()));
        let (status, body) = chat_inner(&backend_for(&server), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "hey");
    }

    // ========================================================================
    // TEST 4: chat_inner: backend failure becomes 500 with details + timestamp
    // ========================================================================
    #[tokio::test]
    async fn test_chat_inner_backend_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/zeta/chat"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let (status, body) =
            chat_inner(&backend_for(&server), ChatRequest::new("hi", None)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], CHAT_FAILED);
        assert_eq!(
            body["details"],
            "Backend request failed with status 500: boom"
        );
        assert!(body["timestamp"].is_string(), "timestamp must be present");
    }

    // ========================================================================
    // TEST 5: availability_inner: failure body has no details
    // ========================================================================
    #[tokio::test]
    async fn test_availability_inner_failure_is_flat() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/availability"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let (status, body) =
            availability_inner(&backend_for(&server), AvailabilityQuery::default()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": AVAILABILITY_FAILED}));
    }

    // ========================================================================
    // TEST 6: health_inner: unreachable backend reports details
    // ========================================================================
    #[tokio::test]
    async fn test_health_inner_unreachable_backend() {
        let backend =
            BackendClient::with_base_url("http://127.0.0.1:9".to_string(), Duration::from_secs(2))
                .unwrap();
        let (status, body) = health_inner(&backend).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], HEALTH_FAILED);
        assert!(body["details"].is_string());
    }
}
