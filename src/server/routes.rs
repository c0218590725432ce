//! HTTP routes.

use crate::lifecycle::{CameraLifecycleController, StreamingState};
use crate::metrics::{MetricsRegistry, MetricsSnapshot};
use crate::relay::RelayConfig;
use crate::stream::{self, LocalStreamer};
use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    controller: Arc<CameraLifecycleController>,
    streamer: LocalStreamer,
    metrics: MetricsRegistry,
    relay: Option<RelayConfig>,
}

impl AppState {
    /// Builds the handler state around `controller`.
    pub fn new(
        controller: Arc<CameraLifecycleController>,
        relay: &RelayConfig,
        stream_interval: Duration,
        metrics: MetricsRegistry,
    ) -> Self {
        let streamer = LocalStreamer::new(
            controller.buffer().clone(),
            controller.capture_config().quality,
            stream_interval,
            metrics.clone(),
        );
        Self {
            controller,
            streamer,
            metrics,
            relay: relay.enabled.then(|| relay.clone()),
        }
    }
}

/// Builds the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/video_feed", get(video_feed_handler))
        .route("/start_camera", post(start_camera_handler))
        .route("/stop_camera", post(stop_camera_handler))
        .route("/camera_status", get(camera_status_handler))
        .route("/server_config", get(server_config_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct StatusResponse {
    state: StreamingState,
    is_streaming: bool,
    camera_available: bool,
    #[serde(flatten)]
    relay: Option<RelayView>,
}

#[derive(Serialize)]
struct RelayView {
    server_connected: bool,
    server_url: String,
    last_error: Option<String>,
    frames_delivered: u64,
}

#[derive(Serialize)]
struct ServerConfigResponse {
    server_url: String,
    stream_id: String,
    web_app_url: String,
}

async fn index_handler(State(state): State<AppState>) -> impl IntoResponse {
    let camera_status = match state.controller.state() {
        StreamingState::Streaming => "active",
        _ => "inactive",
    };
    Json(json!({
        "status": "Live Stream Server Running",
        "camera_status": camera_status,
    }))
}

async fn video_feed_handler(State(state): State<AppState>) -> Response {
    let Some(session) = state.controller.session() else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Camera not started").into_response();
    };

    let body = Body::from_stream(state.streamer.multipart(session));
    (
        [
            (header::CONTENT_TYPE, stream::content_type()),
            (
                header::CACHE_CONTROL,
                "no-cache, no-store, must-revalidate".to_string(),
            ),
        ],
        body,
    )
        .into_response()
}

async fn start_camera_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.controller.start().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({"status": "success", "message": "Camera started"})),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "status": "error",
                "message": "Failed to start camera",
                "detail": e.to_string(),
            })),
        ),
    }
}

async fn stop_camera_handler(State(state): State<AppState>) -> impl IntoResponse {
    state.controller.stop().await;
    Json(json!({"status": "success", "message": "Camera stopped"}))
}

async fn camera_status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.controller.status();
    state.metrics.update(&MetricsSnapshot::from_status(&status));

    let relay = match (&status.relay, state.controller.relay_client()) {
        (Some(relay), Some(client)) => {
            // While streaming the relay loop reports connectivity itself.
            let server_connected = if status.is_streaming {
                relay.connected
            } else {
                client.check_server_connection().await
            };
            Some(RelayView {
                server_connected,
                server_url: relay.target_url.clone(),
                last_error: relay.last_error.clone(),
                frames_delivered: relay.frames_delivered,
            })
        }
        _ => None,
    };

    Json(StatusResponse {
        state: status.state,
        is_streaming: status.is_streaming,
        camera_available: status.camera_available,
        relay,
    })
}

async fn server_config_handler(State(state): State<AppState>) -> Response {
    match &state.relay {
        Some(relay) => Json(ServerConfigResponse {
            server_url: relay.base_url.clone(),
            stream_id: relay.stream_id.clone(),
            web_app_url: relay.web_app_url(),
        })
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"status": "error", "message": "Relay not configured"})),
        )
            .into_response(),
    }
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    state
        .metrics
        .update(&MetricsSnapshot::from_status(&state.controller.status()));

    match state.metrics.encode() {
        Ok(output) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            output,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {}", e),
        ),
    }
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
