//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::state::AppState;
use crate::mime::Headers;
use crate::pipeline::{As2Response, InboundRequest, OutboundMessage};

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        // Health and status
        .route("/health", get(health_check))
        .route("/status", get(status))
        // AS2 endpoint
        .route(&state.config.path, post(receive_message))
        .layer(DefaultBodyLimit::max(state.config.max_body_size));

    if state.config.cors_enabled {
        router = router.layer(CorsLayer::permissive());
    }
    if state.config.logging {
        router = router.layer(TraceLayer::new_for_http());
    }

    router.with_state(state)
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    /// Always "ok"
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: crate::VERSION,
    })
}

/// Status response
#[derive(Serialize)]
pub struct StatusResponse {
    /// Always "ok"
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
    /// Seconds since start
    pub uptime_secs: u64,
    /// AS2 endpoint path
    pub path: String,
    /// Whether asynchronous MDNs are pushed
    pub async_mdn_delivery: bool,
}

async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(StatusResponse {
        status: "ok",
        version: crate::VERSION,
        uptime_secs: state.uptime().as_secs(),
        path: state.config.path.clone(),
        async_mdn_delivery: state.sender.is_some(),
    })
}

/// Receive an AS2 message and answer with the pipeline's response.
async fn receive_message(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    let request = InboundRequest::new(to_headers(&headers), body.to_vec());
    let pipeline = state.pipeline.clone();

    let outcome = match tokio::task::spawn_blocking(move || pipeline.receive(request)).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(error = %e, "inbound processing panicked");
            return (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response();
        },
    };

    tracing::info!(
        message_id = outcome.received.as_ref().map(|u| u.message_id()).unwrap_or("-"),
        state = %outcome.state,
        status = %outcome.response.status,
        errors = outcome.errors.len(),
        "message received"
    );

    if let Some(mdn) = outcome.pending_mdn {
        match &state.sender {
            Some(_) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move { push_mdn(&state, mdn).await });
            },
            None => tracing::warn!(message_id = %mdn.message_id, "no sender configured, MDN left READY_TO_PUSH"),
        }
    }

    to_response(outcome.response)
}

/// Deliver an asynchronous MDN and record the result.
///
/// Transient failures are repeated per the sender's retry policy; the
/// final outcome decides DONE or FAILURE.
async fn push_mdn(state: &AppState, mdn: OutboundMessage) {
    let Some(sender) = &state.sender else {
        return;
    };
    let outcome = sender.send_with_retry(&mdn).await;
    match state.pipeline.complete_send(&mdn.message_id, outcome) {
        Ok(final_state) => tracing::info!(message_id = %mdn.message_id, state = %final_state, "asynchronous MDN pushed"),
        Err(e) => tracing::warn!(message_id = %mdn.message_id, error = %e, "asynchronous MDN not recorded"),
    }
}

/// Header values that are not visible ASCII (obs-text) are kept, decoded
/// lossily.
fn to_headers(map: &HeaderMap) -> Headers {
    map.iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

fn to_response(response: As2Response) -> Response {
    let mut headers = HeaderMap::new();
    for (name, value) in response.headers.iter() {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            },
            _ => tracing::warn!(header = name, "dropping invalid response header"),
        }
    }
    (response.status, headers, response.body).into_response()
}
