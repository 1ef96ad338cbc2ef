//! HTTP API serving the streaming completion endpoint
//!
//! Endpoints:
//! - POST /api/sse - Stream a reply to `{conversation}` as server-sent frames
//! - GET /health - Health check
//!
//! Rejected requests get a status code plus exactly one error frame, so a
//! stream reader sees the same shape whether the failure is early or late.

use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use futures_util::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::core::frame::{encode_data, encode_error};
use crate::core::upstream::{CompletionSource, CompletionStream};
use crate::types::{ApiError, ConversationItem, ErrorPayload};
use crate::UPSTREAM_FAILURE_MESSAGE;

/// Server configuration
#[derive(Clone)]
pub struct AppConfig {
    /// Bearer token clients must present. `None` disables the check.
    pub access_token: Option<String>,
    pub source: Arc<dyn CompletionSource>,
}

impl AppConfig {
    pub fn new(source: Arc<dyn CompletionSource>) -> Self {
        Self {
            access_token: None,
            source,
        }
    }

    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = token.filter(|t| !t.is_empty());
        self
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("access_token", &self.access_token.as_ref().map(|_| "<set>"))
            .finish_non_exhaustive()
    }
}

/// App state
struct AppState {
    config: AppConfig,
    streams_served: AtomicU64,
}

/// Stream request body
#[derive(Debug, Deserialize)]
pub struct StreamRequest {
    #[serde(default)]
    pub conversation: Vec<ConversationItem>,
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub streams_served: u64,
}

/// Create the API router
pub fn create_router(config: AppConfig) -> Router {
    let state = Arc::new(AppState {
        config,
        streams_served: AtomicU64::new(0),
    });

    Router::new()
        .route("/health", get(health))
        .route("/api/sse", post(stream_completion))
        .with_state(state)
}

/// Health check endpoint
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
        streams_served: state.streams_served.load(Ordering::Relaxed),
    })
}

/// Stream a completion for the posted conversation
async fn stream_completion(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !is_authorized(&headers, state.config.access_token.as_deref()) {
        warn!("rejected stream request: bad or missing bearer token");
        return error_response(StatusCode::FORBIDDEN, ErrorPayload::new(true, "Not authorized"));
    }

    let request: StreamRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            warn!("rejected stream request: {}", e);
            return error_response(
                StatusCode::BAD_REQUEST,
                ErrorPayload::new(true, format!("Invalid request body: {}", e)),
            );
        }
    };
    if request.conversation.is_empty() {
        warn!("rejected stream request: empty conversation");
        return error_response(
            StatusCode::BAD_REQUEST,
            ErrorPayload::new(true, "Conversation must not be empty"),
        );
    }

    let served = state.streams_served.fetch_add(1, Ordering::Relaxed) + 1;
    info!(
        stream = served,
        items = request.conversation.len(),
        "streaming completion"
    );

    let upstream = state.config.source.stream(request.conversation);
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache, no-transform"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(completion_frames(upstream)),
    )
        .into_response()
}

/// Encode upstream deltas as frames. The first upstream error becomes one
/// error frame and ends the stream.
pub fn completion_frames(
    upstream: CompletionStream,
) -> impl Stream<Item = Result<String, Infallible>> + Send + 'static {
    stream::unfold(Some(upstream), |state| async move {
        let mut upstream = state?;
        match upstream.next().await {
            Some(Ok(delta)) => {
                debug!(chars = delta.len(), "data frame");
                Some((Ok(encode_data(&delta)), Some(upstream)))
            }
            Some(Err(e)) => {
                error!("upstream failed mid-stream: {}", e);
                let payload = ErrorPayload::new(e.to_string(), UPSTREAM_FAILURE_MESSAGE);
                Some((Ok(encode_error(&payload)), None))
            }
            None => {
                debug!("upstream finished");
                None
            }
        }
    })
}

fn is_authorized(headers: &HeaderMap, expected: Option<&str>) -> bool {
    let Some(expected) = expected else {
        return true;
    };
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|token| token.trim() == expected)
        .unwrap_or(false)
}

fn error_response(status: StatusCode, payload: ErrorPayload) -> Response {
    (
        status,
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache, no-transform"),
        ],
        encode_error(&payload),
    )
        .into_response()
}

/// Run the API server
pub async fn run_server(addr: &str, config: AppConfig) -> Result<(), ApiError> {
    let router = create_router(config);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ApiError::Bind {
            addr: addr.to_string(),
            source,
        })?;
    info!("lifestream API running on {}", addr);
    info!("  POST /api/sse  - Stream a completion");
    info!("  GET  /health   - Health check");
    axum::serve(listener, router).await?;
    Ok(())
}
