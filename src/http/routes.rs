//! Request routing and quota enforcement middleware.
//!
//! The quota middleware wraps only the rate-limited API surface; the
//! health, root, and stats endpoints bypass it so an exhausted identity
//! can still be inspected.

use axum::{
    extract::{Path, Query, Request, State},
    http::{header::RETRY_AFTER, HeaderName, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, instrument, warn};

use crate::error::FloodgateError;
use crate::limiter::{Decision, RateLimiter};

const HEADER_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const HEADER_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const HEADER_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

#[derive(Clone)]
struct AppState {
    limiter: Arc<RateLimiter>,
}

/// Build the service router around a rate limiter.
pub fn router(limiter: Arc<RateLimiter>) -> Router {
    let state = AppState { limiter };

    Router::new()
        .route("/api/data", get(sample_data))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            enforce_quota,
        ))
        .route("/", get(root))
        .route("/health", get(health))
        .route("/stats/{identity}", get(identity_stats))
        .with_state(state)
}

/// Middleware that checks and consumes the caller's quota.
#[instrument(skip_all, fields(path = %request.uri().path()))]
async fn enforce_quota(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    request: Request,
    next: Next,
) -> Response {
    let identity = params
        .get("user_id")
        .map(String::as_str)
        .or_else(|| {
            request
                .headers()
                .get("x-user-id")
                .and_then(|v| v.to_str().ok())
        })
        .unwrap_or_default()
        .to_string();

    if identity.is_empty() {
        warn!("Request missing identity");
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "user_id required (query param or X-User-ID header)"
            })),
        )
            .into_response();
    }

    match state.limiter.check_and_consume(&identity).await {
        Ok(Decision { allowed: true, remaining }) => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert(HEADER_LIMIT, HeaderValue::from(state.limiter.policy().limit()));
            headers.insert(HEADER_REMAINING, HeaderValue::from(remaining));
            response
        }
        Ok(Decision { allowed: false, .. }) => quota_exceeded_response(&state.limiter),
        Err(e) => error_response(&e),
    }
}

/// 429 response with retry metadata, mirrored in the response headers.
fn quota_exceeded_response(limiter: &RateLimiter) -> Response {
    let policy = limiter.policy();
    let window = policy.window_seconds();
    let reset_at = chrono::Utc::now().timestamp() + window as i64;

    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(serde_json::json!({
            "error": "Rate limit exceeded",
            "limit": policy.limit(),
            "window_seconds": window,
            "retry_after": window,
        })),
    )
        .into_response();

    let headers = response.headers_mut();
    headers.insert(HEADER_LIMIT, HeaderValue::from(policy.limit()));
    headers.insert(HEADER_REMAINING, HeaderValue::from(0u32));
    headers.insert(HEADER_RESET, HeaderValue::from(reset_at));
    headers.insert(RETRY_AFTER, HeaderValue::from(window));
    response
}

fn error_response(err: &FloodgateError) -> Response {
    match err {
        FloodgateError::InvalidIdentity => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": err.to_string() })),
        )
            .into_response(),
        FloodgateError::StoreUnavailable(detail) => {
            error!(error = %detail, "Shared store unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "error": "Rate limiter store unavailable" })),
            )
                .into_response()
        }
        _ => {
            error!(error = %err, "Unexpected error handling request");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Internal server error" })),
            )
                .into_response()
        }
    }
}

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "floodgate"
    }))
}

/// Sample rate-limited endpoint.
async fn sample_data() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Success! This request was allowed.",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Quota state for one identity. Bypasses the quota itself.
async fn identity_stats(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Response {
    match state.limiter.stats(&identity).await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Health check that probes the shared store.
async fn health(State(state): State<AppState>) -> Response {
    match state.limiter.ping().await {
        Ok(()) => Json(serde_json::json!({
            "status": "healthy",
            "redis": "connected"
        }))
        .into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "unhealthy",
                "redis": "disconnected",
                "error": e.to_string()
            })),
        )
            .into_response(),
    }
}
