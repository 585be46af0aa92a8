//! Health check handler.
//!
//! Reports liveness plus the state of the discovery cache. The check never
//! triggers a discovery fetch.

use crate::auth::CacheStatus;
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

/// Response for `/v1/health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// "healthy", or "degraded" when the last discovery fetch failed.
    pub status: String,

    /// Whether requests are authenticated at all.
    pub auth_enabled: bool,

    /// Discovery cache state (empty, fetching, ready, refreshing, failed).
    pub discovery: String,

    /// Usable signing keys in the cached document, when one is cached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_keys: Option<usize>,
}

/// Handler for GET /v1/health
///
/// ## Example Response
///
/// ```json
/// {
///   "status": "healthy",
///   "auth_enabled": true,
///   "discovery": "ready",
///   "signing_keys": 2
/// }
/// ```
#[instrument(skip_all, name = "auth.health.check")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let discovery = state.auth_service.discovery_status().await;
    let signing_keys = state
        .auth_service
        .discovery_document()
        .await
        .map(|doc| doc.signing_key_count());

    let status = if discovery == CacheStatus::Failed {
        "degraded"
    } else {
        "healthy"
    };

    Json(HealthResponse {
        status: status.to_string(),
        auth_enabled: state.auth_service.auth_enabled(),
        discovery: discovery.to_string(),
        signing_keys,
    })
}
