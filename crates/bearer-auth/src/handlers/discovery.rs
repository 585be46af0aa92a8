//! Discovery refresh handler.
//!
//! Lets an operator pick up a key rotation without restarting the service.
//!
//! The route is operational and takes no bearer token: after the authority
//! retires the cached signing keys no token verifies, and the refresh must
//! still be reachable. Attempts are spaced by a cooldown instead.

use crate::routes::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::instrument;

/// Minimum spacing between forced refresh attempts.
pub const REFRESH_COOLDOWN: Duration = Duration::from_secs(5);

/// Spaces out forced refreshes so callers cannot make the service hammer the
/// authority.
#[derive(Debug)]
pub struct RefreshThrottle {
    cooldown: Duration,
    last_attempt: Mutex<Option<Instant>>,
}

impl RefreshThrottle {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_attempt: Mutex::new(None),
        }
    }

    /// Claim the next refresh attempt. Returns false while the previous
    /// attempt is within the cooldown.
    pub async fn try_acquire(&self) -> bool {
        let mut last_attempt = self.last_attempt.lock().await;
        let now = Instant::now();

        if let Some(previous) = *last_attempt {
            if now.duration_since(previous) < self.cooldown {
                return false;
            }
        }

        *last_attempt = Some(now);
        true
    }
}

impl Default for RefreshThrottle {
    fn default() -> Self {
        Self::new(REFRESH_COOLDOWN)
    }
}

/// Response for `POST /v1/discovery/refresh`.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshResponse {
    /// "refreshed", "failed" or "throttled".
    pub status: String,

    /// Signing keys in the document now in use, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_keys: Option<usize>,
}

/// Handler for POST /v1/discovery/refresh
///
/// Returns 200 with the new key count on success. On failure returns 503; the
/// previously cached document, if any, stays in use. Returns 429 without
/// contacting the authority when called again within [`REFRESH_COOLDOWN`].
#[instrument(skip_all, name = "auth.handlers.discovery_refresh")]
pub async fn refresh_discovery(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<RefreshResponse>) {
    if !state.refresh_throttle.try_acquire().await {
        tracing::debug!(target: "auth.handlers.discovery", "Discovery refresh throttled");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(RefreshResponse {
                status: "throttled".to_string(),
                signing_keys: current_key_count(&state).await,
            }),
        );
    }

    match state.auth_service.refresh_discovery().await {
        Ok(document) => {
            tracing::info!(
                target: "auth.handlers.discovery",
                key_count = document.signing_key_count(),
                "Discovery refreshed on request"
            );
            (
                StatusCode::OK,
                Json(RefreshResponse {
                    status: "refreshed".to_string(),
                    signing_keys: Some(document.signing_key_count()),
                }),
            )
        }
        Err(e) => {
            tracing::warn!(target: "auth.handlers.discovery", error = %e, "Requested discovery refresh failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(RefreshResponse {
                    status: "failed".to_string(),
                    signing_keys: current_key_count(&state).await,
                }),
            )
        }
    }
}

async fn current_key_count(state: &AppState) -> Option<usize> {
    state
        .auth_service
        .discovery_document()
        .await
        .map(|doc| doc.signing_key_count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_throttle_blocks_within_cooldown() {
        let throttle = RefreshThrottle::new(Duration::from_secs(60));

        assert!(throttle.try_acquire().await);
        assert!(!throttle.try_acquire().await);
    }

    #[tokio::test]
    async fn test_throttle_allows_after_cooldown() {
        let throttle = RefreshThrottle::new(Duration::from_millis(20));

        assert!(throttle.try_acquire().await);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(throttle.try_acquire().await);
    }

    #[tokio::test]
    async fn test_zero_cooldown_never_throttles() {
        let throttle = RefreshThrottle::new(Duration::ZERO);

        for _ in 0..3 {
            assert!(throttle.try_acquire().await);
        }
    }
}
