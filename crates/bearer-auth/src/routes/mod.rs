//! HTTP routes.
//!
//! Defines the Axum router and application state.

use crate::handlers;
use crate::handlers::discovery::RefreshThrottle;
use crate::middleware::{require_auth, AuthState};
use crate::services::AuthenticationService;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Authentication service (also used by the auth middleware).
    pub auth_service: Arc<AuthenticationService>,

    /// Cooldown for forced discovery refreshes.
    pub refresh_throttle: Arc<RefreshThrottle>,
}

impl AppState {
    /// State with the default refresh cooldown.
    pub fn new(auth_service: Arc<AuthenticationService>) -> Self {
        Self {
            auth_service,
            refresh_throttle: Arc::new(RefreshThrottle::default()),
        }
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/v1/health` - Health check with discovery cache status - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `/v1/discovery/refresh` - Forced discovery refresh - operational, throttled
/// - `/v1/me` - Current identity - requires authentication
/// - TraceLayer for request logging
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let auth_state = Arc::new(AuthState {
        auth_service: Arc::clone(&state.auth_service),
    });

    // Public routes (no authentication required). Refresh must not depend on
    // the cached keys it replaces.
    let public_routes = Router::new()
        .route("/v1/health", get(handlers::health_check))
        .route("/v1/discovery/refresh", post(handlers::refresh_discovery))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route("/v1/me", get(handlers::get_me))
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use tower::ServiceExt;

    fn app() -> Router {
        // Nothing listens on port 9
        let config = AuthConfig::new("http://127.0.0.1:9", "api://app1", "read");
        let state = Arc::new(AppState::new(Arc::new(AuthenticationService::new(
            &config,
        ))));
        build_routes(state, PrometheusBuilder::new().build_recorder().handle())
    }

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[tokio::test]
    async fn test_health_route_is_public() {
        let response = app()
            .oneshot(Request::get("/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["discovery"], "empty");
    }

    #[tokio::test]
    async fn test_protected_route_without_token() {
        let response = app()
            .oneshot(Request::get("/v1/me").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key("www-authenticate"));
    }

    #[tokio::test]
    async fn test_refresh_route_needs_no_token() {
        let response = app()
            .oneshot(
                Request::post("/v1/discovery/refresh")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        // Reaches the handler, which cannot contact the authority
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "failed");
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let response = app()
            .oneshot(Request::get("/v1/unknown").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
