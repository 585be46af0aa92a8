//! Authentication middleware for protected routes.
//!
//! Authenticates the request through the [`AuthenticationService`] and injects
//! the [`AuthenticatedIdentity`] into request extensions.

use crate::auth::identity::AuthenticatedIdentity;
use crate::errors::AuthError;
use crate::services::{AuthOutcome, AuthenticationService};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    /// Authentication service shared by every request.
    pub auth_service: Arc<AuthenticationService>,
}

/// Authentication middleware that validates bearer tokens.
///
/// # Authorization Header Format
///
/// ```text
/// Authorization: Bearer <token>
/// ```
///
/// # Response
///
/// - Passes every request through untouched when authentication is disabled
/// - Returns 401 Unauthorized with WWW-Authenticate header for any rejection
/// - Continues to next handler with the identity in extensions otherwise
#[instrument(skip(state, req, next), name = "auth.middleware")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if !state.auth_service.auth_enabled() {
        tracing::trace!(target: "auth.middleware", "Authentication disabled, passing through");
        return Ok(next.run(req).await);
    }

    match state.auth_service.authenticate(req.headers()).await {
        AuthOutcome::Authenticated(identity) => {
            req.extensions_mut().insert(identity);
            Ok(next.run(req).await)
        }
        AuthOutcome::Rejected(e) => Err(e),
    }
}

/// Extension trait for extracting the identity from a request.
pub trait IdentityExt {
    /// Get the authenticated identity from request extensions.
    ///
    /// Returns `None` if the auth middleware was not applied to this request
    /// or authentication is disabled.
    fn identity(&self) -> Option<&AuthenticatedIdentity>;
}

impl<B> IdentityExt for axum::extract::Request<B> {
    fn identity(&self) -> Option<&AuthenticatedIdentity> {
        self.extensions().get::<AuthenticatedIdentity>()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    // Middleware behaviour against a mock authority is covered in
    // tests/middleware_tests.rs.

    use super::*;
    use axum::body::Body;

    #[test]
    fn test_auth_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AuthState>();
    }

    #[test]
    fn test_identity_absent_without_middleware() {
        let req = Request::builder().body(Body::empty()).unwrap();
        assert!(req.identity().is_none());
    }
}
