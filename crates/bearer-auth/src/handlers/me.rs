//! Current identity handler.
//!
//! Returns the identity the auth middleware established for this request.

use crate::auth::identity::{AuthenticatedIdentity, Claim};
use axum::{Extension, Json};
use serde::Serialize;
use tracing::instrument;

/// Response for `/v1/me` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    /// False only when authentication is disabled.
    pub authenticated: bool,

    /// Subject (`sub`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Display name, from the configured name claim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Roles, from the configured role claim.
    pub roles: Vec<String>,

    /// Every claim of the validated token.
    pub claims: Vec<Claim>,
}

impl From<&AuthenticatedIdentity> for MeResponse {
    fn from(identity: &AuthenticatedIdentity) -> Self {
        Self {
            authenticated: identity.is_authenticated(),
            sub: identity.subject().map(ToString::to_string),
            name: identity.name().map(ToString::to_string),
            roles: identity.roles().into_iter().map(ToString::to_string).collect(),
            claims: identity.claims().to_vec(),
        }
    }
}

/// Handler for GET /v1/me
///
/// ## Response
///
/// ```json
/// {
///   "authenticated": true,
///   "sub": "user-123",
///   "name": "Ada Lovelace",
///   "roles": ["admin"],
///   "claims": [{"name": "sub", "value": "user-123"}]
/// }
/// ```
#[instrument(skip_all, name = "auth.handlers.me")]
pub async fn get_me(identity: Option<Extension<AuthenticatedIdentity>>) -> Json<MeResponse> {
    match identity {
        Some(Extension(identity)) => {
            tracing::debug!(target: "auth.handlers.me", "Returning identity");
            Json(MeResponse::from(&identity))
        }
        None => Json(MeResponse {
            authenticated: false,
            sub: None,
            name: None,
            roles: Vec::new(),
            claims: Vec::new(),
        }),
    }
}
