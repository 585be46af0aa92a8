//! Authentication rejection taxonomy.
//!
//! Every failed authentication ends in exactly one [`AuthError`]. The variant is
//! diagnostic detail for logs and metrics only: the HTTP mapping is a single,
//! generic 401 for all of them, so an untrusted caller cannot tell which check
//! failed.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Message returned to callers for every rejection.
pub const UNAUTHENTICATED_MESSAGE: &str = "The access token is missing, invalid or expired";

/// Reason a request was not authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("no bearer token presented")]
    MissingToken,

    #[error("token is malformed")]
    MalformedToken,

    #[error("discovery document unavailable")]
    DiscoveryUnavailable,

    #[error("no signing key matches the token key id")]
    UnknownSigningKey,

    #[error("token signature is invalid")]
    SignatureInvalid,

    #[error("token has expired")]
    TokenExpired,

    #[error("token is not yet valid")]
    TokenNotYetValid,

    #[error("issuer mismatch")]
    IssuerMismatch,

    #[error("audience mismatch")]
    AudienceMismatch,

    #[error("required scope missing")]
    ScopeMissing,

    #[error("internal validation error")]
    InternalValidationError,
}

impl AuthError {
    /// Bounded label for metrics and structured logs.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::MalformedToken => "malformed_token",
            AuthError::DiscoveryUnavailable => "discovery_unavailable",
            AuthError::UnknownSigningKey => "unknown_signing_key",
            AuthError::SignatureInvalid => "signature_invalid",
            AuthError::TokenExpired => "token_expired",
            AuthError::TokenNotYetValid => "token_not_yet_valid",
            AuthError::IssuerMismatch => "issuer_mismatch",
            AuthError::AudienceMismatch => "audience_mismatch",
            AuthError::ScopeMissing => "scope_missing",
            AuthError::InternalValidationError => "internal_validation_error",
        }
    }

    /// Whether presenting the same token again may succeed later.
    ///
    /// Only a missing discovery document heals on its own, once the authority
    /// is reachable again.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::DiscoveryUnavailable)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        tracing::debug!(target: "auth.errors", reason = self.reason(), "Request not authenticated");

        let body = ErrorResponse {
            error: ErrorDetail {
                code: "UNAUTHENTICATED",
                message: UNAUTHENTICATED_MESSAGE,
            },
        };

        let mut response = (StatusCode::UNAUTHORIZED, Json(body)).into_response();
        response.headers_mut().insert(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static("Bearer error=\"invalid_token\""),
        );
        response
    }
}
