//! JWT utilities shared across the bearer-auth workspace.
//!
//! This module provides the structural pieces of JWT validation that do not
//! depend on any particular key source:
//! - Size limits for DoS prevention
//! - Clock skew constants for temporal claim validation
//! - Header parsing (`kid` and `alg`) ahead of signature verification
//! - `exp` / `nbf` validation against an explicit `now`
//! - base64url decoding of JWK key components
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Header parsing never implies the token is trusted; the signature must
//!   still be verified with the key selected by `kid`
//! - Error messages are generic to prevent information leakage
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{parse_header, validate_exp_at, DEFAULT_CLOCK_SKEW};
//!
//! let header = parse_header(token)?;
//! let key = key_set.get(&header.kid)?;
//! // ... verify signature with `key` and `header.alg` ...
//! validate_exp_at(claims_exp, DEFAULT_CLOCK_SKEW, now)?;
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::Algorithm;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this size are rejected BEFORE any parsing or cryptographic
/// operations.
///
/// # Rationale
///
/// - Typical RSA-signed access tokens are 800-1500 bytes
/// - Tokens carrying group or role lists grow, but stay well below 8KB
/// - Checked BEFORE base64 decode and signature verification
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default clock skew tolerance for `exp` and `nbf` checks.
///
/// Zero: a token is rejected the second it expires unless a deployment
/// explicitly configures an allowance.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::ZERO;

/// Maximum allowed clock skew tolerance (10 minutes).
///
/// Prevents misconfiguration that would keep expired tokens alive for long.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during structural or temporal JWT validation.
///
/// Note: Error messages are intentionally generic to prevent information leakage.
/// Detailed information is logged at debug level for troubleshooting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Token is missing required `kid` header.
    #[error("The access token is invalid or expired")]
    MissingKid,

    /// Token `alg` header is missing, unknown, or `none`.
    #[error("The access token is invalid or expired")]
    UnsupportedAlgorithm,

    /// Token carries no usable `exp` claim.
    #[error("The access token is invalid or expired")]
    MissingExpiry,

    /// Token `exp` is in the past (beyond clock skew).
    #[error("The access token is invalid or expired")]
    Expired,

    /// Token `nbf` is in the future (beyond clock skew).
    #[error("The access token is invalid or expired")]
    NotYetValid,
}

// =============================================================================
// Header Types
// =============================================================================

/// The parts of a JWT header needed to pick a verification key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenHeader {
    /// Key ID claimed by the token.
    pub kid: String,

    /// Signature algorithm claimed by the token.
    pub alg: Algorithm,
}

// =============================================================================
// Functions
// =============================================================================

/// Parse the JWT header without verifying the signature.
///
/// Returns the `kid` used to select a key from the JWKS and the `alg` the
/// signature must be verified with.
///
/// # Security
///
/// - Token size is checked BEFORE any parsing (denial-of-service prevention)
/// - This function does NOT validate the token signature
/// - The `kid` value should only be used for key lookup in a trusted JWKS
///
/// # Errors
///
/// Returns `JwtValidationError` variants:
/// - `TokenTooLarge` - Token exceeds size limit
/// - `MalformedToken` - Wrong segment count, bad base64, invalid JSON
/// - `MissingKid` - Header has no non-empty string `kid`
/// - `UnsupportedAlgorithm` - Header `alg` is missing or not a known JWS algorithm
pub fn parse_header(token: &str) -> Result<TokenHeader, JwtValidationError> {
    // Check token size first (DoS prevention)
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 || parts.iter().any(|part| part.is_empty()) {
        tracing::debug!(
            target: "common.jwt",
            parts = parts.len(),
            "Token rejected: invalid JWT format"
        );
        return Err(JwtValidationError::MalformedToken);
    }

    let header_part = parts.first().ok_or(JwtValidationError::MalformedToken)?;
    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtValidationError::MalformedToken
    })?;

    let header: serde_json::Value = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtValidationError::MalformedToken
    })?;

    // Extract kid as string, rejecting empty values
    let kid = header
        .get("kid")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(JwtValidationError::MissingKid)?;

    // "none" is not a jsonwebtoken Algorithm, so it fails here as well
    let alg = header
        .get("alg")
        .and_then(|v| v.as_str())
        .and_then(|s| Algorithm::from_str(s).ok())
        .ok_or_else(|| {
            tracing::debug!(target: "common.jwt", kid = %kid, "Token rejected: unsupported alg");
            JwtValidationError::UnsupportedAlgorithm
        })?;

    Ok(TokenHeader { kid, alg })
}

/// Read a JWT `NumericDate` claim value.
///
/// Accepts integers and (truncated) fractional seconds. Anything else yields `None`.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // float-to-int `as` saturates
pub fn numeric_date(value: &serde_json::Value) -> Option<i64> {
    if let Some(seconds) = value.as_i64() {
        return Some(seconds);
    }
    value.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)
}

/// Deterministic `exp` validation against an explicit `now` timestamp.
///
/// A token is expired once `exp + clock_skew < now`; `exp == now` is still valid.
///
/// # Errors
///
/// - `MissingExpiry` - The token carries no `exp`
/// - `Expired` - `exp` lies more than `clock_skew` in the past
pub fn validate_exp_at(
    exp: Option<i64>,
    clock_skew: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    let exp = exp.ok_or_else(|| {
        tracing::debug!(target: "common.jwt", "Token rejected: missing exp");
        JwtValidationError::MissingExpiry
    })?;

    let clock_skew_secs = skew_seconds(clock_skew);
    if exp.saturating_add(clock_skew_secs) < now {
        tracing::debug!(
            target: "common.jwt",
            exp = exp,
            now = now,
            clock_skew_secs = clock_skew_secs,
            "Token rejected: expired"
        );
        return Err(JwtValidationError::Expired);
    }

    Ok(())
}

/// Deterministic `nbf` validation against an explicit `now` timestamp.
///
/// Tokens without `nbf` are accepted.
///
/// # Errors
///
/// Returns `NotYetValid` if `nbf` lies more than `clock_skew` in the future.
pub fn validate_nbf_at(
    nbf: Option<i64>,
    clock_skew: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    let Some(nbf) = nbf else {
        return Ok(());
    };

    let clock_skew_secs = skew_seconds(clock_skew);
    if nbf.saturating_sub(clock_skew_secs) > now {
        tracing::debug!(
            target: "common.jwt",
            nbf = nbf,
            now = now,
            clock_skew_secs = clock_skew_secs,
            "Token rejected: not yet valid"
        );
        return Err(JwtValidationError::NotYetValid);
    }

    Ok(())
}

fn skew_seconds(clock_skew: Duration) -> i64 {
    i64::try_from(clock_skew.as_secs()).unwrap_or(i64::MAX)
}

/// Decode a base64url JWK component (`n`, `e`, `x`, ...).
///
/// Authorities are supposed to publish unpadded base64url, but some emit
/// trailing `=` padding; it is tolerated.
///
/// # Errors
///
/// Returns `base64::DecodeError` if the content is not valid base64url.
pub fn decode_jwk_component(value_b64url: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(value_b64url.trim_end_matches('='))
}

// =============================================================================
// Tests
// =============================================================================
