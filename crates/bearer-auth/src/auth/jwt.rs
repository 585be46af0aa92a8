//! JWT validation against the authority's discovery document.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - The header `alg` must belong to the selected key's family; `none` and
//!   HMAC algorithms never verify against published keys
//! - `exp` is mandatory; `exp` and `nbf` honour the configured clock skew
//! - Issuer, audience and scope are checked only after the signature verifies
//! - Every failure maps to one [`AuthError`]; the validator never panics

use crate::auth::discovery::DiscoveryDocument;
use crate::auth::identity::AuthenticatedIdentity;
use crate::auth::keys::VerificationKey;
use crate::config::AuthConfig;
use crate::errors::AuthError;
use common::jwt::{
    numeric_date, parse_header, validate_exp_at, validate_nbf_at, JwtValidationError,
};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, Validation};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::instrument;

/// Verified token payload.
type Payload = Map<String, Value>;

/// Stateless JWT validator. The discovery document is supplied per call.
#[derive(Debug, Clone)]
pub struct JwtValidator {
    /// Audience tokens must be issued for.
    audience: String,

    /// Scope that must be granted.
    required_scope: String,

    /// Claim holding the granted scopes.
    scope_claim: String,

    /// Claim keys handed to the identity.
    name_claim: String,
    role_claim: String,

    /// Allowance for `exp` and `nbf`.
    clock_skew: Duration,
}

impl JwtValidator {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            audience: config.audience.clone(),
            required_scope: config.required_scope.clone(),
            scope_claim: config.scope_claim.clone(),
            name_claim: config.name_claim.clone(),
            role_claim: config.role_claim.clone(),
            clock_skew: config.clock_skew,
        }
    }

    /// Validate a token against the current time.
    ///
    /// # Errors
    ///
    /// See [`validate_at`](Self::validate_at).
    pub fn validate(
        &self,
        token: &str,
        document: Option<&DiscoveryDocument>,
    ) -> Result<AuthenticatedIdentity, AuthError> {
        self.validate_at(token, document, chrono::Utc::now().timestamp())
    }

    /// Validate a token against an explicit `now` (seconds since the epoch).
    ///
    /// # Checks, in order
    ///
    /// 1. A discovery document is available
    /// 2. Header parses (size, structure, `kid`, known `alg`)
    /// 3. `kid` selects a published signature key
    /// 4. Signature verifies with that key under the header `alg`
    /// 5. `exp` (required) and `nbf` are within the skew window
    /// 6. `iss` equals the document issuer exactly
    /// 7. `aud` contains the configured audience
    /// 8. The scope claim contains the required scope
    ///
    /// # Errors
    ///
    /// Returns the `AuthError` of the first check that fails.
    #[instrument(skip_all)]
    pub fn validate_at(
        &self,
        token: &str,
        document: Option<&DiscoveryDocument>,
        now: i64,
    ) -> Result<AuthenticatedIdentity, AuthError> {
        let document = document.ok_or_else(|| {
            tracing::debug!(target: "auth.jwt", "No discovery document available");
            AuthError::DiscoveryUnavailable
        })?;

        let header = parse_header(token).map_err(|e| {
            tracing::debug!(target: "auth.jwt", error = ?e, "Token header rejected");
            AuthError::MalformedToken
        })?;

        let key = document.signing_key(&header.kid).ok_or_else(|| {
            tracing::debug!(target: "auth.jwt", kid = %header.kid, "No signing key matches kid");
            AuthError::UnknownSigningKey
        })?;

        let payload = verify_signature(token, key, header.alg)?;

        self.check_lifetime(&payload, now)?;
        check_issuer(&payload, document.issuer())?;
        self.check_audience(&payload)?;
        self.check_scope(&payload)?;

        Ok(AuthenticatedIdentity::from_payload(
            &payload,
            &self.name_claim,
            &self.role_claim,
        ))
    }

    fn check_lifetime(&self, payload: &Payload, now: i64) -> Result<(), AuthError> {
        let exp = optional_numeric_date(payload, "exp")?;
        validate_exp_at(exp, self.clock_skew, now).map_err(|e| match e {
            JwtValidationError::MissingExpiry | JwtValidationError::Expired => {
                AuthError::TokenExpired
            }
            _ => AuthError::MalformedToken,
        })?;

        let nbf = optional_numeric_date(payload, "nbf")?;
        validate_nbf_at(nbf, self.clock_skew, now).map_err(|e| match e {
            JwtValidationError::NotYetValid => AuthError::TokenNotYetValid,
            _ => AuthError::MalformedToken,
        })
    }

    fn check_audience(&self, payload: &Payload) -> Result<(), AuthError> {
        let matches = match payload.get("aud") {
            Some(Value::String(aud)) => *aud == self.audience,
            Some(Value::Array(auds)) => auds
                .iter()
                .any(|aud| aud.as_str() == Some(self.audience.as_str())),
            _ => false,
        };

        if matches {
            Ok(())
        } else {
            tracing::debug!(target: "auth.jwt", "Token audience mismatch");
            Err(AuthError::AudienceMismatch)
        }
    }

    fn check_scope(&self, payload: &Payload) -> Result<(), AuthError> {
        let required = self.required_scope.as_str();
        let granted = match payload.get(&self.scope_claim) {
            Some(Value::String(scopes)) => scopes.split_whitespace().any(|s| s == required),
            Some(Value::Array(scopes)) => scopes.iter().any(|s| s.as_str() == Some(required)),
            _ => false,
        };

        if granted {
            Ok(())
        } else {
            tracing::debug!(
                target: "auth.jwt",
                scope_claim = %self.scope_claim,
                "Token lacks required scope"
            );
            Err(AuthError::ScopeMissing)
        }
    }
}

/// Verify the signature and decode the payload.
///
/// Temporal and audience checks are disabled here; they run afterwards with
/// the configured skew and claim semantics.
fn verify_signature(
    token: &str,
    key: &VerificationKey,
    alg: Algorithm,
) -> Result<Payload, AuthError> {
    if !key.algorithm().accepts(alg) {
        tracing::debug!(
            target: "auth.jwt",
            kid = %key.kid(),
            alg = ?alg,
            "Token algorithm not accepted by signing key"
        );
        return Err(AuthError::SignatureInvalid);
    }

    let mut validation = Validation::new(alg);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let token_data = decode::<Payload>(token, key.decoding_key(), &validation).map_err(|e| {
        let mapped = decode_error_reason(e.kind());
        tracing::debug!(
            target: "auth.jwt",
            kid = %key.kid(),
            error = %e,
            reason = mapped.reason(),
            "Token verification failed"
        );
        mapped
    })?;

    Ok(token_data.claims)
}

/// Anything that is not a bad token or a bad signature is a verifier fault.
fn decode_error_reason(kind: &ErrorKind) -> AuthError {
    match kind {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => AuthError::SignatureInvalid,
        ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
            AuthError::MalformedToken
        }
        _ => AuthError::InternalValidationError,
    }
}

fn check_issuer(payload: &Payload, expected: &str) -> Result<(), AuthError> {
    match payload.get("iss").and_then(Value::as_str) {
        Some(iss) if iss == expected => Ok(()),
        _ => {
            tracing::debug!(target: "auth.jwt", "Token issuer mismatch");
            Err(AuthError::IssuerMismatch)
        }
    }
}

/// Read an optional `NumericDate` claim; present but non-numeric is malformed.
fn optional_numeric_date(payload: &Payload, claim: &str) -> Result<Option<i64>, AuthError> {
    match payload.get(claim) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => numeric_date(value).map(Some).ok_or_else(|| {
            tracing::debug!(target: "auth.jwt", claim = claim, "Non-numeric date claim");
            AuthError::MalformedToken
        }),
    }
}
