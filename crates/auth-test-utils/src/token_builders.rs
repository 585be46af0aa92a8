//! Builder patterns for test data construction
//!
//! Provides a fluent API for creating signed test tokens.

use crate::crypto_fixtures::TestSigningKey;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, Header};
use serde_json::{json, Map, Value};

/// Issuer published by the mock authority unless a test overrides it.
pub const TEST_ISSUER: &str = "https://issuer.example";

/// Audience the default token is issued for.
pub const TEST_AUDIENCE: &str = "api://app1";

/// Builder for signed test JWTs
///
/// Defaults produce a token that passes validation against [`TEST_ISSUER`],
/// [`TEST_AUDIENCE`] and required scope "read".
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .for_user("alice")
///     .with_scope("read write")
///     .expires_in(3600)
///     .sign(&PRIMARY_KEY);
/// ```
pub struct TestTokenBuilder {
    claims: Map<String, Value>,
    algorithm: Algorithm,
    kid: Option<Option<String>>,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults
    pub fn new() -> Self {
        let now = Utc::now();
        let mut claims = Map::new();
        claims.insert("iss".to_string(), json!(TEST_ISSUER));
        claims.insert("aud".to_string(), json!(TEST_AUDIENCE));
        claims.insert("sub".to_string(), json!("test-subject"));
        claims.insert("scp".to_string(), json!("read write"));
        claims.insert("displayName".to_string(), json!("Test User"));
        claims.insert("iat".to_string(), json!(now.timestamp()));
        claims.insert(
            "exp".to_string(),
            json!((now + Duration::seconds(3600)).timestamp()),
        );

        Self {
            claims,
            algorithm: Algorithm::RS256,
            kid: None,
        }
    }

    /// Set the subject
    pub fn for_user(self, subject: &str) -> Self {
        self.with_claim("sub", json!(subject))
    }

    pub fn with_issuer(self, issuer: &str) -> Self {
        self.with_claim("iss", json!(issuer))
    }

    /// Set a single string audience
    pub fn with_audience(self, audience: &str) -> Self {
        self.with_claim("aud", json!(audience))
    }

    /// Set an array audience
    pub fn with_audiences(self, audiences: &[&str]) -> Self {
        self.with_claim("aud", json!(audiences))
    }

    /// Set the scope (space-separated) in the `scp` claim
    pub fn with_scope(self, scope: &str) -> Self {
        self.with_claim("scp", json!(scope))
    }

    pub fn with_display_name(self, name: &str) -> Self {
        self.with_claim("displayName", json!(name))
    }

    pub fn with_roles(self, roles: &[&str]) -> Self {
        self.with_claim("role", json!(roles))
    }

    /// Set expiration in seconds from now (negative for the past)
    pub fn expires_in(self, seconds: i64) -> Self {
        let exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self.with_claim("exp", json!(exp))
    }

    /// Set not-before in seconds from now
    pub fn not_before_in(self, seconds: i64) -> Self {
        let nbf = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self.with_claim("nbf", json!(nbf))
    }

    /// Set or replace an arbitrary claim
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    pub fn without_claim(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Header algorithm (defaults to RS256)
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Override the header `kid` instead of using the signing key's id
    pub fn with_kid(mut self, kid: &str) -> Self {
        self.kid = Some(Some(kid.to_string()));
        self
    }

    /// Omit the header `kid` entirely
    pub fn without_kid(mut self) -> Self {
        self.kid = Some(None);
        self
    }

    /// Build the claims as a JSON value
    pub fn claims(&self) -> Value {
        Value::Object(self.claims.clone())
    }

    /// Sign the token with the given key
    pub fn sign(self, key: &TestSigningKey) -> String {
        let mut header = Header::new(self.algorithm);
        header.kid = match self.kid {
            Some(kid) => kid,
            None => Some(key.kid.to_string()),
        };

        encode(&header, &Value::Object(self.claims), &key.encoding_key())
            .expect("test token should encode")
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Build an unsigned token string from raw header and payload JSON.
///
/// The signature segment is arbitrary; useful for malformed-header cases.
pub fn raw_token(header: &Value, payload: &Value) -> String {
    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(payload.to_string()),
        URL_SAFE_NO_PAD.encode(b"not-a-signature")
    )
}

/// Replace the payload of a signed token, keeping its header and signature.
pub fn with_tampered_payload(token: &str, payload: &Value) -> String {
    let mut parts = token.split('.');
    let header = parts.next().expect("token should have a header");
    let _ = parts.next();
    let signature = parts.next().expect("token should have a signature");
    format!(
        "{}.{}.{}",
        header,
        URL_SAFE_NO_PAD.encode(payload.to_string()),
        signature
    )
}
