//! Signing key material decoding.
//!
//! Turns JWKS entries published by the authority into verification keys.
//! Decoding is per key: a malformed entry is logged and dropped, and every
//! other key in the set stays usable.

use common::jwt::decode_jwk_component;
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// `use` value marking a key as a signature verification key.
pub const SIGNATURE_KEY_USE: &str = "sig";

/// JSON Web Key as published in the authority's JWKS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA" is the only supported family).
    pub kty: String,

    /// Key ID - used to select the correct key for verification.
    pub kid: String,

    /// Key use; only "sig" keys verify tokens.
    #[serde(default, rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,

    /// Algorithm hint published with the key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
}

impl Jwk {
    /// Whether this key is published for signature verification.
    pub fn is_signing_key(&self) -> bool {
        self.key_use.as_deref() == Some(SIGNATURE_KEY_USE)
    }
}

/// Key families the validator can verify with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    Rsa,
}

impl KeyAlgorithm {
    /// Map a JWK `kty` onto a supported key family.
    pub fn from_kty(kty: &str) -> Option<Self> {
        match kty {
            "RSA" => Some(KeyAlgorithm::Rsa),
            _ => None,
        }
    }

    /// Whether a token signed with `alg` can be verified by a key of this family.
    pub fn accepts(self, alg: Algorithm) -> bool {
        match self {
            KeyAlgorithm::Rsa => matches!(
                alg,
                Algorithm::RS256
                    | Algorithm::RS384
                    | Algorithm::RS512
                    | Algorithm::PS256
                    | Algorithm::PS384
                    | Algorithm::PS512
            ),
        }
    }
}

/// Why a single JWKS entry could not be turned into a verification key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyDecodeError {
    #[error("key is not a signature key (use={0:?})")]
    NotSigningKey(Option<String>),

    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    #[error("missing key component: {0}")]
    MissingComponent(&'static str),

    #[error("invalid base64url in key component {component}: {reason}")]
    InvalidEncoding {
        component: &'static str,
        reason: String,
    },

    #[error("key component {0} carries no numeric value")]
    EmptyComponent(&'static str),
}

/// A decoded public key, ready to verify signatures.
#[derive(Clone)]
pub struct VerificationKey {
    kid: String,
    algorithm: KeyAlgorithm,
    decoding_key: DecodingKey,
}

impl VerificationKey {
    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Decode one JWKS entry into a verification key.
///
/// # Errors
///
/// Returns `KeyDecodeError` if the entry is not a signature key, has an
/// unsupported `kty`, or its components are missing or not valid base64url.
pub fn decode_signing_key(jwk: &Jwk) -> Result<VerificationKey, KeyDecodeError> {
    if !jwk.is_signing_key() {
        return Err(KeyDecodeError::NotSigningKey(jwk.key_use.clone()));
    }

    let algorithm = KeyAlgorithm::from_kty(&jwk.kty)
        .ok_or_else(|| KeyDecodeError::UnsupportedKeyType(jwk.kty.clone()))?;

    let decoding_key = match algorithm {
        KeyAlgorithm::Rsa => {
            let modulus = decode_integer("n", jwk.n.as_deref())?;
            let exponent = decode_integer("e", jwk.e.as_deref())?;
            DecodingKey::from_rsa_raw_components(&modulus, &exponent)
        }
    };

    Ok(VerificationKey {
        kid: jwk.kid.clone(),
        algorithm,
        decoding_key,
    })
}

/// Decode every eligible key, skipping (and logging) the ones that fail.
///
/// Keys whose `use` is not "sig" are skipped silently.
pub fn decode_key_set(jwks: &[Jwk]) -> Vec<VerificationKey> {
    jwks.iter()
        .filter(|jwk| jwk.is_signing_key())
        .filter_map(|jwk| match decode_signing_key(jwk) {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::warn!(
                    target: "auth.keys",
                    kid = %jwk.kid,
                    kty = %jwk.kty,
                    error = %e,
                    "Skipping undecodable signing key"
                );
                None
            }
        })
        .collect()
}

/// Decode a big-endian unsigned integer component.
fn decode_integer(
    component: &'static str,
    value: Option<&str>,
) -> Result<Vec<u8>, KeyDecodeError> {
    let value = value
        .filter(|v| !v.is_empty())
        .ok_or(KeyDecodeError::MissingComponent(component))?;

    let bytes = decode_jwk_component(value).map_err(|e| KeyDecodeError::InvalidEncoding {
        component,
        reason: e.to_string(),
    })?;

    if bytes.iter().all(|b| *b == 0) {
        return Err(KeyDecodeError::EmptyComponent(component));
    }

    Ok(bytes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    // 2048-bit test modulus; only its decodability matters here
    const TEST_N: &str = "2ToXI22fiUqg0V4uQw1yFSqoLdfBB9lTOhOmbCaIPuOYqiScrppHXg9rf2aTUFYa4RxCYfwyy9Q6BCaVbanCAyf_EEBeULaE7UbuH2mElZnEODGYljbeRyJuoBW8d1Ljy0fGAANBdfAuGMGJW5CDXrDuiX3b0ekVCiCjs_cgCuBekCxsJME9kMZEvw9Kp8D5DK9Qhqpxube5ZVbD2PupcMTlLnSQ6K7j1wVzTXuRykMpk_qScLBlDrPrznnvmB--v3ohv3QtrfxwHb06vwVOia9LGGf4C6qCQa2SeCjh9-OU1b7aFaANA5iMdnAIArVTF_fvQ4VHanfCJr-YfyG3Ow";

    fn rsa_jwk(kid: &str) -> Jwk {
        Jwk {
            kty: "RSA".to_string(),
            kid: kid.to_string(),
            key_use: Some("sig".to_string()),
            alg: Some("RS256".to_string()),
            n: Some(TEST_N.to_string()),
            e: Some("AQAB".to_string()),
        }
    }

    #[test]
    fn test_jwk_deserialization() {
        let json = r#"{
            "kty": "RSA",
            "kid": "key-01",
            "use": "sig",
            "alg": "RS256",
            "n": "sXch",
            "e": "AQAB",
            "x5t": "ignored"
        }"#;

        let jwk: Jwk = serde_json::from_str(json).unwrap();

        assert_eq!(jwk.kty, "RSA");
        assert_eq!(jwk.kid, "key-01");
        assert_eq!(jwk.key_use.as_deref(), Some("sig"));
        assert_eq!(jwk.alg.as_deref(), Some("RS256"));
        assert_eq!(jwk.n.as_deref(), Some("sXch"));
        assert_eq!(jwk.e.as_deref(), Some("AQAB"));
        assert!(jwk.is_signing_key());
    }

    #[test]
    fn test_jwk_deserialization_minimal() {
        let jwk: Jwk = serde_json::from_str(r#"{"kty": "RSA", "kid": "key-02"}"#).unwrap();

        assert!(jwk.key_use.is_none());
        assert!(jwk.n.is_none());
        assert!(!jwk.is_signing_key());
    }

    #[test]
    fn test_decode_rsa_signing_key() {
        let key = decode_signing_key(&rsa_jwk("key-01")).unwrap();
        assert_eq!(key.kid(), "key-01");
        assert_eq!(key.algorithm(), KeyAlgorithm::Rsa);
    }

    #[test]
    fn test_decode_rejects_encryption_key() {
        let mut jwk = rsa_jwk("enc-key");
        jwk.key_use = Some("enc".to_string());

        assert_eq!(
            decode_signing_key(&jwk).unwrap_err(),
            KeyDecodeError::NotSigningKey(Some("enc".to_string()))
        );
    }

    #[test]
    fn test_decode_rejects_key_without_use() {
        let mut jwk = rsa_jwk("no-use");
        jwk.key_use = None;

        assert_eq!(
            decode_signing_key(&jwk).unwrap_err(),
            KeyDecodeError::NotSigningKey(None)
        );
    }

    #[test]
    fn test_decode_rejects_unsupported_key_type() {
        let mut jwk = rsa_jwk("ec-key");
        jwk.kty = "EC".to_string();

        assert_eq!(
            decode_signing_key(&jwk).unwrap_err(),
            KeyDecodeError::UnsupportedKeyType("EC".to_string())
        );
    }

    #[test]
    fn test_decode_rejects_missing_modulus() {
        let mut jwk = rsa_jwk("no-n");
        jwk.n = None;

        assert_eq!(
            decode_signing_key(&jwk).unwrap_err(),
            KeyDecodeError::MissingComponent("n")
        );
    }

    #[test]
    fn test_decode_rejects_invalid_base64() {
        let mut jwk = rsa_jwk("bad-e");
        jwk.e = Some("!!not base64!!".to_string());

        assert!(matches!(
            decode_signing_key(&jwk).unwrap_err(),
            KeyDecodeError::InvalidEncoding { component: "e", .. }
        ));
    }

    #[test]
    fn test_decode_rejects_zero_exponent() {
        let mut jwk = rsa_jwk("zero-e");
        jwk.e = Some("AAAA".to_string());

        assert_eq!(
            decode_signing_key(&jwk).unwrap_err(),
            KeyDecodeError::EmptyComponent("e")
        );
    }

    #[test]
    fn test_decode_key_set_isolates_failures() {
        let mut broken = rsa_jwk("broken");
        broken.n = Some("%%%".to_string());
        let mut encryption = rsa_jwk("encryption");
        encryption.key_use = Some("enc".to_string());

        let keys = decode_key_set(&[rsa_jwk("first"), broken, encryption, rsa_jwk("second")]);

        let kids: Vec<&str> = keys.iter().map(VerificationKey::kid).collect();
        assert_eq!(kids, vec!["first", "second"]);
    }

    #[test]
    fn test_rsa_accepts_only_rsa_algorithms() {
        assert!(KeyAlgorithm::Rsa.accepts(Algorithm::RS256));
        assert!(KeyAlgorithm::Rsa.accepts(Algorithm::PS512));
        assert!(!KeyAlgorithm::Rsa.accepts(Algorithm::HS256));
        assert!(!KeyAlgorithm::Rsa.accepts(Algorithm::ES256));
        assert!(!KeyAlgorithm::Rsa.accepts(Algorithm::EdDSA));
    }

    #[test]
    fn test_verification_key_debug_omits_material() {
        let key = decode_signing_key(&rsa_jwk("key-01")).unwrap();
        let debug = format!("{key:?}");
        assert!(debug.contains("key-01"));
        assert!(!debug.contains(TEST_N));
    }
}
