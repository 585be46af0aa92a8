//! Authenticated identity built from a validated token.
//!
//! Claim values are redacted in Debug output; only claim names are shown.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// A single claim. Names may repeat (e.g. one `role` claim per role).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Claim {
    pub name: String,
    pub value: String,
}

impl Claim {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Identity produced only after every validation check passed.
///
/// The display name and roles are read through the configured claim keys, so
/// the same token can surface `displayName`, `name` or any other claim as the
/// identity name depending on deployment.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthenticatedIdentity {
    claims: Vec<Claim>,
    name_claim: String,
    role_claim: String,
}

impl AuthenticatedIdentity {
    /// Flatten a verified payload into claims.
    ///
    /// Arrays become one claim per element, scalars are rendered as strings,
    /// nested objects are kept as compact JSON and nulls are dropped.
    pub(crate) fn from_payload(
        payload: &Map<String, Value>,
        name_claim: &str,
        role_claim: &str,
    ) -> Self {
        let mut claims = Vec::with_capacity(payload.len());
        for (name, value) in payload {
            match value {
                Value::Array(items) => {
                    for item in items {
                        push_claim(&mut claims, name, item);
                    }
                }
                other => push_claim(&mut claims, name, other),
            }
        }

        Self {
            claims,
            name_claim: name_claim.to_string(),
            role_claim: role_claim.to_string(),
        }
    }

    /// All claims, sorted by claim name. Array elements keep their token order.
    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    /// Always true: unauthenticated identities are never constructed.
    pub fn is_authenticated(&self) -> bool {
        true
    }

    /// First value of the named claim.
    pub fn find_first(&self, name: &str) -> Option<&str> {
        self.claims
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value.as_str())
    }

    /// Every value of the named claim.
    pub fn find_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.claims
            .iter()
            .filter(move |c| c.name == name)
            .map(|c| c.value.as_str())
    }

    pub fn has_claim(&self, name: &str, value: &str) -> bool {
        self.find_all(name).any(|v| v == value)
    }

    /// Display name, read from the configured name claim.
    pub fn name(&self) -> Option<&str> {
        self.find_first(&self.name_claim)
    }

    /// Roles, read from the configured role claim.
    pub fn roles(&self) -> Vec<&str> {
        self.find_all(&self.role_claim).collect()
    }

    pub fn is_in_role(&self, role: &str) -> bool {
        self.has_claim(&self.role_claim, role)
    }

    /// Subject (`sub`) of the token.
    pub fn subject(&self) -> Option<&str> {
        self.find_first("sub")
    }

    pub fn name_claim(&self) -> &str {
        &self.name_claim
    }

    pub fn role_claim(&self) -> &str {
        &self.role_claim
    }
}

fn push_claim(claims: &mut Vec<Claim>, name: &str, value: &Value) {
    let rendered = match value {
        Value::Null => return,
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    };
    claims.push(Claim::new(name, rendered));
}

/// Custom Debug implementation that redacts claim values.
impl fmt::Debug for AuthenticatedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.claims.iter().map(|c| c.name.as_str()).collect();
        f.debug_struct("AuthenticatedIdentity")
            .field("claims", &names)
            .field("values", &"[REDACTED]")
            .field("name_claim", &self.name_claim)
            .field("role_claim", &self.role_claim)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn identity(payload: Value) -> AuthenticatedIdentity {
        let map = payload.as_object().cloned().unwrap();
        AuthenticatedIdentity::from_payload(&map, "displayName", "role")
    }

    #[test]
    fn test_scalars_become_claims() {
        let id = identity(json!({
            "sub": "user-123",
            "exp": 1_700_000_000,
            "email_verified": true
        }));

        assert_eq!(id.subject(), Some("user-123"));
        assert_eq!(id.find_first("exp"), Some("1700000000"));
        assert_eq!(id.find_first("email_verified"), Some("true"));
        assert!(id.is_authenticated());
    }

    #[test]
    fn test_arrays_become_repeated_claims() {
        let id = identity(json!({
            "role": ["admin", "reader"],
            "aud": ["api://app1", "api://app2"]
        }));

        assert_eq!(id.roles(), vec!["admin", "reader"]);
        assert!(id.is_in_role("admin"));
        assert!(!id.is_in_role("writer"));
        assert_eq!(id.find_all("aud").count(), 2);
    }

    #[test]
    fn test_claims_sorted_by_name() {
        let id = identity(json!({
            "sub": "user-123",
            "role": ["writer", "admin"],
            "iss": "https://issuer.example"
        }));

        let names: Vec<&str> = id.claims().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["iss", "role", "role", "sub"]);
        assert_eq!(id.roles(), vec!["writer", "admin"]);
    }

    #[test]
    fn test_nulls_dropped_objects_kept_as_json() {
        let id = identity(json!({
            "middle_name": null,
            "address": {"country": "NZ"}
        }));

        assert_eq!(id.find_first("middle_name"), None);
        assert_eq!(id.find_first("address"), Some(r#"{"country":"NZ"}"#));
    }

    #[test]
    fn test_name_uses_configured_claim() {
        let payload = json!({"displayName": "Ada", "name": "ada@example"});
        let map = payload.as_object().cloned().unwrap();

        let by_display = AuthenticatedIdentity::from_payload(&map, "displayName", "role");
        assert_eq!(by_display.name(), Some("Ada"));

        let by_name = AuthenticatedIdentity::from_payload(&map, "name", "role");
        assert_eq!(by_name.name(), Some("ada@example"));
        assert_eq!(by_name.name_claim(), "name");
    }

    #[test]
    fn test_roles_use_configured_claim() {
        let payload = json!({"role": "ignored", "roles": ["ops"]});
        let map = payload.as_object().cloned().unwrap();

        let id = AuthenticatedIdentity::from_payload(&map, "displayName", "roles");
        assert_eq!(id.roles(), vec!["ops"]);
        assert_eq!(id.role_claim(), "roles");
    }

    #[test]
    fn test_has_claim_checks_every_value() {
        let id = identity(json!({"groups": ["a", "b", "c"]}));
        assert!(id.has_claim("groups", "c"));
        assert!(!id.has_claim("groups", "d"));
    }

    #[test]
    fn test_debug_redacts_values() {
        let id = identity(json!({"sub": "secret-user-id", "displayName": "Ada"}));
        let debug_str = format!("{id:?}");

        assert!(debug_str.contains("sub"));
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("secret-user-id"));
        assert!(!debug_str.contains("Ada"));
    }
}
