//! Bearer authentication configuration.
//!
//! Configuration is loaded from environment variables once, at startup, and is
//! immutable afterwards.

use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default claim carrying the granted scopes.
pub const DEFAULT_SCOPE_CLAIM: &str = "scp";

/// Default claim used as the identity's display name.
pub const DEFAULT_NAME_CLAIM: &str = "displayName";

/// Default claim used for the identity's roles.
pub const DEFAULT_ROLE_CLAIM: &str = "role";

/// Default timeout for each discovery/JWKS HTTP request, in seconds.
pub const DEFAULT_DISCOVERY_TIMEOUT_SECONDS: u64 = 10;

/// Default server bind address for the binary.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Token validation configuration.
///
/// `auth_enabled` is advisory: the [`AuthenticationService`](crate::services::AuthenticationService)
/// always validates when asked, and the calling layer decides whether to ask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// Authority base URL; the discovery document is fetched from its well-known path.
    pub authority_url: String,

    /// Audience (application identifier) tokens must be issued for.
    pub audience: String,

    /// Scope that must be present in the scope claim.
    pub required_scope: String,

    /// Whether callers should authenticate requests at all.
    pub auth_enabled: bool,

    /// Claim holding the granted scopes (default: "scp").
    pub scope_claim: String,

    /// Claim used as the display name of the identity (default: "displayName").
    pub name_claim: String,

    /// Claim used for role membership (default: "role").
    pub role_claim: String,

    /// Allowance applied to `exp` and `nbf` checks (default: zero).
    pub clock_skew: Duration,

    /// Timeout for each discovery or JWKS request.
    pub discovery_timeout: Duration,

    /// Server bind address (binary only).
    pub bind_address: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid authority URL: {0}")]
    InvalidAuthorityUrl(String),

    #[error("Invalid AUTH_ENABLED value: {0}")]
    InvalidAuthEnabled(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidClockSkew(String),

    #[error("Invalid discovery timeout configuration: {0}")]
    InvalidDiscoveryTimeout(String),
}

impl AuthConfig {
    /// Build a configuration with defaults for everything but the three
    /// required settings.
    pub fn new(
        authority_url: impl Into<String>,
        audience: impl Into<String>,
        required_scope: impl Into<String>,
    ) -> Self {
        Self {
            authority_url: authority_url.into(),
            audience: audience.into(),
            required_scope: required_scope.into(),
            auth_enabled: true,
            scope_claim: DEFAULT_SCOPE_CLAIM.to_string(),
            name_claim: DEFAULT_NAME_CLAIM.to_string(),
            role_claim: DEFAULT_ROLE_CLAIM.to_string(),
            clock_skew: DEFAULT_CLOCK_SKEW,
            discovery_timeout: Duration::from_secs(DEFAULT_DISCOVERY_TIMEOUT_SECONDS),
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let authority_url = required(vars, "AUTH_AUTHORITY_URL")?;
        if !(authority_url.starts_with("https://") || authority_url.starts_with("http://")) {
            return Err(ConfigError::InvalidAuthorityUrl(format!(
                "AUTH_AUTHORITY_URL must be an http(s) URL, got '{}'",
                authority_url
            )));
        }

        let audience = required(vars, "AUTH_AUDIENCE")?;
        let required_scope = required(vars, "AUTH_REQUIRED_SCOPE")?;

        let mut config = Self::new(authority_url, audience, required_scope);

        if let Some(value_str) = vars.get("AUTH_ENABLED") {
            config.auth_enabled = parse_bool(value_str).ok_or_else(|| {
                ConfigError::InvalidAuthEnabled(format!(
                    "AUTH_ENABLED must be true/false/1/0, got '{}'",
                    value_str
                ))
            })?;
        }

        if let Some(claim) = non_empty(vars, "AUTH_SCOPE_CLAIM") {
            config.scope_claim = claim;
        }
        if let Some(claim) = non_empty(vars, "AUTH_NAME_CLAIM") {
            config.name_claim = claim;
        }
        if let Some(claim) = non_empty(vars, "AUTH_ROLE_CLAIM") {
            config.role_claim = claim;
        }

        // Parse JWT clock skew tolerance with validation
        if let Some(value_str) = vars.get("AUTH_CLOCK_SKEW_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidClockSkew(format!(
                    "AUTH_CLOCK_SKEW_SECONDS must be a non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value > MAX_CLOCK_SKEW.as_secs() {
                return Err(ConfigError::InvalidClockSkew(format!(
                    "AUTH_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            config.clock_skew = Duration::from_secs(value);
        }

        if let Some(value_str) = vars.get("AUTH_DISCOVERY_TIMEOUT_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidDiscoveryTimeout(format!(
                    "AUTH_DISCOVERY_TIMEOUT_SECONDS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidDiscoveryTimeout(
                    "AUTH_DISCOVERY_TIMEOUT_SECONDS must be greater than 0".to_string(),
                ));
            }

            config.discovery_timeout = Duration::from_secs(value);
        }

        if let Some(bind_address) = non_empty(vars, "BIND_ADDRESS") {
            config.bind_address = bind_address;
        }

        Ok(config)
    }
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    non_empty(vars, name).ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn non_empty(vars: &HashMap<String, String>, name: &str) -> Option<String> {
    vars.get(name)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
