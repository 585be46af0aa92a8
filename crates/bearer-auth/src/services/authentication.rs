//! Request authentication service.
//!
//! Ties the pieces together: extract the bearer token, obtain the discovery
//! document (fetched lazily, single-flight), and validate the token against
//! it. Every call ends in an [`AuthOutcome`]; nothing else escapes.
//!
//! Signature verification is CPU-bound and runs on the blocking pool.

use crate::auth::discovery::{
    CacheStatus, DiscoveryCache, DiscoveryDocument, DiscoveryError, DiscoveryFetcher,
    HttpDiscoveryFetcher,
};
use crate::auth::extractor::extract_bearer_token;
use crate::auth::identity::AuthenticatedIdentity;
use crate::auth::jwt::JwtValidator;
use crate::config::AuthConfig;
use crate::errors::AuthError;
use crate::observability::metrics;
use axum::http::HeaderMap;
use common::secret::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinError;
use tracing::instrument;

/// Result of authenticating one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated(AuthenticatedIdentity),
    Rejected(AuthError),
}

impl AuthOutcome {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthOutcome::Authenticated(_))
    }

    pub fn identity(&self) -> Option<&AuthenticatedIdentity> {
        match self {
            AuthOutcome::Authenticated(identity) => Some(identity),
            AuthOutcome::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<AuthError> {
        match self {
            AuthOutcome::Authenticated(_) => None,
            AuthOutcome::Rejected(e) => Some(*e),
        }
    }

    /// Convert into a `Result`, for `?`-style callers.
    ///
    /// # Errors
    ///
    /// Returns the rejection reason for `Rejected`.
    pub fn into_result(self) -> Result<AuthenticatedIdentity, AuthError> {
        match self {
            AuthOutcome::Authenticated(identity) => Ok(identity),
            AuthOutcome::Rejected(e) => Err(e),
        }
    }
}

/// Authenticates requests carrying bearer tokens.
///
/// Cheap to share: wrap in an `Arc` and clone the handle per request.
pub struct AuthenticationService {
    /// Advisory flag for callers; validation itself never consults it.
    auth_enabled: bool,

    /// Lazily fetched discovery document.
    discovery: DiscoveryCache,

    /// Stateless validator, shared with blocking tasks.
    validator: Arc<JwtValidator>,
}

impl AuthenticationService {
    /// Create a service that discovers the authority over HTTP.
    pub fn new(config: &AuthConfig) -> Self {
        let fetcher =
            HttpDiscoveryFetcher::new(&config.authority_url, config.discovery_timeout);
        Self::with_fetcher(config, Arc::new(fetcher))
    }

    /// Create a service with a custom discovery source.
    pub fn with_fetcher(config: &AuthConfig, fetcher: Arc<dyn DiscoveryFetcher>) -> Self {
        Self {
            auth_enabled: config.auth_enabled,
            discovery: DiscoveryCache::new(fetcher),
            validator: Arc::new(JwtValidator::new(config)),
        }
    }

    /// Whether callers should authenticate requests at all.
    pub fn auth_enabled(&self) -> bool {
        self.auth_enabled
    }

    /// Authenticate a request from its headers.
    ///
    /// A missing, empty or non-bearer `Authorization` header is rejected with
    /// `MissingToken` without touching discovery or the validator.
    #[instrument(skip_all, name = "auth.service.authenticate")]
    pub async fn authenticate(&self, headers: &HeaderMap) -> AuthOutcome {
        let started = Instant::now();

        let outcome = match extract_bearer_token(headers) {
            Some(token) => self.validate_token(token).await,
            None => AuthOutcome::Rejected(AuthError::MissingToken),
        };

        record_outcome(&outcome, started);
        outcome
    }

    /// Authenticate a token the caller already extracted.
    #[instrument(skip_all, name = "auth.service.authenticate_token")]
    pub async fn authenticate_token(&self, token: SecretString) -> AuthOutcome {
        let started = Instant::now();
        let outcome = self.validate_token(token).await;
        record_outcome(&outcome, started);
        outcome
    }

    /// Force a discovery refresh. The previous document keeps serving if it fails.
    ///
    /// # Errors
    ///
    /// Returns the `DiscoveryError` of the refresh.
    pub async fn refresh_discovery(&self) -> Result<Arc<DiscoveryDocument>, DiscoveryError> {
        self.discovery.force_refresh().await
    }

    pub async fn discovery_status(&self) -> CacheStatus {
        self.discovery.status().await
    }

    /// Cached discovery document, without fetching.
    pub async fn discovery_document(&self) -> Option<Arc<DiscoveryDocument>> {
        self.discovery.current().await
    }

    async fn validate_token(&self, token: SecretString) -> AuthOutcome {
        let document = match self.discovery.get().await {
            Ok(document) => Some(document),
            Err(e) => {
                tracing::warn!(target: "auth.service", error = %e, "Discovery document unavailable");
                None
            }
        };

        let validator = Arc::clone(&self.validator);
        let verification = tokio::task::spawn_blocking(move || {
            validator.validate(token.expose_secret(), document.as_deref())
        })
        .await;

        verification_outcome(verification)
    }
}

/// Map the blocking verification task's result to an outcome. A task that
/// panicked or was cancelled is a rejection, never an authentication.
fn verification_outcome(
    verification: Result<Result<AuthenticatedIdentity, AuthError>, JoinError>,
) -> AuthOutcome {
    match verification {
        Ok(Ok(identity)) => AuthOutcome::Authenticated(identity),
        Ok(Err(e)) => AuthOutcome::Rejected(e),
        Err(e) => {
            tracing::error!(target: "auth.service", error = %e, "Token verification task failed");
            AuthOutcome::Rejected(AuthError::InternalValidationError)
        }
    }
}

fn record_outcome(outcome: &AuthOutcome, started: Instant) {
    let elapsed = started.elapsed();
    match outcome {
        AuthOutcome::Authenticated(identity) => {
            tracing::debug!(
                target: "auth.service",
                claims = identity.claims().len(),
                "Request authenticated"
            );
            metrics::record_authentication("authenticated", None, elapsed);
        }
        AuthOutcome::Rejected(e) => {
            tracing::debug!(
                target: "auth.service",
                reason = e.reason(),
                transient = e.is_transient(),
                "Request rejected"
            );
            metrics::record_authentication("rejected", Some(e.reason()), elapsed);
        }
    }
}
