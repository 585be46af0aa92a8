//! OIDC discovery document fetching and caching.
//!
//! The authority publishes its issuer and JWKS location at
//! `{authority}/.well-known/openid-configuration`. The document and its keys are
//! fetched lazily, on first use, and cached until an explicit refresh succeeds.
//!
//! # Single-flight
//!
//! The cache is a small state machine behind a `tokio::sync::Mutex`:
//!
//! ```text
//! Empty ──get──▶ Fetching ──ok──▶ Ready ──force_refresh──▶ Refreshing ──ok──▶ Ready (new)
//!                   │                                          │
//!                   └──err──▶ Failed ──get──▶ Fetching         └──err──▶ Ready (previous)
//! ```
//!
//! At most one fetch is in flight. Concurrent callers join it through a shared
//! future and all observe the same result. The lock is never held across the
//! network request. The fetch itself runs on a spawned task, so a caller that
//! is cancelled mid-wait cannot leave the cache stuck in `Fetching`.

use crate::auth::keys::{decode_key_set, Jwk, VerificationKey};
use crate::observability::metrics;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::instrument;

/// Well-known path of the OIDC discovery document.
pub const WELL_KNOWN_PATH: &str = "/.well-known/openid-configuration";

/// Why the discovery document could not be obtained.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("invalid document from {url}: {reason}")]
    InvalidDocument { url: String, reason: String },

    #[error("discovery fetch aborted")]
    Aborted,
}

/// Issuer and signing keys published by the authority.
///
/// Immutable once built. A refresh replaces the whole document.
#[derive(Debug)]
pub struct DiscoveryDocument {
    issuer: String,
    descriptors: Vec<Jwk>,
    signing_keys: Vec<VerificationKey>,
}

impl DiscoveryDocument {
    /// Build a document, decoding every eligible signing key up front.
    pub fn new(issuer: impl Into<String>, descriptors: Vec<Jwk>) -> Self {
        let signing_keys = decode_key_set(&descriptors);
        Self {
            issuer: issuer.into(),
            descriptors,
            signing_keys,
        }
    }

    /// Issuer exactly as published; tokens must carry the same `iss`.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Every key descriptor as published, including ineligible ones.
    pub fn descriptors(&self) -> &[Jwk] {
        &self.descriptors
    }

    /// Decoded signature keys, in publication order.
    pub fn signing_keys(&self) -> &[VerificationKey] {
        &self.signing_keys
    }

    /// First decoded signature key with the given key id.
    pub fn signing_key(&self, kid: &str) -> Option<&VerificationKey> {
        self.signing_keys.iter().find(|key| key.kid() == kid)
    }

    pub fn signing_key_count(&self) -> usize {
        self.signing_keys.len()
    }
}

/// Source of discovery documents.
#[async_trait]
pub trait DiscoveryFetcher: Send + Sync {
    /// Fetch the current discovery document and its key set.
    async fn fetch(&self) -> Result<DiscoveryDocument, DiscoveryError>;
}

/// Discovery document metadata; only the fields used here.
#[derive(Debug, Deserialize)]
struct ProviderMetadata {
    issuer: String,
    jwks_uri: String,
}

/// JWKS response. Entries are parsed one by one so a single malformed entry
/// does not discard the rest of the set.
#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<serde_json::Value>,
}

/// Build the discovery document URL for an authority.
///
/// Authorities configured with the full well-known URL are used as-is.
pub fn discovery_url(authority_url: &str) -> String {
    let base = authority_url.trim_end_matches('/');
    if base.ends_with(WELL_KNOWN_PATH) {
        base.to_string()
    } else {
        format!("{base}{WELL_KNOWN_PATH}")
    }
}

/// Fetches the discovery document and JWKS over HTTP.
pub struct HttpDiscoveryFetcher {
    /// URL to the discovery document.
    discovery_url: String,

    /// HTTP client for both requests.
    http_client: reqwest::Client,
}

impl HttpDiscoveryFetcher {
    /// Create a fetcher for the given authority.
    ///
    /// # Arguments
    ///
    /// * `authority_url` - Authority base URL (or the full discovery URL)
    /// * `timeout` - Timeout applied to each request
    pub fn new(authority_url: &str, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "auth.discovery", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            discovery_url: discovery_url(authority_url),
            http_client,
        }
    }

    pub fn discovery_url(&self) -> &str {
        &self.discovery_url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, DiscoveryError> {
        let response = self.http_client.get(url).send().await.map_err(|e| {
            tracing::error!(target: "auth.discovery", url = %url, error = %e, "Discovery request failed");
            DiscoveryError::Request {
                url: url.to_string(),
                reason: e.to_string(),
            }
        })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "auth.discovery",
                url = %url,
                status = %response.status(),
                "Discovery endpoint returned error"
            );
            return Err(DiscoveryError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        response.json::<T>().await.map_err(|e| {
            tracing::error!(target: "auth.discovery", url = %url, error = %e, "Failed to parse discovery response");
            DiscoveryError::InvalidDocument {
                url: url.to_string(),
                reason: e.to_string(),
            }
        })
    }
}

#[async_trait]
impl DiscoveryFetcher for HttpDiscoveryFetcher {
    #[instrument(skip(self), fields(url = %self.discovery_url))]
    async fn fetch(&self) -> Result<DiscoveryDocument, DiscoveryError> {
        tracing::debug!(target: "auth.discovery", "Fetching discovery document");

        let metadata: ProviderMetadata = self.get_json(&self.discovery_url).await?;
        let jwks: JwksResponse = self.get_json(&metadata.jwks_uri).await?;

        let descriptors: Vec<Jwk> = jwks
            .keys
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<Jwk>(entry) {
                Ok(jwk) => Some(jwk),
                Err(e) => {
                    tracing::warn!(target: "auth.discovery", error = %e, "Skipping malformed JWKS entry");
                    None
                }
            })
            .collect();

        Ok(DiscoveryDocument::new(metadata.issuer, descriptors))
    }
}

type FetchResult = Result<Arc<DiscoveryDocument>, DiscoveryError>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

/// A fetch in progress, tagged so that only its own completion can settle it.
struct InFlight {
    generation: u64,
    result: SharedFetch,
}

enum CacheState {
    Empty,
    Fetching(InFlight),
    Ready(Arc<DiscoveryDocument>),
    Refreshing(Arc<DiscoveryDocument>, InFlight),
    Failed(DiscoveryError),
}

struct Inner {
    state: CacheState,
    generation: u64,
}

/// Observable state of the discovery cache, for health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Nothing fetched yet.
    Empty,
    /// First fetch (or a retry after failure) in progress.
    Fetching,
    /// Document available.
    Ready,
    /// Document available; a forced refresh is in progress.
    Refreshing,
    /// Last fetch failed; the next use retries.
    Failed,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheStatus::Empty => "empty",
            CacheStatus::Fetching => "fetching",
            CacheStatus::Ready => "ready",
            CacheStatus::Refreshing => "refreshing",
            CacheStatus::Failed => "failed",
        }
    }

    /// Whether a document is currently available to validate against.
    pub fn has_document(self) -> bool {
        matches!(self, CacheStatus::Ready | CacheStatus::Refreshing)
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lazily populated, single-flight discovery document cache.
pub struct DiscoveryCache {
    fetcher: Arc<dyn DiscoveryFetcher>,
    inner: Arc<Mutex<Inner>>,
}

impl DiscoveryCache {
    pub fn new(fetcher: Arc<dyn DiscoveryFetcher>) -> Self {
        Self {
            fetcher,
            inner: Arc::new(Mutex::new(Inner {
                state: CacheState::Empty,
                generation: 0,
            })),
        }
    }

    /// Get the cached document, fetching it if none is available.
    ///
    /// During a forced refresh the previous document is returned immediately.
    ///
    /// # Errors
    ///
    /// Returns the `DiscoveryError` of the fetch this call observed. Failures
    /// are not cached: the next call starts a new fetch.
    pub async fn get(&self) -> Result<Arc<DiscoveryDocument>, DiscoveryError> {
        let fetch = {
            let mut inner = self.inner.lock().await;
            let joined = match &inner.state {
                CacheState::Ready(doc) | CacheState::Refreshing(doc, _) => {
                    return Ok(Arc::clone(doc));
                }
                CacheState::Fetching(in_flight) => Some(in_flight.result.clone()),
                CacheState::Empty | CacheState::Failed(_) => None,
            };
            match joined {
                Some(fetch) => fetch,
                None => self.begin_fetch(&mut inner),
            }
        };

        fetch.await
    }

    /// Fetch a fresh document, replacing the cached one on success.
    ///
    /// The previous document keeps serving while the refresh runs and stays
    /// in place if it fails. A refresh already in flight is joined.
    ///
    /// # Errors
    ///
    /// Returns the `DiscoveryError` of the refresh.
    pub async fn force_refresh(&self) -> Result<Arc<DiscoveryDocument>, DiscoveryError> {
        let fetch = {
            let mut inner = self.inner.lock().await;
            let joined = match &inner.state {
                CacheState::Fetching(in_flight) | CacheState::Refreshing(_, in_flight) => {
                    Some(in_flight.result.clone())
                }
                CacheState::Empty | CacheState::Ready(_) | CacheState::Failed(_) => None,
            };
            match joined {
                Some(fetch) => fetch,
                None => self.begin_fetch(&mut inner),
            }
        };

        fetch.await
    }

    /// Cached document, if any, without fetching.
    pub async fn current(&self) -> Option<Arc<DiscoveryDocument>> {
        match &self.inner.lock().await.state {
            CacheState::Ready(doc) | CacheState::Refreshing(doc, _) => Some(Arc::clone(doc)),
            CacheState::Empty | CacheState::Fetching(_) | CacheState::Failed(_) => None,
        }
    }

    pub async fn status(&self) -> CacheStatus {
        match &self.inner.lock().await.state {
            CacheState::Empty => CacheStatus::Empty,
            CacheState::Fetching(_) => CacheStatus::Fetching,
            CacheState::Ready(_) => CacheStatus::Ready,
            CacheState::Refreshing(..) => CacheStatus::Refreshing,
            CacheState::Failed(_) => CacheStatus::Failed,
        }
    }

    /// Start a fetch and move to `Fetching` (or `Refreshing` from `Ready`).
    ///
    /// Must be called with the lock held; the fetch itself runs unlocked.
    fn begin_fetch(&self, inner: &mut Inner) -> SharedFetch {
        inner.generation = inner.generation.wrapping_add(1);
        let generation = inner.generation;

        let fetcher = Arc::clone(&self.fetcher);
        let task_state = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let started = Instant::now();
            let result = fetcher.fetch().await.map(Arc::new);
            record_fetch(&result, started.elapsed());
            complete_fetch(&task_state, generation, &result).await;
            result
        });

        // A panicked fetch task never reaches `complete_fetch`; settle it here
        let join_state = Arc::clone(&self.inner);
        let result = async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(target: "auth.discovery", error = %e, "Discovery fetch task failed");
                    let result = Err(DiscoveryError::Aborted);
                    complete_fetch(&join_state, generation, &result).await;
                    result
                }
            }
        }
        .boxed()
        .shared();

        let in_flight = InFlight {
            generation,
            result: result.clone(),
        };
        let previous = std::mem::replace(&mut inner.state, CacheState::Empty);
        inner.state = match previous {
            CacheState::Ready(doc) => CacheState::Refreshing(doc, in_flight),
            _ => CacheState::Fetching(in_flight),
        };

        tracing::debug!(target: "auth.discovery", generation, "Discovery fetch started");
        result
    }
}

/// Settle the in-flight fetch `generation`; stale completions are ignored.
async fn complete_fetch(inner: &Mutex<Inner>, generation: u64, result: &FetchResult) {
    let mut inner = inner.lock().await;
    let state = std::mem::replace(&mut inner.state, CacheState::Empty);

    inner.state = match state {
        CacheState::Fetching(in_flight) if in_flight.generation == generation => match result {
            Ok(doc) => CacheState::Ready(Arc::clone(doc)),
            Err(e) => CacheState::Failed(e.clone()),
        },
        CacheState::Refreshing(previous, in_flight) if in_flight.generation == generation => {
            match result {
                Ok(doc) => CacheState::Ready(Arc::clone(doc)),
                Err(e) => {
                    tracing::warn!(
                        target: "auth.discovery",
                        error = %e,
                        "Discovery refresh failed, keeping previous document"
                    );
                    CacheState::Ready(previous)
                }
            }
        }
        other => other,
    };
}

fn record_fetch(result: &FetchResult, elapsed: Duration) {
    match result {
        Ok(doc) => {
            tracing::info!(
                target: "auth.discovery",
                issuer = %doc.issuer(),
                key_count = doc.signing_key_count(),
                "Discovery document fetched"
            );
            metrics::record_discovery_fetch("success", elapsed);
            metrics::set_signing_keys(doc.signing_key_count());
        }
        Err(e) => {
            tracing::error!(target: "auth.discovery", error = %e, "Discovery fetch failed");
            metrics::record_discovery_fetch("error", elapsed);
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use auth_test_utils::{MockAuthority, PRIMARY_KEY, SECONDARY_KEY, TEST_ISSUER};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn jwk(key: &auth_test_utils::TestSigningKey) -> Jwk {
        serde_json::from_value(key.jwk()).unwrap()
    }

    fn document(issuer: &str) -> DiscoveryDocument {
        DiscoveryDocument::new(issuer, vec![jwk(&PRIMARY_KEY)])
    }

    /// Fetcher replaying scripted results (the last one repeats), with an
    /// optional delay per fetch.
    struct ScriptedFetcher {
        calls: AtomicUsize,
        delay: Duration,
        script: std::sync::Mutex<VecDeque<Result<String, DiscoveryError>>>,
    }

    impl ScriptedFetcher {
        fn new(script: Vec<Result<&str, DiscoveryError>>) -> Arc<Self> {
            Self::with_delay(script, Duration::ZERO)
        }

        fn with_delay(script: Vec<Result<&str, DiscoveryError>>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
                script: std::sync::Mutex::new(
                    script
                        .into_iter()
                        .map(|r| r.map(ToString::to_string))
                        .collect(),
                ),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DiscoveryFetcher for ScriptedFetcher {
        async fn fetch(&self) -> Result<DiscoveryDocument, DiscoveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let next = {
                let mut script = self.script.lock().unwrap();
                if script.len() > 1 {
                    script.pop_front().unwrap()
                } else {
                    script.front().cloned().unwrap()
                }
            };
            next.map(|issuer| document(&issuer))
        }
    }

    struct PanickingFetcher;

    #[async_trait]
    impl DiscoveryFetcher for PanickingFetcher {
        async fn fetch(&self) -> Result<DiscoveryDocument, DiscoveryError> {
            panic!("fetcher exploded");
        }
    }

    fn unreachable() -> DiscoveryError {
        DiscoveryError::Request {
            url: "https://login.example/.well-known/openid-configuration".to_string(),
            reason: "connection refused".to_string(),
        }
    }

    #[test]
    fn test_discovery_url_appends_well_known_path() {
        assert_eq!(
            discovery_url("https://login.example/tenant"),
            "https://login.example/tenant/.well-known/openid-configuration"
        );
        assert_eq!(
            discovery_url("https://login.example/tenant/"),
            "https://login.example/tenant/.well-known/openid-configuration"
        );
    }

    #[test]
    fn test_discovery_url_keeps_full_url() {
        assert_eq!(
            discovery_url("https://login.example/.well-known/openid-configuration"),
            "https://login.example/.well-known/openid-configuration"
        );
    }

    #[test]
    fn test_document_lookup_by_kid() {
        let doc = DiscoveryDocument::new(
            TEST_ISSUER,
            vec![jwk(&PRIMARY_KEY), jwk(&SECONDARY_KEY)],
        );

        assert_eq!(doc.issuer(), TEST_ISSUER);
        assert_eq!(doc.signing_key_count(), 2);
        assert_eq!(doc.signing_key("test-key-2").unwrap().kid(), "test-key-2");
        assert!(doc.signing_key("missing").is_none());
    }

    #[test]
    fn test_document_skips_ineligible_keys() {
        let encryption: Jwk = serde_json::from_value(SECONDARY_KEY.jwk_with_use("enc")).unwrap();
        let doc = DiscoveryDocument::new(TEST_ISSUER, vec![jwk(&PRIMARY_KEY), encryption]);

        assert_eq!(doc.descriptors().len(), 2);
        assert_eq!(doc.signing_key_count(), 1);
        assert!(doc.signing_key("test-key-2").is_none());
    }

    #[tokio::test]
    async fn test_get_fetches_once_and_caches() {
        let fetcher = ScriptedFetcher::new(vec![Ok(TEST_ISSUER)]);
        let cache = DiscoveryCache::new(fetcher.clone());
        assert_eq!(cache.status().await, CacheStatus::Empty);

        let first = cache.get().await.unwrap();
        let second = cache.get().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(cache.status().await, CacheStatus::Ready);
    }

    #[tokio::test]
    async fn test_concurrent_cold_gets_share_one_fetch() {
        let fetcher = ScriptedFetcher::with_delay(vec![Ok(TEST_ISSUER)], Duration::from_millis(50));
        let cache = Arc::new(DiscoveryCache::new(fetcher.clone()));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.get().await })
            })
            .collect();

        let mut docs = Vec::new();
        for task in tasks {
            docs.push(task.await.unwrap().unwrap());
        }

        assert_eq!(fetcher.calls(), 1);
        assert!(docs.iter().all(|doc| Arc::ptr_eq(doc, &docs[0])));
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_failure() {
        let fetcher = ScriptedFetcher::with_delay(vec![Err(unreachable())], Duration::from_millis(50));
        let cache = Arc::new(DiscoveryCache::new(fetcher.clone()));

        let (a, b) = tokio::join!(cache.get(), cache.get());

        assert_eq!(a.unwrap_err(), unreachable());
        assert_eq!(b.unwrap_err(), unreachable());
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(cache.status().await, CacheStatus::Failed);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let fetcher = ScriptedFetcher::new(vec![Err(unreachable()), Ok(TEST_ISSUER)]);
        let cache = DiscoveryCache::new(fetcher.clone());

        assert!(cache.get().await.is_err());
        assert!(cache.current().await.is_none());

        let doc = cache.get().await.unwrap();
        assert_eq!(doc.issuer(), TEST_ISSUER);
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_force_refresh_replaces_document() {
        let fetcher = ScriptedFetcher::new(vec![Ok("https://old.example"), Ok("https://new.example")]);
        let cache = DiscoveryCache::new(fetcher.clone());

        assert_eq!(cache.get().await.unwrap().issuer(), "https://old.example");
        assert_eq!(
            cache.force_refresh().await.unwrap().issuer(),
            "https://new.example"
        );
        assert_eq!(cache.get().await.unwrap().issuer(), "https://new.example");
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_document() {
        let fetcher = ScriptedFetcher::new(vec![Ok(TEST_ISSUER), Err(unreachable())]);
        let cache = DiscoveryCache::new(fetcher.clone());

        let original = cache.get().await.unwrap();
        assert!(cache.force_refresh().await.is_err());

        assert_eq!(cache.status().await, CacheStatus::Ready);
        let current = cache.get().await.unwrap();
        assert!(Arc::ptr_eq(&original, &current));
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_previous_document_serves_during_refresh() {
        let fetcher = ScriptedFetcher::with_delay(
            vec![Ok("https://old.example"), Ok("https://new.example")],
            Duration::from_millis(100),
        );
        let cache = Arc::new(DiscoveryCache::new(fetcher.clone()));
        cache.get().await.unwrap();

        let refresher = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.force_refresh().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(cache.status().await, CacheStatus::Refreshing);
        assert_eq!(cache.get().await.unwrap().issuer(), "https://old.example");

        assert_eq!(
            refresher.await.unwrap().unwrap().issuer(),
            "https://new.example"
        );
        assert_eq!(cache.get().await.unwrap().issuer(), "https://new.example");
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_share_one_fetch() {
        let fetcher = ScriptedFetcher::with_delay(vec![Ok(TEST_ISSUER)], Duration::from_millis(50));
        let cache = Arc::new(DiscoveryCache::new(fetcher.clone()));
        cache.get().await.unwrap();

        let (a, b) = tokio::join!(cache.force_refresh(), cache.force_refresh());
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_caller_does_not_strand_fetch() {
        let fetcher = ScriptedFetcher::with_delay(vec![Ok(TEST_ISSUER)], Duration::from_millis(50));
        let cache = Arc::new(DiscoveryCache::new(fetcher.clone()));

        let caller = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        caller.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(cache.status().await, CacheStatus::Ready);
        assert!(cache.get().await.is_ok());
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_panicking_fetch_reports_aborted() {
        let cache = DiscoveryCache::new(Arc::new(PanickingFetcher));

        assert_eq!(cache.get().await.unwrap_err(), DiscoveryError::Aborted);
        assert_eq!(cache.status().await, CacheStatus::Failed);
    }

    #[test]
    fn test_cache_status_labels() {
        assert_eq!(CacheStatus::Refreshing.to_string(), "refreshing");
        assert!(CacheStatus::Refreshing.has_document());
        assert!(!CacheStatus::Failed.has_document());
    }

    #[tokio::test]
    async fn test_http_fetcher_reads_document_and_keys() {
        let authority = MockAuthority::start().await;
        authority
            .serve(TEST_ISSUER, &[PRIMARY_KEY.jwk(), SECONDARY_KEY.jwk()])
            .await;

        let fetcher = HttpDiscoveryFetcher::new(&authority.uri(), Duration::from_secs(5));
        let doc = fetcher.fetch().await.unwrap();

        assert_eq!(doc.issuer(), TEST_ISSUER);
        assert_eq!(doc.signing_key_count(), 2);
    }

    #[tokio::test]
    async fn test_http_fetcher_skips_malformed_entries() {
        let authority = MockAuthority::start().await;
        authority
            .serve(
                TEST_ISSUER,
                &[serde_json::json!({"kty": "RSA"}), PRIMARY_KEY.jwk()],
            )
            .await;

        let fetcher = HttpDiscoveryFetcher::new(&authority.uri(), Duration::from_secs(5));
        let doc = fetcher.fetch().await.unwrap();

        assert_eq!(doc.descriptors().len(), 1);
        assert!(doc.signing_key("test-key-1").is_some());
    }

    #[tokio::test]
    async fn test_http_fetcher_error_status() {
        let authority = MockAuthority::start().await;
        authority.fail_discovery(503).await;

        let fetcher = HttpDiscoveryFetcher::new(&authority.uri(), Duration::from_secs(5));
        assert!(matches!(
            fetcher.fetch().await.unwrap_err(),
            DiscoveryError::Status { status: 503, .. }
        ));
    }

    #[tokio::test]
    async fn test_http_fetcher_invalid_document() {
        let authority = MockAuthority::start().await;
        authority.serve_garbage().await;

        let fetcher = HttpDiscoveryFetcher::new(&authority.uri(), Duration::from_secs(5));
        assert!(matches!(
            fetcher.fetch().await.unwrap_err(),
            DiscoveryError::InvalidDocument { .. }
        ));
    }

    #[tokio::test]
    async fn test_http_fetcher_unreachable() {
        // Nothing listens on the discard port
        let fetcher = HttpDiscoveryFetcher::new("http://127.0.0.1:9", Duration::from_secs(2));
        assert!(matches!(
            fetcher.fetch().await.unwrap_err(),
            DiscoveryError::Request { .. }
        ));
    }
}
