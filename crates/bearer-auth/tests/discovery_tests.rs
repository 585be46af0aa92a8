//! Discovery integration tests.
//!
//! Single-flight fetching, outage handling and forced refresh, observed
//! through the authentication service against a mock authority.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use auth_test_utils::{
    MockAuthority, TestTokenBuilder, PRIMARY_KEY, SECONDARY_KEY, TEST_AUDIENCE, TEST_ISSUER,
};
use axum::http::{header::AUTHORIZATION, HeaderMap, HeaderValue};
use bearer_auth::auth::CacheStatus;
use bearer_auth::config::AuthConfig;
use bearer_auth::errors::AuthError;
use bearer_auth::services::{AuthOutcome, AuthenticationService};
use std::sync::Arc;
use std::time::Duration;

fn service_for(authority: &MockAuthority) -> AuthenticationService {
    let config = AuthConfig::new(authority.uri(), TEST_AUDIENCE, "read");
    AuthenticationService::new(&config)
}

fn bearer(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    );
    headers
}

/// N concurrent calls on a cold cache trigger exactly one discovery fetch.
#[tokio::test]
async fn test_concurrent_cold_calls_fetch_once() -> Result<()> {
    let authority = MockAuthority::start().await;
    authority
        .serve_with_delay_expecting(
            TEST_ISSUER,
            &[PRIMARY_KEY.jwk()],
            Duration::from_millis(200),
            1,
        )
        .await;
    let service = Arc::new(service_for(&authority));

    let good = bearer(&TestTokenBuilder::new().sign(&PRIMARY_KEY));
    let bad = bearer(&TestTokenBuilder::new().with_scope("write").sign(&PRIMARY_KEY));

    let mut tasks = Vec::new();
    for i in 0..32 {
        let service = Arc::clone(&service);
        let headers = if i % 2 == 0 { good.clone() } else { bad.clone() };
        tasks.push(tokio::spawn(async move {
            (i, service.authenticate(&headers).await)
        }));
    }

    for task in tasks {
        let (i, outcome) = task.await?;
        if i % 2 == 0 {
            assert!(outcome.is_authenticated(), "call {i}");
        } else {
            assert_eq!(outcome.rejection(), Some(AuthError::ScopeMissing), "call {i}");
        }
    }

    assert_eq!(authority.discovery_request_count().await, 1);
    Ok(())
}

/// Unreachable authority gives `DiscoveryUnavailable`; once it recovers the
/// same token authenticates.
#[tokio::test]
async fn test_authority_outage_and_recovery() -> Result<()> {
    let authority = MockAuthority::start().await;
    authority.fail_discovery(503).await;
    let service = service_for(&authority);
    let headers = bearer(&TestTokenBuilder::new().sign(&PRIMARY_KEY));

    let outcome = service.authenticate(&headers).await;
    assert_eq!(outcome.rejection(), Some(AuthError::DiscoveryUnavailable));
    assert!(AuthError::DiscoveryUnavailable.is_transient());
    assert_eq!(service.discovery_status().await, CacheStatus::Failed);

    // Failure is not cached: the next call fetches again
    let outcome = service.authenticate(&headers).await;
    assert_eq!(outcome.rejection(), Some(AuthError::DiscoveryUnavailable));
    assert_eq!(authority.discovery_request_count().await, 2);

    authority.reset().await;
    authority.serve(TEST_ISSUER, &[PRIMARY_KEY.jwk()]).await;

    assert!(service.authenticate(&headers).await.is_authenticated());
    assert_eq!(service.discovery_status().await, CacheStatus::Ready);
    Ok(())
}

#[tokio::test]
async fn test_connection_refused_is_discovery_unavailable() -> Result<()> {
    // Nothing listens on the discard port
    let config = AuthConfig::new("http://127.0.0.1:9", TEST_AUDIENCE, "read");
    let service = AuthenticationService::new(&config);
    let headers = bearer(&TestTokenBuilder::new().sign(&PRIMARY_KEY));

    let outcome = service.authenticate(&headers).await;

    assert_eq!(outcome, AuthOutcome::Rejected(AuthError::DiscoveryUnavailable));
    Ok(())
}

#[tokio::test]
async fn test_invalid_discovery_document() -> Result<()> {
    let authority = MockAuthority::start().await;
    authority.serve_garbage().await;
    let service = service_for(&authority);
    let headers = bearer(&TestTokenBuilder::new().sign(&PRIMARY_KEY));

    assert_eq!(
        service.authenticate(&headers).await.rejection(),
        Some(AuthError::DiscoveryUnavailable)
    );
    Ok(())
}

/// The document is cached with no TTL: later calls never refetch on their own.
#[tokio::test]
async fn test_document_cached_until_refresh() -> Result<()> {
    let authority = MockAuthority::start().await;
    authority.serve(TEST_ISSUER, &[PRIMARY_KEY.jwk()]).await;
    let service = service_for(&authority);
    let headers = bearer(&TestTokenBuilder::new().sign(&PRIMARY_KEY));

    assert!(service.authenticate(&headers).await.is_authenticated());

    // The authority goes dark; the cached document keeps working
    authority.reset().await;
    for _ in 0..3 {
        assert!(service.authenticate(&headers).await.is_authenticated());
    }

    Ok(())
}

/// Key rotation is picked up by a forced refresh.
#[tokio::test]
async fn test_forced_refresh_picks_up_rotated_keys() -> Result<()> {
    let authority = MockAuthority::start().await;
    authority.serve(TEST_ISSUER, &[PRIMARY_KEY.jwk()]).await;
    let service = service_for(&authority);

    let old_key_token = bearer(&TestTokenBuilder::new().sign(&PRIMARY_KEY));
    let new_key_token = bearer(&TestTokenBuilder::new().sign(&SECONDARY_KEY));

    assert!(service.authenticate(&old_key_token).await.is_authenticated());
    assert_eq!(
        service.authenticate(&new_key_token).await.rejection(),
        Some(AuthError::UnknownSigningKey)
    );

    authority.reset().await;
    authority.serve(TEST_ISSUER, &[SECONDARY_KEY.jwk()]).await;

    let document = service.refresh_discovery().await?;
    assert_eq!(document.signing_key_count(), 1);

    assert!(service.authenticate(&new_key_token).await.is_authenticated());
    assert_eq!(
        service.authenticate(&old_key_token).await.rejection(),
        Some(AuthError::UnknownSigningKey)
    );

    Ok(())
}

/// A failed forced refresh leaves the previous document in service.
#[tokio::test]
async fn test_failed_refresh_keeps_previous_document() -> Result<()> {
    let authority = MockAuthority::start().await;
    authority.serve(TEST_ISSUER, &[PRIMARY_KEY.jwk()]).await;
    let service = service_for(&authority);
    let headers = bearer(&TestTokenBuilder::new().sign(&PRIMARY_KEY));

    assert!(service.authenticate(&headers).await.is_authenticated());

    authority.reset().await;
    authority.fail_discovery(500).await;

    assert!(service.refresh_discovery().await.is_err());
    assert_eq!(service.discovery_status().await, CacheStatus::Ready);
    assert!(service.authenticate(&headers).await.is_authenticated());

    Ok(())
}

/// Requests during a slow refresh are served from the previous document.
#[tokio::test]
async fn test_requests_during_refresh_use_previous_document() -> Result<()> {
    let authority = MockAuthority::start().await;
    authority.serve(TEST_ISSUER, &[PRIMARY_KEY.jwk()]).await;
    let service = Arc::new(service_for(&authority));
    let headers = bearer(&TestTokenBuilder::new().sign(&PRIMARY_KEY));

    assert!(service.authenticate(&headers).await.is_authenticated());

    authority.reset().await;
    authority
        .serve_with_delay(TEST_ISSUER, &[SECONDARY_KEY.jwk()], Duration::from_millis(300))
        .await;

    let refresh = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.refresh_discovery().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(service.discovery_status().await, CacheStatus::Refreshing);
    assert!(service.authenticate(&headers).await.is_authenticated());

    refresh.await??;
    assert_eq!(
        service.authenticate(&headers).await.rejection(),
        Some(AuthError::UnknownSigningKey)
    );

    Ok(())
}

#[tokio::test]
async fn test_full_discovery_url_as_authority() -> Result<()> {
    let authority = MockAuthority::start().await;
    authority.serve(TEST_ISSUER, &[PRIMARY_KEY.jwk()]).await;
    let config = AuthConfig::new(authority.discovery_url(), TEST_AUDIENCE, "read");
    let service = AuthenticationService::new(&config);

    let headers = bearer(&TestTokenBuilder::new().sign(&PRIMARY_KEY));
    assert!(service.authenticate(&headers).await.is_authenticated());

    Ok(())
}
