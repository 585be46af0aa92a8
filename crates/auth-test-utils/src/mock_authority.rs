//! Mock OIDC authority
//!
//! A wiremock server publishing a discovery document and a JWKS, with knobs for
//! outages, latency and fetch-count expectations.

use serde_json::{json, Value};
use std::time::Duration;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

/// Path of the OIDC discovery document.
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// Path the mock publishes its JWKS under.
pub const JWKS_PATH: &str = "/discovery/keys";

/// Mock authority server
pub struct MockAuthority {
    pub server: MockServer,
}

impl MockAuthority {
    /// Start a mock authority with nothing mounted (every request 404s)
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Authority base URL, as configured in `AUTH_AUTHORITY_URL`
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn discovery_url(&self) -> String {
        format!("{}{}", self.server.uri(), DISCOVERY_PATH)
    }

    pub fn jwks_url(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    /// Publish a discovery document naming `issuer` and a JWKS holding `keys`
    pub async fn serve(&self, issuer: &str, keys: &[Value]) {
        self.mount(issuer, keys, None, None).await;
    }

    /// Like [`serve`](Self::serve), with each discovery response delayed
    pub async fn serve_with_delay(&self, issuer: &str, keys: &[Value], delay: Duration) {
        self.mount(issuer, keys, Some(delay), None).await;
    }

    /// Like [`serve`](Self::serve), verifying on drop that the discovery
    /// document is fetched exactly `times` times
    pub async fn serve_expecting(&self, issuer: &str, keys: &[Value], times: u64) {
        self.mount(issuer, keys, None, Some(times)).await;
    }

    /// Combined delay and fetch-count expectation
    pub async fn serve_with_delay_expecting(
        &self,
        issuer: &str,
        keys: &[Value],
        delay: Duration,
        times: u64,
    ) {
        self.mount(issuer, keys, Some(delay), Some(times)).await;
    }

    /// Answer the discovery endpoint with an error status
    pub async fn fail_discovery(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path(DISCOVERY_PATH))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Answer the discovery endpoint with a body that is not a discovery document
    pub async fn serve_garbage(&self) {
        Mock::given(method("GET"))
            .and(path(DISCOVERY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
            .mount(&self.server)
            .await;
    }

    /// Drop every mounted mock (simulates the authority going dark or
    /// changing what it publishes)
    pub async fn reset(&self) {
        self.server.reset().await;
    }

    /// Number of discovery document requests received so far
    pub async fn discovery_request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == DISCOVERY_PATH)
            .count()
    }

    async fn mount(
        &self,
        issuer: &str,
        keys: &[Value],
        delay: Option<Duration>,
        times: Option<u64>,
    ) {
        let mut discovery_response = ResponseTemplate::new(200).set_body_json(json!({
            "issuer": issuer,
            "jwks_uri": self.jwks_url(),
            "authorization_endpoint": format!("{}/oauth2/authorize", self.server.uri()),
            "token_endpoint": format!("{}/oauth2/token", self.server.uri()),
            "id_token_signing_alg_values_supported": ["RS256"],
        }));
        if let Some(delay) = delay {
            discovery_response = discovery_response.set_delay(delay);
        }

        let mut discovery = Mock::given(method("GET"))
            .and(path(DISCOVERY_PATH))
            .respond_with(discovery_response);
        if let Some(times) = times {
            discovery = discovery.expect(times);
        }
        discovery.mount(&self.server).await;

        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": keys })))
            .mount(&self.server)
            .await;
    }
}
