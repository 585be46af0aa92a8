//! Bearer token extraction from request headers.
//!
//! A missing header, another scheme, or an empty credential all mean "no token
//! presented". None of them is an error.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use common::secret::SecretString;

/// Authorization scheme accepted for access tokens (matched case-insensitively).
pub const BEARER_SCHEME: &str = "bearer";

/// Extract the bearer token from the first `Authorization` header value.
///
/// Header names are case-insensitive by construction of [`HeaderMap`].
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<SecretString> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        tracing::debug!(target: "auth.extractor", "No Authorization header");
        return None;
    };

    let Ok(header) = value.to_str() else {
        tracing::debug!(target: "auth.extractor", "Authorization header is not visible ASCII");
        return None;
    };

    // The header carries the raw credential; only debug builds may log it
    #[cfg(debug_assertions)]
    tracing::trace!(target: "auth.extractor", authorization = %header, "Authorization header");

    match parse_bearer(header) {
        Some(token) => Some(SecretString::from(token)),
        None => {
            tracing::debug!(target: "auth.extractor", "Authorization header is not a bearer credential");
            None
        }
    }
}

/// Parse `Bearer <token>` with a case-insensitive scheme.
///
/// The scheme must be followed by whitespace; `BearerX` is a different scheme.
pub fn parse_bearer(header: &str) -> Option<&str> {
    let scheme = header.get(..BEARER_SCHEME.len())?;
    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        return None;
    }

    let rest = header.get(BEARER_SCHEME.len()..)?;
    if !rest.starts_with(|c: char| c.is_ascii_whitespace()) {
        return None;
    }

    let token = rest.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use common::secret::ExposeSecret;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_parse_bearer_standard() {
        assert_eq!(parse_bearer("Bearer abc.def.ghi"), Some("abc.def.ghi"));
    }

    #[test]
    fn test_parse_bearer_scheme_is_case_insensitive() {
        assert_eq!(parse_bearer("bearer tok"), Some("tok"));
        assert_eq!(parse_bearer("BEARER tok"), Some("tok"));
        assert_eq!(parse_bearer("bEaReR tok"), Some("tok"));
    }

    #[test]
    fn test_parse_bearer_trims_whitespace() {
        assert_eq!(parse_bearer("Bearer    tok   "), Some("tok"));
        assert_eq!(parse_bearer("Bearer\ttok"), Some("tok"));
    }

    #[test]
    fn test_parse_bearer_rejects_other_schemes() {
        assert_eq!(parse_bearer("Basic dXNlcjpwYXNz"), None);
        assert_eq!(parse_bearer("Token abc"), None);
        assert_eq!(parse_bearer("DPoP abc"), None);
    }

    #[test]
    fn test_parse_bearer_rejects_empty_credentials() {
        assert_eq!(parse_bearer("Bearer"), None);
        assert_eq!(parse_bearer("Bearer "), None);
        assert_eq!(parse_bearer("Bearer     "), None);
        assert_eq!(parse_bearer(""), None);
    }

    #[test]
    fn test_parse_bearer_requires_separator() {
        assert_eq!(parse_bearer("Bearerabc"), None);
    }

    #[test]
    fn test_parse_bearer_short_or_multibyte_input() {
        assert_eq!(parse_bearer("Bea"), None);
        assert_eq!(parse_bearer("Beärer tok"), None);
    }

    #[test]
    fn test_extract_bearer_token_present() {
        let token = extract_bearer_token(&headers_with("Bearer header.payload.sig")).unwrap();
        assert_eq!(token.expose_secret(), "header.payload.sig");
    }

    #[test]
    fn test_extract_bearer_token_missing_header() {
        assert!(extract_bearer_token(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_extract_bearer_token_wrong_scheme() {
        assert!(extract_bearer_token(&headers_with("Basic dXNlcjpwYXNz")).is_none());
    }

    #[test]
    fn test_extract_bearer_token_uses_first_value() {
        let mut headers = HeaderMap::new();
        headers.append(AUTHORIZATION, HeaderValue::from_static("Bearer first"));
        headers.append(AUTHORIZATION, HeaderValue::from_static("Bearer second"));

        let token = extract_bearer_token(&headers).unwrap();
        assert_eq!(token.expose_secret(), "first");
    }

    #[test]
    fn test_extract_bearer_token_first_value_wrong_scheme() {
        let mut headers = HeaderMap::new();
        headers.append(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        headers.append(AUTHORIZATION, HeaderValue::from_static("Bearer second"));

        assert!(extract_bearer_token(&headers).is_none());
    }

    #[test]
    fn test_extract_bearer_token_non_ascii_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_bytes(b"Bearer \xfftoken").unwrap(),
        );
        assert!(extract_bearer_token(&headers).is_none());
    }
}
