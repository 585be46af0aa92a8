//! Secret types for keeping bearer tokens out of logs.
//!
//! Re-exports the [`secrecy`] types used for raw access tokens. A token pulled
//! from an `Authorization` header is wrapped in [`SecretString`] immediately,
//! so any struct or tracing field holding it prints `[REDACTED]` under `{:?}`.
//!
//! Secrets are zeroized when dropped.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! let token = SecretString::from("eyJhbGciOiJSUzI1NiJ9.e30.c2ln");
//!
//! // Debug output never shows the token
//! assert!(!format!("{token:?}").contains("eyJ"));
//!
//! // Verification code must opt in to reading it
//! let raw: &str = token.expose_secret();
//! assert_eq!(raw.split('.').count(), 3);
//! ```

pub use secrecy::{ExposeSecret, SecretString};
