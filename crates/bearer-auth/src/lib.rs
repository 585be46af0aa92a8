//! Bearer Authentication Library
//!
//! Authenticates HTTP requests carrying OAuth2/OIDC bearer access tokens (JWTs)
//! issued by an external authority:
//!
//! - Extracts the token from the `Authorization: Bearer` header
//! - Fetches the authority's OIDC discovery document and signing keys lazily,
//!   once, with single-flight semantics under concurrency
//! - Verifies signature, lifetime, issuer, audience and required scope
//! - Produces an authenticated identity or a typed rejection reason
//!
//! # Architecture
//!
//! ```text
//! middleware/auth.rs -> services/authentication.rs -> auth/{extractor, discovery, jwt}.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Token extraction, discovery cache, key decoding, JWT validation
//! - `config` - Configuration from environment
//! - `errors` - Rejection taxonomy with its uniform HTTP mapping
//! - `handlers` - HTTP request handlers for the demo service
//! - `middleware` - Axum authentication middleware
//! - `observability` - Metrics
//! - `routes` - Axum router setup
//! - `services` - Authentication service

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;
pub mod services;
