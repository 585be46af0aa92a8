//! # Auth Test Utilities
//!
//! Shared test utilities for the bearer authentication crate.
//!
//! This crate provides:
//! - Deterministic RSA signing keys (fixed keys for reproducible tests)
//! - Test token builder (TestTokenBuilder)
//! - Mock OIDC authority serving a discovery document and JWKS (MockAuthority)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use auth_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let authority = MockAuthority::start().await;
//!     authority.serve(TEST_ISSUER, &[PRIMARY_KEY.jwk()]).await;
//!
//!     let token = TestTokenBuilder::new()
//!         .with_scope("read write")
//!         .sign(&PRIMARY_KEY);
//! }
//! ```

pub mod crypto_fixtures;
pub mod mock_authority;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use mock_authority::*;
pub use token_builders::*;
