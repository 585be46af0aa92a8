//! Bearer token authentication.
//!
//! # Components
//!
//! - `extractor` - Bearer token extraction from the Authorization header
//! - `discovery` - OIDC discovery document fetching and single-flight caching
//! - `keys` - JWKS entry decoding into verification keys
//! - `jwt` - JWT validation against the discovery document
//! - `identity` - Authenticated identity built from validated claims

pub mod discovery;
pub mod extractor;
pub mod identity;
pub mod jwt;
pub mod keys;

pub use discovery::{
    CacheStatus, DiscoveryCache, DiscoveryDocument, DiscoveryError, DiscoveryFetcher,
    HttpDiscoveryFetcher,
};
pub use extractor::extract_bearer_token;
pub use identity::{AuthenticatedIdentity, Claim};
pub use jwt::JwtValidator;
pub use keys::{Jwk, KeyAlgorithm, VerificationKey};
