//! HTTP middleware.
//!
//! # Components
//!
//! - `auth` - Authentication middleware for protected routes

pub mod auth;

pub use auth::{require_auth, AuthState, IdentityExt};
