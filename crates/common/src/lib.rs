//! Common utilities shared across the bearer-auth workspace.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT utilities (header parsing, temporal claims, constants)
pub mod jwt;
