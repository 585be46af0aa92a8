//! Service layer.
//!
//! # Components
//!
//! - `authentication` - Request authentication: token extraction, lazy
//!   discovery and validation, producing an [`AuthOutcome`]

pub mod authentication;

pub use authentication::{AuthOutcome, AuthenticationService};
