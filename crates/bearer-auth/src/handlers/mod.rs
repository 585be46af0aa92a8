//! HTTP request handlers.
//!
//! # Components
//!
//! - `health` - Liveness and discovery cache status
//! - `me` - Authenticated identity echo
//! - `discovery` - Operator-triggered discovery refresh
//! - `metrics` - Prometheus scrape endpoint

pub mod discovery;
pub mod health;
pub mod me;
pub mod metrics;

pub use discovery::refresh_discovery;
pub use health::health_check;
pub use me::get_me;
pub use metrics::metrics_handler;
