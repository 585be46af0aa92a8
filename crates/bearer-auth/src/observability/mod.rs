//! Observability: metrics recorded by the authentication pipeline.

pub mod metrics;
