//! Metrics definitions for bearer authentication.
//!
//! All metrics follow Prometheus naming conventions:
//! - `auth_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `status`: 2 values (success, error) or (authenticated, rejected)
//! - `reason`: bounded by [`AuthError`](crate::errors::AuthError) variants
//!
//! Token contents, issuers and key ids never appear in labels.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder with SLO-aligned histogram buckets.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Validation is local CPU work once the document is cached
        .set_buckets_for_metric(
            Matcher::Full("auth_validation_duration_seconds".to_string()),
            &[
                0.0005, 0.001, 0.0025, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set validation buckets: {e}"))?
        // Discovery fetches are two round trips to the authority
        .set_buckets_for_metric(
            Matcher::Prefix("auth_discovery_fetch".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set discovery fetch buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// Authentication Metrics
// ============================================================================

/// Record one authentication decision.
///
/// Metric: `auth_requests_total`, `auth_validation_duration_seconds`,
/// `auth_rejections_total`
/// Labels: `status`, `reason`
///
/// `reason` is only recorded for rejections.
pub fn record_authentication(status: &str, reason: Option<&str>, duration: Duration) {
    histogram!("auth_validation_duration_seconds",
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("auth_requests_total",
        "status" => status.to_string()
    )
    .increment(1);

    if let Some(reason) = reason {
        counter!("auth_rejections_total",
            "reason" => reason.to_string()
        )
        .increment(1);
    }
}

// ============================================================================
// Discovery Metrics
// ============================================================================

/// Record a discovery document fetch.
///
/// Metric: `auth_discovery_fetch_total`, `auth_discovery_fetch_duration_seconds`
/// Labels: `status`
pub fn record_discovery_fetch(status: &str, duration: Duration) {
    histogram!("auth_discovery_fetch_duration_seconds").record(duration.as_secs_f64());

    counter!("auth_discovery_fetch_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Set the number of usable signing keys in the current discovery document.
///
/// Metric: `auth_signing_keys`
#[allow(clippy::cast_precision_loss)] // key counts are tiny
pub fn set_signing_keys(count: usize) {
    gauge!("auth_signing_keys").set(count as f64);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

    fn counter_value(snapshotter: &Snapshotter, name: &str, label: (&str, &str)) -> Option<u64> {
        snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .find_map(|(key, _, _, value)| {
                let key = key.key();
                let matches = key.name() == name
                    && key
                        .labels()
                        .any(|l| l.key() == label.0 && l.value() == label.1);
                match (matches, value) {
                    (true, DebugValue::Counter(count)) => Some(count),
                    _ => None,
                }
            })
    }

    #[test]
    fn test_record_authentication_without_recorder() {
        // Falls back to the no-op recorder
        record_authentication("authenticated", None, Duration::from_millis(2));
        record_authentication("rejected", Some("token_expired"), Duration::from_millis(1));
        record_discovery_fetch("error", Duration::from_millis(100));
        set_signing_keys(2);
    }

    #[test]
    fn test_rejections_are_labelled_by_reason() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_authentication("authenticated", None, Duration::from_millis(3));
            record_authentication("rejected", Some("scope_missing"), Duration::from_millis(1));
            record_authentication("rejected", Some("scope_missing"), Duration::from_millis(1));
        });

        assert_eq!(
            counter_value(&snapshotter, "auth_rejections_total", ("reason", "scope_missing")),
            Some(2)
        );
    }

    #[test]
    fn test_requests_counted_by_status() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_authentication("authenticated", None, Duration::from_millis(3));
            record_authentication("rejected", Some("missing_token"), Duration::ZERO);
        });

        assert_eq!(
            counter_value(&snapshotter, "auth_requests_total", ("status", "authenticated")),
            Some(1)
        );
        assert_eq!(
            counter_value(&snapshotter, "auth_requests_total", ("status", "rejected")),
            Some(1)
        );
    }

    #[test]
    fn test_discovery_fetch_counted_by_status() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_discovery_fetch("success", Duration::from_millis(40));
            record_discovery_fetch("error", Duration::from_millis(10));
            record_discovery_fetch("error", Duration::from_millis(10));
        });

        assert_eq!(
            counter_value(&snapshotter, "auth_discovery_fetch_total", ("status", "error")),
            Some(2)
        );
    }
}
