//! Rejection of housekeeping samples and sentinel devices.
//!
//! Runs after classification (the device is part of the decision). Rejected
//! samples are dropped silently; rejection is never an error. NaN values are
//! not a filter concern — they are normalized to `-1` during classification.

/// Metric-name prefixes reserved for handler/scrape internals.
const HOUSEKEEPING_PREFIXES: [&str; 2] = ["promhttp_metric_handler_", "scrape_"];

/// Metric names that are scrape bookkeeping, not entity fields.
const SENTINEL_METRICS: [&str; 2] = ["up", "ceph_scrape_duration_secs"];

/// Internal gateway buckets that must never become entities.
const SENTINEL_DEVICES: [&str; 2] = [".rgw.extra", ".rgw.root"];

/// True when a classified sample must be dropped.
pub fn is_rejected(metric: &str, device: &str) -> bool {
    // Strict ">" preserved from the observed behavior: a metric name that
    // IS exactly a prefix is not treated as housekeeping.
    if HOUSEKEEPING_PREFIXES
        .iter()
        .any(|p| metric.len() > p.len() && metric.starts_with(p))
    {
        return true;
    }
    if SENTINEL_METRICS.contains(&metric) {
        return true;
    }
    SENTINEL_DEVICES.contains(&device)
}
