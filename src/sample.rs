//! Decoded remote-write samples and value normalization.
//!
//! A [`Sample`] is what the transport layer hands us after protobuf/snappy
//! decoding: one metric name, its label set, a float value, and a millisecond
//! timestamp. Samples are immutable inputs; everything downstream works on
//! classified copies.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One decoded time-series sample from a remote-write batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    /// Metric name (the `__name__` label in Prometheus terms).
    pub metric: String,
    /// Remaining labels, name excluded.
    pub labels: HashMap<String, String>,
    /// Sample value. May be NaN; see [`normalize_value`].
    pub value: f64,
    /// Timestamp in milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
}

impl Sample {
    /// Second-granularity bucket used as the correlation time key.
    pub fn time_bucket(&self) -> i64 {
        self.timestamp_ms / 1000
    }
}

/// Normalizes a sample value for storage.
///
/// NaN becomes the sentinel `-1` (a NaN sample is persisted, never dropped).
/// Finite values are rounded to two decimals, matching the precision the
/// monitor schema stores.
pub fn normalize_value(value: f64) -> f64 {
    if value.is_nan() {
        return -1.0;
    }
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nan_becomes_sentinel() {
        assert_eq!(normalize_value(f64::NAN), -1.0);
    }

    #[test]
    fn test_rounding_to_two_decimals() {
        assert_eq!(normalize_value(1.005_6), 1.01);
        assert_eq!(normalize_value(42.0), 42.0);
        assert_eq!(normalize_value(-0.004), -0.0);
    }

    #[test]
    fn test_time_bucket_truncates_millis() {
        let sample = Sample {
            metric: "node_memory_MemUsed".to_string(),
            labels: HashMap::new(),
            value: 1.0,
            timestamp_ms: 1_700_000_123_999,
        };
        assert_eq!(sample.time_bucket(), 1_700_000_123);
    }
}
