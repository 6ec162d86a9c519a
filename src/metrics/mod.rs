mod sink;
mod stats;

pub use sink::{MetricSink, MetricsError};

use serde::Serialize;
use std::collections::BTreeMap;

/// Percentiles always reported, whether or not a threshold asks for them.
pub const DEFAULT_PERCENTILES: [f64; 4] = [50.0, 90.0, 95.0, 99.0];

#[derive(Clone, Debug, Serialize)]
pub struct MetricsSnapshot {
    pub total: u64,
    pub failures: u64,
    pub status_counts: BTreeMap<u16, u64>,
    pub failure_reasons: BTreeMap<String, u64>,
    pub http_versions: BTreeMap<String, u64>,
    pub latency: LatencyStats,
}

impl MetricsSnapshot {
    /// `failures / total`, or 0 before the first probe.
    pub fn failure_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.failures as f64 / self.total as f64
        }
    }
}

/// Latency distribution in milliseconds.
#[derive(Clone, Debug, Default, Serialize)]
pub struct LatencyStats {
    pub n: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub percentiles: Vec<PercentileValue>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PercentileValue {
    pub percentile: f64,
    pub value: f64,
}

impl LatencyStats {
    pub fn percentile(&self, percentile: f64) -> Option<f64> {
        self.percentiles
            .iter()
            .find(|p| (p.percentile - percentile).abs() < f64::EPSILON)
            .map(|p| p.value)
    }
}
