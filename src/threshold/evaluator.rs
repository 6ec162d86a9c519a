use super::{Aggregation, MetricName, Threshold};
use crate::metrics::MetricsSnapshot;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Run-level abort flag. Trips at most once.
#[derive(Debug, Default)]
pub struct AbortSignal {
    tripped: AtomicBool,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` only for the caller that flipped the flag.
    pub fn trip(&self) -> bool {
        self.tripped
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::Acquire)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ThresholdBreach {
    pub threshold: String,
    pub observed: f64,
    /// Probes recorded when the breach was detected.
    pub after_probes: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct ThresholdVerdict {
    pub metric: &'static str,
    pub expression: String,
    pub abort_on_fail: bool,
    pub observed: Option<f64>,
    pub passed: bool,
}

pub struct ThresholdEvaluator {
    thresholds: Vec<Threshold>,
    abort: Arc<AbortSignal>,
}

impl ThresholdEvaluator {
    pub fn new(thresholds: Vec<Threshold>, abort: Arc<AbortSignal>) -> Self {
        Self { thresholds, abort }
    }

    pub fn thresholds(&self) -> &[Threshold] {
        &self.thresholds
    }

    pub fn abort_signal(&self) -> &Arc<AbortSignal> {
        &self.abort
    }

    pub fn watches_abort(&self) -> bool {
        self.thresholds.iter().any(|t| t.abort_on_fail)
    }

    /// Whether any abort threshold reads the latency distribution. When none
    /// does, per-probe checks can run on [`MetricSink::counters`].
    ///
    /// [`MetricSink::counters`]: crate::metrics::MetricSink::counters
    pub fn abort_reads_latency(&self) -> bool {
        self.thresholds
            .iter()
            .any(|t| t.abort_on_fail && t.metric == MetricName::Latency)
    }

    /// Latency percentiles the thresholds read, so the sink can track them.
    pub fn percentiles(&self) -> Vec<f64> {
        self.thresholds
            .iter()
            .filter_map(|t| match t.aggregation {
                Aggregation::Percentile(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    /// Evaluates abort thresholds against `snapshot`. Returns the breach only
    /// to the caller that trips the run-level abort, so across all callers a
    /// run yields at most one breach.
    pub fn check(&self, snapshot: &MetricsSnapshot) -> Option<ThresholdBreach> {
        if self.abort.is_tripped() {
            return None;
        }
        let (threshold, observed) = self
            .thresholds
            .iter()
            .filter(|t| t.abort_on_fail)
            .find_map(|t| t.violation(snapshot).map(|observed| (t, observed)))?;

        if !self.abort.trip() {
            return None;
        }
        tracing::warn!(
            threshold = %threshold,
            observed,
            probes = snapshot.total,
            "threshold crossed, aborting run"
        );
        Some(ThresholdBreach {
            threshold: threshold.to_string(),
            observed,
            after_probes: snapshot.total,
        })
    }

    /// Final pass/fail for every threshold.
    pub fn verdicts(&self, snapshot: &MetricsSnapshot) -> Vec<ThresholdVerdict> {
        self.thresholds
            .iter()
            .map(|t| ThresholdVerdict {
                metric: t.metric.label(),
                expression: t.expression(),
                abort_on_fail: t.abort_on_fail,
                observed: t.observe(snapshot),
                passed: t.violation(snapshot).is_none(),
            })
            .collect()
    }
}
