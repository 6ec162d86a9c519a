use super::stats::latency_stats;
use super::{DEFAULT_PERCENTILES, LatencyStats, MetricsSnapshot};
use crate::classify::Outcome;
use crate::config::HistogramConfig;
use crate::probe::ProbeResult;
use hdrhistogram::{CreationError, Histogram};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("invalid latency histogram bounds: {0}")]
    Histogram(#[from] CreationError),
}

struct Accumulator {
    total: u64,
    failures: u64,
    status_counts: BTreeMap<u16, u64>,
    failure_reasons: BTreeMap<String, u64>,
    http_versions: BTreeMap<String, u64>,
    latency: Histogram<u64>,
}

/// Run-wide metric accumulator shared by every VU.
///
/// All counters live behind one mutex so a snapshot never observes a
/// failure without its matching total.
pub struct MetricSink {
    inner: Mutex<Accumulator>,
    percentiles: Vec<f64>,
}

impl MetricSink {
    pub fn new(config: &HistogramConfig) -> Result<Self, MetricsError> {
        Self::with_percentiles(config, &[])
    }

    /// Like [`MetricSink::new`], additionally tracking `extra` percentiles in snapshots.
    pub fn with_percentiles(config: &HistogramConfig, extra: &[f64]) -> Result<Self, MetricsError> {
        let latency = Histogram::<u64>::new_with_bounds(
            config.latency_low_us.max(1),
            config.latency_high_us,
            config.sigfig,
        )?;

        let mut percentiles = DEFAULT_PERCENTILES.to_vec();
        for &p in extra {
            if !percentiles.iter().any(|known| (known - p).abs() < f64::EPSILON) {
                percentiles.push(p);
            }
        }
        percentiles.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        Ok(Self {
            inner: Mutex::new(Accumulator {
                total: 0,
                failures: 0,
                status_counts: BTreeMap::new(),
                failure_reasons: BTreeMap::new(),
                http_versions: BTreeMap::new(),
                latency,
            }),
            percentiles,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Accumulator> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record(&self, success: bool) {
        let mut acc = self.lock();
        acc.total += 1;
        if !success {
            acc.failures += 1;
        }
    }

    /// Records one classified probe: counts, status, failure reason and latency
    /// under a single lock.
    pub fn record_probe(&self, result: &ProbeResult, outcome: &Outcome) {
        let micros = u64::try_from(result.latency.as_micros()).unwrap_or(u64::MAX);
        let mut acc = self.lock();
        acc.total += 1;
        if let Some(reason) = outcome.failure() {
            acc.failures += 1;
            *acc.failure_reasons.entry(reason.label()).or_insert(0) += 1;
        }
        if let Some(status) = result.status_code {
            *acc.status_counts.entry(status).or_insert(0) += 1;
        }
        if let Some(version) = &result.http_version {
            match acc.http_versions.get_mut(version) {
                Some(count) => *count += 1,
                None => {
                    acc.http_versions.insert(version.clone(), 1);
                }
            }
        }
        acc.latency.saturating_record(micros.max(1));
    }

    /// Full view including latency stats. The histogram is copied under the
    /// lock and summarised after releasing it.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let (mut snapshot, histogram) = {
            let acc = self.lock();
            let snapshot = MetricsSnapshot {
                total: acc.total,
                failures: acc.failures,
                status_counts: acc.status_counts.clone(),
                failure_reasons: acc.failure_reasons.clone(),
                http_versions: acc.http_versions.clone(),
                latency: LatencyStats::default(),
            };
            (snapshot, acc.latency.clone())
        };
        snapshot.latency = latency_stats(&histogram, &self.percentiles);
        snapshot
    }

    /// Totals and failures only; breakdowns and latency are left empty.
    pub fn counters(&self) -> MetricsSnapshot {
        let (total, failures) = {
            let acc = self.lock();
            (acc.total, acc.failures)
        };
        MetricsSnapshot {
            total,
            failures,
            status_counts: BTreeMap::new(),
            failure_reasons: BTreeMap::new(),
            http_versions: BTreeMap::new(),
            latency: LatencyStats::default(),
        }
    }
}
