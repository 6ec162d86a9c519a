use super::{LatencyStats, PercentileValue};
use hdrhistogram::Histogram;

fn micros_to_ms(value: u64) -> f64 {
    value as f64 / 1000.0
}

pub(super) fn latency_stats(histogram: &Histogram<u64>, percentiles: &[f64]) -> LatencyStats {
    let n = histogram.len();
    if n == 0 {
        return LatencyStats::default();
    }

    LatencyStats {
        n,
        min: Some(micros_to_ms(histogram.min())),
        max: Some(micros_to_ms(histogram.max())),
        mean: Some(histogram.mean() / 1000.0),
        median: Some(micros_to_ms(histogram.value_at_quantile(0.50))),
        percentiles: percentiles
            .iter()
            .map(|&percentile| PercentileValue {
                percentile,
                value: micros_to_ms(histogram.value_at_percentile(percentile)),
            })
            .collect(),
    }
}
