mod evaluator;

pub use evaluator::{AbortSignal, ThresholdBreach, ThresholdEvaluator, ThresholdVerdict};

use crate::metrics::MetricsSnapshot;
use std::fmt;
use thiserror::Error;

/// Zero tolerance: a single failed probe aborts the run.
pub const DEFAULT_THRESHOLD: &str = "failures:rate<=0:abort";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MetricName {
    Failures,
    Latency,
}

impl MetricName {
    pub fn label(self) -> &'static str {
        match self {
            MetricName::Failures => "failures",
            MetricName::Latency => "latency",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "failures" | "failure_rate" => Some(MetricName::Failures),
            "latency" | "http_req_duration" => Some(MetricName::Latency),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Aggregation {
    Rate,
    Count,
    Avg,
    Min,
    Max,
    Med,
    Percentile(f64),
}

impl Aggregation {
    fn parse(raw: &str) -> Result<Self, ThresholdParseError> {
        match raw {
            "rate" => Ok(Aggregation::Rate),
            "count" => Ok(Aggregation::Count),
            "avg" => Ok(Aggregation::Avg),
            "min" => Ok(Aggregation::Min),
            "max" => Ok(Aggregation::Max),
            "med" => Ok(Aggregation::Med),
            _ => {
                let inner = raw
                    .strip_prefix("p(")
                    .and_then(|rest| rest.strip_suffix(')'))
                    .ok_or_else(|| ThresholdParseError::UnknownAggregation(raw.to_string()))?;
                let percentile = inner
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| ThresholdParseError::UnknownAggregation(raw.to_string()))?;
                if !(0.0..=100.0).contains(&percentile) {
                    return Err(ThresholdParseError::PercentileOutOfRange(percentile));
                }
                Ok(Aggregation::Percentile(percentile))
            }
        }
    }

    fn applies_to(self, metric: MetricName) -> bool {
        match self {
            Aggregation::Rate | Aggregation::Count => metric == MetricName::Failures,
            _ => metric == MetricName::Latency,
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregation::Rate => f.write_str("rate"),
            Aggregation::Count => f.write_str("count"),
            Aggregation::Avg => f.write_str("avg"),
            Aggregation::Min => f.write_str("min"),
            Aggregation::Max => f.write_str("max"),
            Aggregation::Med => f.write_str("med"),
            Aggregation::Percentile(p) => write!(f, "p({p})"),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Comparison {
    pub fn symbol(self) -> &'static str {
        match self {
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
            Comparison::Eq => "==",
            Comparison::Ne => "!=",
        }
    }

    pub fn holds(self, observed: f64, bound: f64) -> bool {
        let equal = (observed - bound).abs() < f64::EPSILON;
        match self {
            Comparison::Lt => observed < bound,
            Comparison::Le => observed < bound || equal,
            Comparison::Gt => observed > bound,
            Comparison::Ge => observed > bound || equal,
            Comparison::Eq => equal,
            Comparison::Ne => !equal,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ThresholdParseError {
    #[error("threshold `{0}` must look like METRIC:EXPR[:abort]")]
    MissingMetric(String),
    #[error("unknown threshold metric `{0}` (expected failures or latency)")]
    UnknownMetric(String),
    #[error("unknown aggregation `{0}`")]
    UnknownAggregation(String),
    #[error("aggregation `{aggregation}` does not apply to metric `{metric}`")]
    MismatchedAggregation {
        metric: &'static str,
        aggregation: String,
    },
    #[error("percentile {0} outside 0..=100")]
    PercentileOutOfRange(f64),
    #[error("missing comparison operator in `{0}`")]
    MissingOperator(String),
    #[error("invalid threshold bound `{0}`")]
    InvalidBound(String),
    #[error("unknown threshold option `{0}`")]
    UnknownOption(String),
}

/// A pass/fail boundary on a run metric, e.g. `failures: rate<=0`.
#[derive(Clone, Debug, PartialEq)]
pub struct Threshold {
    pub metric: MetricName,
    pub aggregation: Aggregation,
    pub comparison: Comparison,
    pub bound: f64,
    pub abort_on_fail: bool,
}

impl Threshold {
    /// Parses `METRIC:AGG OP VALUE[:abort]`.
    pub fn parse(spec: &str) -> Result<Self, ThresholdParseError> {
        let spec = spec.trim();
        let (metric_raw, rest) = spec
            .split_once(':')
            .ok_or_else(|| ThresholdParseError::MissingMetric(spec.to_string()))?;
        let metric = MetricName::parse(metric_raw.trim())
            .ok_or_else(|| ThresholdParseError::UnknownMetric(metric_raw.trim().to_string()))?;

        let mut parts = rest.split(':');
        let expression = parts.next().unwrap_or_default();
        let mut abort_on_fail = false;
        for option in parts.map(str::trim) {
            match option {
                "abort" | "abortOnFail" => abort_on_fail = true,
                other => return Err(ThresholdParseError::UnknownOption(other.to_string())),
            }
        }

        let (aggregation_raw, comparison, bound_raw) = split_expression(expression)?;
        let aggregation = Aggregation::parse(aggregation_raw)?;
        if !aggregation.applies_to(metric) {
            return Err(ThresholdParseError::MismatchedAggregation {
                metric: metric.label(),
                aggregation: aggregation.to_string(),
            });
        }
        let bound = bound_raw
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| ThresholdParseError::InvalidBound(bound_raw.to_string()))?;

        Ok(Self {
            metric,
            aggregation,
            comparison,
            bound,
            abort_on_fail,
        })
    }

    /// The bare expression, e.g. `rate<=0`.
    pub fn expression(&self) -> String {
        format!("{}{}{}", self.aggregation, self.comparison.symbol(), self.bound)
    }

    /// Current value of the aggregated metric, or `None` while it has no data.
    pub fn observe(&self, snapshot: &MetricsSnapshot) -> Option<f64> {
        let latency = &snapshot.latency;
        match self.aggregation {
            Aggregation::Rate if snapshot.total > 0 => Some(snapshot.failure_rate()),
            Aggregation::Count if snapshot.total > 0 => Some(snapshot.failures as f64),
            Aggregation::Rate | Aggregation::Count => None,
            Aggregation::Avg => latency.mean,
            Aggregation::Min => latency.min,
            Aggregation::Max => latency.max,
            Aggregation::Med => latency.median,
            Aggregation::Percentile(p) => latency.percentile(p),
        }
    }

    /// Returns the observed value when the threshold is violated.
    pub fn violation(&self, snapshot: &MetricsSnapshot) -> Option<f64> {
        let observed = self.observe(snapshot)?;
        (!self.comparison.holds(observed, self.bound)).then_some(observed)
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.metric.label(), self.expression())?;
        if self.abort_on_fail {
            f.write_str(" (abort)")?;
        }
        Ok(())
    }
}

fn split_expression(expression: &str) -> Result<(&str, Comparison, &str), ThresholdParseError> {
    let start = expression
        .find(['<', '>', '=', '!'])
        .ok_or_else(|| ThresholdParseError::MissingOperator(expression.to_string()))?;
    let tail = &expression[start..];
    let (comparison, len) = if tail.starts_with("<=") {
        (Comparison::Le, 2)
    } else if tail.starts_with(">=") {
        (Comparison::Ge, 2)
    } else if tail.starts_with("==") {
        (Comparison::Eq, 2)
    } else if tail.starts_with("!=") {
        (Comparison::Ne, 2)
    } else if tail.starts_with('<') {
        (Comparison::Lt, 1)
    } else if tail.starts_with('>') {
        (Comparison::Gt, 1)
    } else {
        return Err(ThresholdParseError::MissingOperator(expression.to_string()));
    };

    Ok((
        expression[..start].trim(),
        comparison,
        expression[start + len..].trim(),
    ))
}
