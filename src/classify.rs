use crate::config::StatusPolicy;
use crate::probe::{ProbeResult, TransportErrorKind};
use std::fmt;
use std::time::Duration;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    Success,
    Failure(FailureReason),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            Outcome::Success => None,
            Outcome::Failure(reason) => Some(reason),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FailureReason {
    Transport(TransportErrorKind),
    UnexpectedStatus(u16),
    LatencyExceeded { latency: Duration, limit: Duration },
}

impl FailureReason {
    /// Stable key used in the failure breakdown.
    pub fn label(&self) -> String {
        match self {
            FailureReason::Transport(kind) => kind.label().to_string(),
            FailureReason::UnexpectedStatus(code) => format!("status_{code}"),
            FailureReason::LatencyExceeded { .. } => "latency_exceeded".to_string(),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Transport(kind) => write!(f, "transport error ({})", kind.label()),
            FailureReason::UnexpectedStatus(code) => write!(f, "unexpected status {code}"),
            FailureReason::LatencyExceeded { latency, limit } => write!(
                f,
                "latency {:.1}ms over limit {:.1}ms",
                latency.as_secs_f64() * 1000.0,
                limit.as_secs_f64() * 1000.0
            ),
        }
    }
}

pub struct Classifier {
    policy: StatusPolicy,
}

impl Classifier {
    pub fn new(policy: StatusPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &StatusPolicy {
        &self.policy
    }

    pub fn classify(&self, result: &ProbeResult) -> Outcome {
        if let Some(err) = &result.error {
            return Outcome::Failure(FailureReason::Transport(err.kind));
        }
        let Some(status) = result.status_code else {
            return Outcome::Failure(FailureReason::Transport(TransportErrorKind::Protocol));
        };
        if !self.policy.accepts(status) {
            return Outcome::Failure(FailureReason::UnexpectedStatus(status));
        }
        if let Some(limit) = self.policy.max_latency
            && result.latency > limit
        {
            return Outcome::Failure(FailureReason::LatencyExceeded {
                latency: result.latency,
                limit,
            });
        }
        Outcome::Success
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(StatusPolicy::default())
    }
}
