use serde::Serialize;
use std::fmt;
use std::time::{Duration, SystemTime};

/// One probe's observation. Only the prober constructs these.
#[derive(Clone, Debug)]
pub struct ProbeResult {
    pub ts: SystemTime,
    pub status_code: Option<u16>,
    pub status_text: Option<String>,
    pub latency: Duration,
    pub http_version: Option<String>,
    pub error: Option<TransportError>,
}

impl ProbeResult {
    pub fn response(ts: SystemTime, status_code: u16, latency: Duration) -> Self {
        Self {
            ts,
            status_code: Some(status_code),
            status_text: None,
            latency,
            http_version: None,
            error: None,
        }
    }

    pub fn transport_failure(ts: SystemTime, latency: Duration, error: TransportError) -> Self {
        Self {
            ts,
            status_code: None,
            status_text: None,
            latency,
            http_version: None,
            error: Some(error),
        }
    }

    /// Text for the per-probe console line: the status line when a response
    /// arrived, otherwise the transport error.
    pub fn status_display(&self) -> String {
        match (&self.error, &self.status_text, self.status_code) {
            (Some(err), _, _) => err.to_string(),
            (None, Some(text), _) => text.clone(),
            (None, None, Some(code)) => code.to_string(),
            (None, None, None) => String::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    Dns,
    ConnectRefused,
    ConnectFailed,
    Timeout,
    Tls,
    Protocol,
    Io,
}

impl TransportErrorKind {
    pub fn label(&self) -> &'static str {
        match self {
            TransportErrorKind::Dns => "dns",
            TransportErrorKind::ConnectRefused => "connect_refused",
            TransportErrorKind::ConnectFailed => "connect_failed",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Tls => "tls",
            TransportErrorKind::Protocol => "protocol",
            TransportErrorKind::Io => "io",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.label(), self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display_prefers_error_then_text() {
        let ts = SystemTime::now();
        let mut ok = ProbeResult::response(ts, 200, Duration::from_millis(3));
        assert_eq!(ok.status_display(), "200");
        ok.status_text = Some("200 OK".to_string());
        assert_eq!(ok.status_display(), "200 OK");

        let failed = ProbeResult::transport_failure(
            ts,
            Duration::ZERO,
            TransportError {
                kind: TransportErrorKind::ConnectRefused,
                message: "Connection refused".to_string(),
            },
        );
        assert_eq!(
            failed.status_display(),
            "connect_refused: Connection refused"
        );
        assert!(failed.status_code.is_none());
    }
}
