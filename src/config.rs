use serde::Serialize;
use std::fmt;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::threshold::Threshold;

pub const MIN_STATUS_CODE: u16 = 100;
pub const MAX_STATUS_CODE: u16 = 999;

#[derive(Clone, Debug)]
pub struct ProbeTarget {
    pub url: Url,
    pub method: HttpMethod,
    pub headers: Vec<(String, SecretString)>,
    pub body: Option<String>,
    pub timeout: Duration,
    pub max_redirects: u32,
}

impl ProbeTarget {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            method: HttpMethod::Get,
            headers: Vec::new(),
            body: None,
            timeout: Duration::from_secs(60),
            max_redirects: 10,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RunConfig {
    pub target: ProbeTarget,
    pub policy: StatusPolicy,
    pub vus: usize,
    pub stop: StopCondition,
    pub pause: Duration,
    pub thresholds: Vec<Threshold>,
    pub histogram: HistogramConfig,
    pub output: OutputConfig,
}

impl RunConfig {
    pub fn new(target: ProbeTarget, thresholds: Vec<Threshold>) -> Self {
        Self {
            target,
            policy: StatusPolicy::default(),
            vus: 1,
            stop: StopCondition::Iterations(1),
            pause: Duration::ZERO,
            thresholds,
            histogram: HistogramConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StopCondition {
    /// Total probes shared across all VUs.
    Iterations(u64),
    Duration(Duration),
}

#[derive(Clone, Debug, Default)]
pub struct OutputConfig {
    pub quiet: bool,
    pub summary_json: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    pub fn parse_cli(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Some(LogFormat::Text),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct HistogramConfig {
    pub latency_low_us: u64,
    pub latency_high_us: u64,
    pub sigfig: u8,
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            latency_low_us: 1,
            latency_high_us: 60 * 60 * 1_000_000,
            sigfig: 3,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Eq, PartialEq)]
#[error("unsupported HTTP method `{0}`")]
pub struct UnknownMethod(pub String);

impl FromStr for HttpMethod {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "get" => Ok(HttpMethod::Get),
            "head" => Ok(HttpMethod::Head),
            "post" => Ok(HttpMethod::Post),
            "put" => Ok(HttpMethod::Put),
            "patch" => Ok(HttpMethod::Patch),
            "delete" => Ok(HttpMethod::Delete),
            "options" => Ok(HttpMethod::Options),
            _ => Err(UnknownMethod(s.to_string())),
        }
    }
}

/// Which responses count as a success.
#[derive(Clone, Debug, PartialEq)]
pub struct StatusPolicy {
    accepted: Vec<RangeInclusive<u16>>,
    pub max_latency: Option<Duration>,
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum StatusSpecError {
    #[error("status spec is empty")]
    Empty,
    #[error("invalid status code `{0}`")]
    NotANumber(String),
    #[error("status code {0} outside {MIN_STATUS_CODE}..={MAX_STATUS_CODE}")]
    OutOfRange(u16),
    #[error("status range {start}-{end} is reversed")]
    Reversed { start: u16, end: u16 },
}

impl StatusPolicy {
    pub fn exact(code: u16) -> Self {
        Self {
            accepted: vec![code..=code],
            max_latency: None,
        }
    }

    /// Parses `"200"`, `"200,204"` or `"200-299,304"`.
    pub fn parse(spec: &str) -> Result<Self, StatusSpecError> {
        let mut accepted = Vec::new();
        for part in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let range = match part.split_once('-') {
                Some((start, end)) => {
                    let start = parse_code(start)?;
                    let end = parse_code(end)?;
                    if start > end {
                        return Err(StatusSpecError::Reversed { start, end });
                    }
                    start..=end
                }
                None => {
                    let code = parse_code(part)?;
                    code..=code
                }
            };
            accepted.push(range);
        }

        if accepted.is_empty() {
            return Err(StatusSpecError::Empty);
        }

        Ok(Self {
            accepted,
            max_latency: None,
        })
    }

    pub fn accepts(&self, status: u16) -> bool {
        self.accepted.iter().any(|range| range.contains(&status))
    }

    pub fn describe(&self) -> String {
        self.accepted
            .iter()
            .map(|range| {
                if range.start() == range.end() {
                    range.start().to_string()
                } else {
                    format!("{}-{}", range.start(), range.end())
                }
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self::exact(200)
    }
}

fn parse_code(raw: &str) -> Result<u16, StatusSpecError> {
    let raw = raw.trim();
    let code = raw
        .parse::<u16>()
        .map_err(|_| StatusSpecError::NotANumber(raw.to_string()))?;
    if !(MIN_STATUS_CODE..=MAX_STATUS_CODE).contains(&code) {
        return Err(StatusSpecError::OutOfRange(code));
    }
    Ok(code)
}

#[derive(Clone, Eq, PartialEq)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_accepts_only_200() {
        let policy = StatusPolicy::default();
        assert!(policy.accepts(200));
        assert!(!policy.accepts(201));
        assert!(!policy.accepts(500));
        assert_eq!(policy.describe(), "200");
    }

    #[test]
    fn status_spec_accepts_sets_and_ranges() {
        let policy = StatusPolicy::parse("200-299, 304").expect("policy");
        assert!(policy.accepts(200));
        assert!(policy.accepts(250));
        assert!(policy.accepts(299));
        assert!(policy.accepts(304));
        assert!(!policy.accepts(301));
        assert_eq!(policy.describe(), "200-299,304");
    }

    #[test]
    fn status_spec_rejects_invalid_input() {
        assert_eq!(StatusPolicy::parse(" , "), Err(StatusSpecError::Empty));
        assert_eq!(
            StatusPolicy::parse("abc"),
            Err(StatusSpecError::NotANumber("abc".to_string()))
        );
        assert_eq!(
            StatusPolicy::parse("99"),
            Err(StatusSpecError::OutOfRange(99))
        );
        assert_eq!(
            StatusPolicy::parse("1000"),
            Err(StatusSpecError::OutOfRange(1000))
        );
        assert_eq!(
            StatusPolicy::parse("299-200"),
            Err(StatusSpecError::Reversed {
                start: 299,
                end: 200
            })
        );
    }

    #[test]
    fn http_method_parses_case_insensitively() {
        assert_eq!("get".parse::<HttpMethod>(), Ok(HttpMethod::Get));
        assert_eq!("PATCH".parse::<HttpMethod>(), Ok(HttpMethod::Patch));
        assert_eq!(" Options ".parse::<HttpMethod>(), Ok(HttpMethod::Options));
        assert!("TRACE".parse::<HttpMethod>().is_err());
        assert_eq!(HttpMethod::Delete.to_string(), "DELETE");
    }

    #[test]
    fn log_format_parse_cli() {
        assert_eq!(LogFormat::parse_cli("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse_cli("text"), Some(LogFormat::Text));
        assert_eq!(LogFormat::parse_cli("xml"), None);
    }

    #[test]
    fn secret_string_redacts_debug_and_display() {
        let secret = SecretString::new("token-value");

        let debug_text = format!("{secret:?}");
        let display_text = secret.to_string();

        assert!(!debug_text.contains("token-value"));
        assert!(!display_text.contains("token-value"));
        assert_eq!(display_text, "[REDACTED]");
    }
}
