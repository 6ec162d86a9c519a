use crate::common::duration::parse_duration;
use crate::common::net::parse_target_url;
use crate::config::{
    HttpMethod, LogFormat, OutputConfig, ProbeTarget, RunConfig, SecretString, StatusPolicy,
    StatusSpecError, StopCondition, UnknownMethod,
};
use crate::threshold::{DEFAULT_THRESHOLD, Threshold, ThresholdParseError};
use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Upper bound for every duration option.
const MAX_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Parser, Debug)]
#[command(name = "httpstress")]
#[command(
    about = "Stress an HTTP endpoint and abort when a failure threshold is crossed",
    long_about = None
)]
pub struct CliArgs {
    /// Target URL to probe
    #[arg(short, long, env = "CHAOS_K6_URL", value_name = "URL")]
    url: Option<String>,

    /// HTTP method: GET|HEAD|POST|PUT|PATCH|DELETE|OPTIONS
    #[arg(short = 'X', long, env = "CHAOS_K6_METHOD", default_value = "GET")]
    method: String,

    /// Accepted status codes, e.g. 200 or 200-299,304
    #[arg(short, long, env = "CHAOS_K6_STATUS", default_value = "200")]
    status: String,

    /// Request body
    #[arg(short, long, env = "CHAOS_K6_BODY")]
    body: Option<String>,

    /// Request headers as a JSON object
    #[arg(long, env = "CHAOS_K6_HEADERS", value_name = "JSON")]
    headers_json: Option<String>,

    /// Extra request header (repeatable)
    #[arg(short = 'H', long = "header", value_name = "NAME: VALUE")]
    headers: Vec<String>,

    /// Concurrent virtual users
    #[arg(long, env = "CHAOS_K6_VUS", default_value_t = 1)]
    vus: usize,

    /// Run length, e.g. 30s or 1h2m3s
    #[arg(short, long, env = "CHAOS_K6_DURATION")]
    duration: Option<String>,

    /// Total probes across all VUs (takes precedence over --duration)
    #[arg(short, long, env = "CHAOS_K6_ITERATIONS")]
    iterations: Option<u64>,

    /// Per-request timeout
    #[arg(long, env = "CHAOS_K6_HTTP_TIMEOUT", default_value = "60s")]
    timeout: String,

    /// Redirects to follow (0 disables)
    #[arg(long, default_value_t = 10)]
    max_redirects: u32,

    /// Fail probes slower than this
    #[arg(long)]
    max_latency: Option<String>,

    /// Think time between iterations of one VU
    #[arg(long, default_value = "0")]
    pause: String,

    /// Threshold METRIC:EXPR[:abort] (repeatable)
    #[arg(short, long = "threshold", default_value = DEFAULT_THRESHOLD)]
    thresholds: Vec<String>,

    /// Write the run summary as JSON
    #[arg(long, value_name = "PATH")]
    summary_json: Option<PathBuf>,

    /// Write logs to a file instead of stderr
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Log format: text|json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Suppress per-probe status lines
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("a target URL is required (--url or CHAOS_K6_URL)")]
    MissingTarget,
    #[error("invalid target URL `{0}`")]
    InvalidTarget(String),
    #[error(transparent)]
    InvalidMethod(#[from] UnknownMethod),
    #[error("invalid status spec `{spec}`: {source}")]
    InvalidStatus {
        spec: String,
        #[source]
        source: StatusSpecError,
    },
    #[error("invalid headers JSON: {0}")]
    InvalidHeadersJson(String),
    #[error("invalid header `{0}` (expected `Name: value`)")]
    InvalidHeader(String),
    #[error("vus must be greater than zero (got {value})")]
    InvalidVus { value: usize },
    #[error("iterations must be greater than zero")]
    ZeroIterations,
    #[error("invalid {field} `{value}`")]
    InvalidDuration { field: &'static str, value: String },
    #[error("invalid threshold `{spec}`: {source}")]
    InvalidThreshold {
        spec: String,
        #[source]
        source: ThresholdParseError,
    },
    #[error("unknown log format `{0}` (expected text or json)")]
    InvalidLogFormat(String),
}

pub fn load_from_cli() -> Result<RunConfig, SettingsError> {
    let args = CliArgs::parse();
    from_args(args)
}

pub fn from_args(args: CliArgs) -> Result<RunConfig, SettingsError> {
    let raw_url = non_empty(args.url).ok_or(SettingsError::MissingTarget)?;
    let url = parse_target_url(&raw_url).ok_or(SettingsError::InvalidTarget(raw_url))?;

    let method = args.method.parse::<HttpMethod>()?;

    let mut policy =
        StatusPolicy::parse(&args.status).map_err(|source| SettingsError::InvalidStatus {
            spec: args.status.clone(),
            source,
        })?;
    policy.max_latency = match non_empty(args.max_latency) {
        Some(raw) => Some(positive_duration("max latency", &raw)?),
        None => None,
    };

    if args.vus == 0 {
        return Err(SettingsError::InvalidVus { value: args.vus });
    }

    let stop = match (args.iterations, non_empty(args.duration)) {
        (Some(0), _) => return Err(SettingsError::ZeroIterations),
        (Some(iterations), _) => StopCondition::Iterations(iterations),
        (None, Some(raw)) => StopCondition::Duration(positive_duration("duration", &raw)?),
        (None, None) => StopCondition::Iterations(1),
    };

    let mut headers = match non_empty(args.headers_json) {
        Some(raw) => parse_headers_json(&raw)?,
        None => Vec::new(),
    };
    for raw in &args.headers {
        headers.push(parse_header(raw)?);
    }

    let thresholds = args
        .thresholds
        .iter()
        .map(|spec| {
            Threshold::parse(spec).map_err(|source| SettingsError::InvalidThreshold {
                spec: spec.clone(),
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let log_format = LogFormat::parse_cli(&args.log_format)
        .ok_or_else(|| SettingsError::InvalidLogFormat(args.log_format.clone()))?;

    let target = ProbeTarget {
        url,
        method,
        headers,
        body: non_empty(args.body),
        timeout: positive_duration("timeout", &args.timeout)?,
        max_redirects: args.max_redirects,
    };

    let mut config = RunConfig::new(target, thresholds);
    config.policy = policy;
    config.vus = args.vus;
    config.stop = stop;
    config.pause = parse_duration(&args.pause)
        .filter(|d| *d <= MAX_DURATION)
        .ok_or_else(|| SettingsError::InvalidDuration {
            field: "pause",
            value: args.pause.clone(),
        })?;
    config.output = OutputConfig {
        quiet: args.quiet,
        summary_json: args.summary_json,
        log_file: args.log_file,
        log_format,
    };
    Ok(config)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn positive_duration(field: &'static str, raw: &str) -> Result<Duration, SettingsError> {
    parse_duration(raw)
        .filter(|d| !d.is_zero() && *d <= MAX_DURATION)
        .ok_or_else(|| SettingsError::InvalidDuration {
            field,
            value: raw.to_string(),
        })
}

fn parse_header(raw: &str) -> Result<(String, SecretString), SettingsError> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| SettingsError::InvalidHeader(raw.to_string()))?;
    let name = name.trim();
    if !is_header_name(name) {
        return Err(SettingsError::InvalidHeader(raw.to_string()));
    }
    Ok((name.to_string(), SecretString::new(value.trim())))
}

fn parse_headers_json(raw: &str) -> Result<Vec<(String, SecretString)>, SettingsError> {
    let map: BTreeMap<String, serde_json::Value> = serde_json::from_str(raw)
        .map_err(|err| SettingsError::InvalidHeadersJson(err.to_string()))?;

    map.into_iter()
        .map(|(name, value)| {
            if !is_header_name(&name) {
                return Err(SettingsError::InvalidHeader(name));
            }
            let value = match value {
                serde_json::Value::String(text) => text,
                serde_json::Value::Number(number) => number.to_string(),
                serde_json::Value::Bool(flag) => flag.to_string(),
                other => {
                    return Err(SettingsError::InvalidHeadersJson(format!(
                        "header `{name}` must be a string, got {other}"
                    )));
                }
            };
            Ok((name, SecretString::new(value)))
        })
        .collect()
}

fn is_header_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_graphic() && b != b':')
}

#[cfg(test)]
mod tests;
