use crate::config::{HttpMethod, RunConfig};
use crate::metrics::LatencyStats;
use crate::runtime::RunReport;
use crate::threshold::{ThresholdBreach, ThresholdVerdict};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

const LABEL_WIDTH: usize = 20;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write summary to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode summary: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Debug, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub target: String,
    pub method: HttpMethod,
    pub vus: usize,
    pub elapsed_ms: f64,
    pub total: u64,
    pub failures: u64,
    pub failure_rate: f64,
    pub latency: LatencyStats,
    pub status_counts: BTreeMap<u16, u64>,
    pub failure_reasons: BTreeMap<String, u64>,
    pub http_versions: BTreeMap<String, u64>,
    pub thresholds: Vec<ThresholdVerdict>,
    pub aborted: Option<ThresholdBreach>,
    pub passed: bool,
}

impl RunSummary {
    pub fn new(config: &RunConfig, report: &RunReport) -> Self {
        let snapshot = &report.snapshot;
        Self {
            run_id: report.run_id,
            target: config.target.url.to_string(),
            method: config.target.method,
            vus: report.vus_started,
            elapsed_ms: report.elapsed.as_secs_f64() * 1000.0,
            total: snapshot.total,
            failures: snapshot.failures,
            failure_rate: snapshot.failure_rate(),
            latency: snapshot.latency.clone(),
            status_counts: snapshot.status_counts.clone(),
            failure_reasons: snapshot.failure_reasons.clone(),
            http_versions: snapshot.http_versions.clone(),
            thresholds: report.verdicts.clone(),
            aborted: report.breach.clone(),
            passed: report.passed(),
        }
    }
}

fn field(out: &mut impl Write, label: &str, value: impl AsRef<str>) -> io::Result<()> {
    let dots = LABEL_WIDTH.saturating_sub(label.len());
    writeln!(out, "     {label}{}: {}", ".".repeat(dots), value.as_ref())
}

fn format_ms(value: Option<f64>) -> String {
    match value {
        Some(ms) if ms >= 1000.0 => format!("{:.2}s", ms / 1000.0),
        Some(ms) => format!("{ms:.2}ms"),
        None => "-".to_string(),
    }
}

fn format_latency(latency: &LatencyStats) -> String {
    let mut parts = vec![
        format!("avg={}", format_ms(latency.mean)),
        format!("min={}", format_ms(latency.min)),
        format!("med={}", format_ms(latency.median)),
        format!("max={}", format_ms(latency.max)),
    ];
    for p in &latency.percentiles {
        if (p.percentile - 50.0).abs() < f64::EPSILON {
            continue;
        }
        parts.push(format!("p({})={}", p.percentile, format_ms(Some(p.value))));
    }
    parts.join(" ")
}

fn format_counts<K: std::fmt::Display>(counts: &BTreeMap<K, u64>) -> String {
    if counts.is_empty() {
        return "-".to_string();
    }
    counts
        .iter()
        .map(|(key, count)| format!("{key}={count}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Writes the end-of-run summary in a dotted `label....: value` layout.
pub fn render_text(summary: &RunSummary, out: &mut impl Write) -> io::Result<()> {
    writeln!(out)?;
    field(out, "run_id", summary.run_id.to_string())?;
    field(out, "target", format!("{} {}", summary.method, summary.target))?;
    field(out, "vus", summary.vus.to_string())?;
    field(out, "duration", format_ms(Some(summary.elapsed_ms)))?;
    field(out, "probes", summary.total.to_string())?;
    field(
        out,
        "failures",
        format!(
            "{:.2}% {} out of {}",
            summary.failure_rate * 100.0,
            summary.failures,
            summary.total
        ),
    )?;
    field(out, "latency", format_latency(&summary.latency))?;
    field(out, "status_codes", format_counts(&summary.status_counts))?;
    field(out, "failure_reasons", format_counts(&summary.failure_reasons))?;
    field(out, "http_versions", format_counts(&summary.http_versions))?;

    if !summary.thresholds.is_empty() {
        writeln!(out)?;
        writeln!(out, "   thresholds:")?;
        for verdict in &summary.thresholds {
            let mark = if verdict.passed { "✓" } else { "✗" };
            let observed = verdict
                .observed
                .map(|value| format!("{value:.4}"))
                .unwrap_or_else(|| "no data".to_string());
            let abort = if verdict.abort_on_fail { " (abort)" } else { "" };
            writeln!(
                out,
                "     {mark} {}: {}{abort} observed={observed}",
                verdict.metric, verdict.expression
            )?;
        }
    }

    if let Some(breach) = &summary.aborted {
        writeln!(out)?;
        writeln!(
            out,
            "   run aborted: {} crossed after {} probes (observed {:.4})",
            breach.threshold, breach.after_probes, breach.observed
        )?;
    }

    Ok(())
}

pub fn write_json(summary: &RunSummary, path: &Path) -> Result<(), ReportError> {
    let content = serde_json::to_string_pretty(summary)?;
    fs::write(path, content).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })
}
