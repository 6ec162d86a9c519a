use httpstress::report::{self, RunSummary};
use httpstress::settings::load_from_cli;
use httpstress::{logging, runtime};
use std::io;
use std::process::ExitCode;

const EXIT_RUNTIME_ERROR: u8 = 1;
const EXIT_INVALID_CONFIG: u8 = 2;
const EXIT_THRESHOLDS_FAILED: u8 = 99;

fn main() -> ExitCode {
    let config = match load_from_cli() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("httpstress: {err}");
            return ExitCode::from(EXIT_INVALID_CONFIG);
        }
    };

    if let Err(err) = logging::init(&config.output) {
        eprintln!("httpstress: {err}");
        return ExitCode::from(EXIT_RUNTIME_ERROR);
    }

    let report = match runtime::run(&config) {
        Ok(report) => report,
        Err(err) => {
            tracing::error!(error = %err, "run failed");
            return ExitCode::from(EXIT_RUNTIME_ERROR);
        }
    };

    let summary = RunSummary::new(&config, &report);
    if let Err(err) = report::render_text(&summary, &mut io::stdout().lock()) {
        tracing::error!(error = %err, "failed to print summary");
        return ExitCode::from(EXIT_RUNTIME_ERROR);
    }

    if let Some(path) = &config.output.summary_json {
        if let Err(err) = report::write_json(&summary, path) {
            tracing::error!(error = %err, "failed to write summary");
            return ExitCode::from(EXIT_RUNTIME_ERROR);
        }
        tracing::info!(path = %path.display(), "summary written");
    }

    if summary.passed {
        ExitCode::SUCCESS
    } else {
        if let Some(breach) = &summary.aborted {
            tracing::error!(threshold = %breach.threshold, "run aborted by threshold");
        } else {
            tracing::error!("thresholds failed");
        }
        ExitCode::from(EXIT_THRESHOLDS_FAILED)
    }
}
