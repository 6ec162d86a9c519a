use super::{CliArgs, SettingsError, from_args};
use crate::config::{HttpMethod, LogFormat, StopCondition};
use crate::threshold::{Aggregation, MetricName};
use clap::Parser;
use std::time::Duration;

fn parse(args: &[&str]) -> Result<crate::config::RunConfig, SettingsError> {
    let mut argv = vec!["httpstress"];
    argv.extend_from_slice(args);
    from_args(CliArgs::try_parse_from(argv).expect("cli args"))
}

#[test]
fn defaults_mirror_single_endpoint_script() {
    let config = parse(&["--url", "http://localhost:8080/"]).expect("config");

    assert_eq!(config.target.method, HttpMethod::Get);
    assert_eq!(config.target.url.as_str(), "http://localhost:8080/");
    assert_eq!(config.target.timeout, Duration::from_secs(60));
    assert_eq!(config.target.max_redirects, 10);
    assert!(config.target.body.is_none());
    assert!(config.policy.accepts(200));
    assert!(!config.policy.accepts(204));
    assert_eq!(config.vus, 1);
    assert_eq!(config.stop, StopCondition::Iterations(1));
    assert_eq!(config.pause, Duration::ZERO);
    assert_eq!(config.output.log_format, LogFormat::Text);

    assert_eq!(config.thresholds.len(), 1);
    let threshold = &config.thresholds[0];
    assert_eq!(threshold.metric, MetricName::Failures);
    assert_eq!(threshold.aggregation, Aggregation::Rate);
    assert!(threshold.abort_on_fail);
}

#[test]
fn missing_or_blank_url_is_rejected() {
    assert!(matches!(parse(&[]), Err(SettingsError::MissingTarget)));
    assert!(matches!(
        parse(&["--url", "  "]),
        Err(SettingsError::MissingTarget)
    ));
    assert!(matches!(
        parse(&["--url", "ftp://example.com"]),
        Err(SettingsError::InvalidTarget(_))
    ));
}

#[test]
fn probe_options_are_applied() {
    let config = parse(&[
        "--url",
        "example.com/api",
        "-X",
        "post",
        "--status",
        "200-299",
        "--body",
        "{\"ping\":true}",
        "--headers-json",
        "{\"X-Request-Source\":\"chaos\",\"X-Retry\":3}",
        "-H",
        "Authorization: Bearer abc",
        "--timeout",
        "1500ms",
        "--max-redirects",
        "0",
        "--max-latency",
        "250ms",
    ])
    .expect("config");

    assert_eq!(config.target.url.scheme(), "https");
    assert_eq!(config.target.method, HttpMethod::Post);
    assert_eq!(config.target.body.as_deref(), Some("{\"ping\":true}"));
    assert_eq!(config.target.timeout, Duration::from_millis(1500));
    assert_eq!(config.target.max_redirects, 0);
    assert!(config.policy.accepts(201));
    assert_eq!(config.policy.max_latency, Some(Duration::from_millis(250)));

    let headers: Vec<(&str, &str)> = config
        .target
        .headers
        .iter()
        .map(|(name, value)| (name.as_str(), value.expose()))
        .collect();
    assert_eq!(
        headers,
        vec![
            ("X-Request-Source", "chaos"),
            ("X-Retry", "3"),
            ("Authorization", "Bearer abc"),
        ]
    );
}

#[test]
fn iterations_take_precedence_over_duration() {
    let config = parse(&["-u", "http://h/", "-d", "30s", "-i", "50", "--vus", "5"]).expect("config");
    assert_eq!(config.stop, StopCondition::Iterations(50));
    assert_eq!(config.vus, 5);

    let config = parse(&["-u", "http://h/", "--duration", "1m30s"]).expect("config");
    assert_eq!(config.stop, StopCondition::Duration(Duration::from_secs(90)));
}

#[test]
fn invalid_numbers_and_durations_are_rejected() {
    assert!(matches!(
        parse(&["-u", "http://h/", "--vus", "0"]),
        Err(SettingsError::InvalidVus { value: 0 })
    ));
    assert!(matches!(
        parse(&["-u", "http://h/", "-i", "0"]),
        Err(SettingsError::ZeroIterations)
    ));
    assert!(matches!(
        parse(&["-u", "http://h/", "-d", "soon"]),
        Err(SettingsError::InvalidDuration {
            field: "duration",
            ..
        })
    ));
    assert!(matches!(
        parse(&["-u", "http://h/", "--timeout", "0"]),
        Err(SettingsError::InvalidDuration {
            field: "timeout",
            ..
        })
    ));
    assert!(matches!(
        parse(&["-u", "http://h/", "--pause", "later"]),
        Err(SettingsError::InvalidDuration { field: "pause", .. })
    ));
}

#[test]
fn durations_beyond_a_year_are_rejected() {
    for field in ["--duration", "--timeout", "--max-latency", "--pause"] {
        let err = parse(&["-u", "http://h/", field, "18446744073709551615"])
            .expect_err("overflowing duration");
        assert!(
            matches!(err, SettingsError::InvalidDuration { .. }),
            "{field}: {err}"
        );
    }

    let config = parse(&["-u", "http://h/", "-d", "8760h"]).expect("one year");
    assert_eq!(
        config.stop,
        StopCondition::Duration(Duration::from_secs(365 * 24 * 60 * 60))
    );
}

#[test]
fn invalid_probe_options_are_rejected() {
    assert!(matches!(
        parse(&["-u", "http://h/", "-X", "TRACE"]),
        Err(SettingsError::InvalidMethod(_))
    ));
    assert!(matches!(
        parse(&["-u", "http://h/", "--status", "1200"]),
        Err(SettingsError::InvalidStatus { .. })
    ));
    assert!(matches!(
        parse(&["-u", "http://h/", "-H", "no-colon"]),
        Err(SettingsError::InvalidHeader(_))
    ));
    assert!(matches!(
        parse(&["-u", "http://h/", "--headers-json", "[1,2]"]),
        Err(SettingsError::InvalidHeadersJson(_))
    ));
    assert!(matches!(
        parse(&["-u", "http://h/", "--headers-json", "{\"X\":{\"a\":1}}"]),
        Err(SettingsError::InvalidHeadersJson(_))
    ));
    assert!(matches!(
        parse(&["-u", "http://h/", "--log-format", "xml"]),
        Err(SettingsError::InvalidLogFormat(_))
    ));
}

#[test]
fn explicit_thresholds_replace_the_default() {
    let config = parse(&[
        "-u",
        "http://h/",
        "-t",
        "failures:rate<0.05",
        "-t",
        "latency:p(95)<500:abort",
    ])
    .expect("config");

    assert_eq!(config.thresholds.len(), 2);
    assert!(!config.thresholds[0].abort_on_fail);
    assert_eq!(config.thresholds[1].aggregation, Aggregation::Percentile(95.0));
    assert!(config.thresholds[1].abort_on_fail);

    assert!(matches!(
        parse(&["-u", "http://h/", "-t", "failures:p(95)<1"]),
        Err(SettingsError::InvalidThreshold { .. })
    ));
}

#[test]
fn output_options_are_collected() {
    let config = parse(&[
        "-u",
        "http://h/",
        "-q",
        "--summary-json",
        "out/summary.json",
        "--log-file",
        "run.log",
        "--log-format",
        "json",
    ])
    .expect("config");

    assert!(config.output.quiet);
    assert_eq!(
        config.output.summary_json.as_deref(),
        Some(std::path::Path::new("out/summary.json"))
    );
    assert_eq!(
        config.output.log_file.as_deref(),
        Some(std::path::Path::new("run.log"))
    );
    assert_eq!(config.output.log_format, LogFormat::Json);
}
