use crate::classify::{Classifier, Outcome};
use crate::config::{ProbeTarget, RunConfig, StopCondition};
use crate::metrics::{MetricSink, MetricsError, MetricsSnapshot};
use crate::probe::ProbeResult;
use crate::probe_engine::{Probe, ProbeClient};
use crate::threshold::{AbortSignal, ThresholdBreach, ThresholdEvaluator, ThresholdVerdict};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

#[derive(Clone, Copy, Debug)]
pub enum ControlMessage {
    Stop,
}

#[derive(Clone, Debug)]
pub enum RunEvent {
    Aborted(ThresholdBreach),
    Finished { vu: usize, probes: u64 },
}

pub struct WorkerHandle {
    pub vu: usize,
    pub sender: Sender<ControlMessage>,
    pub join: Option<JoinHandle<()>>,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Metrics(#[from] MetricsError),
    #[error("no virtual user could start: {0}")]
    NoWorkers(String),
    #[error("run duration {0:?} is too long")]
    DurationTooLong(Duration),
}

#[derive(Clone, Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    pub vus_started: usize,
    pub elapsed: Duration,
    pub snapshot: MetricsSnapshot,
    pub verdicts: Vec<ThresholdVerdict>,
    pub breach: Option<ThresholdBreach>,
}

impl RunReport {
    pub fn passed(&self) -> bool {
        self.breach.is_none() && self.verdicts.iter().all(|v| v.passed)
    }
}

struct SharedRun {
    target: ProbeTarget,
    classifier: Classifier,
    sink: MetricSink,
    evaluator: ThresholdEvaluator,
    remaining: Option<AtomicU64>,
    started: AtomicU64,
    pause: Duration,
    quiet: bool,
}

impl SharedRun {
    /// Reserves the next iteration number, or `None` once the budget is spent.
    fn claim_iteration(&self) -> Option<u64> {
        if let Some(remaining) = &self.remaining {
            remaining
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
                .ok()?;
        }
        Some(self.started.fetch_add(1, Ordering::AcqRel) + 1)
    }
}

/// Runs the configured load against the target with libcurl probers.
pub fn run(config: &RunConfig) -> Result<RunReport, RunError> {
    run_with(config, |_vu| ProbeClient::new())
}

/// Runs the configured load, building one prober per VU with `make_probe`.
pub fn run_with<P, E, F>(config: &RunConfig, make_probe: F) -> Result<RunReport, RunError>
where
    P: Probe + 'static,
    E: Display,
    F: Fn(usize) -> Result<P, E>,
{
    let started = Instant::now();
    let deadline = match config.stop {
        StopCondition::Duration(duration) => Some(
            started
                .checked_add(duration)
                .ok_or(RunError::DurationTooLong(duration))?,
        ),
        StopCondition::Iterations(_) => None,
    };

    let run_id = Uuid::new_v4();
    let abort = Arc::new(AbortSignal::new());
    let evaluator = ThresholdEvaluator::new(config.thresholds.clone(), Arc::clone(&abort));
    let sink = MetricSink::with_percentiles(&config.histogram, &evaluator.percentiles())?;
    let remaining = match config.stop {
        StopCondition::Iterations(n) => Some(AtomicU64::new(n)),
        StopCondition::Duration(_) => None,
    };

    let shared = Arc::new(SharedRun {
        target: config.target.clone(),
        classifier: Classifier::new(config.policy.clone()),
        sink,
        evaluator,
        remaining,
        started: AtomicU64::new(0),
        pause: config.pause,
        quiet: config.output.quiet,
    });

    let (event_tx, event_rx) = crossbeam_channel::unbounded();
    let mut workers = Vec::with_capacity(config.vus);
    let mut last_init_error = None;
    for vu in 1..=config.vus {
        match make_probe(vu) {
            Ok(probe) => workers.push(spawn_vu_worker(
                vu,
                probe,
                Arc::clone(&shared),
                event_tx.clone(),
            )),
            Err(err) => {
                tracing::warn!(%run_id, vu, error = %err, "virtual user failed to start");
                last_init_error = Some(err.to_string());
            }
        }
    }
    drop(event_tx);

    if workers.is_empty() {
        return Err(RunError::NoWorkers(
            last_init_error.unwrap_or_else(|| "zero VUs configured".to_string()),
        ));
    }

    tracing::info!(
        %run_id,
        url = %config.target.url,
        method = %config.target.method,
        vus = workers.len(),
        "run started"
    );

    let breach = coordinate(&workers, &event_rx, deadline);

    for worker in &mut workers {
        if let Some(join) = worker.join.take()
            && join.join().is_err()
        {
            tracing::error!(%run_id, vu = worker.vu, "virtual user panicked");
        }
    }

    let elapsed = started.elapsed();
    let snapshot = shared.sink.snapshot();
    let verdicts = shared.evaluator.verdicts(&snapshot);
    tracing::info!(
        %run_id,
        probes = snapshot.total,
        failures = snapshot.failures,
        failure_rate = snapshot.failure_rate(),
        aborted = breach.is_some(),
        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
        "run finished"
    );

    Ok(RunReport {
        run_id,
        vus_started: workers.len(),
        elapsed,
        snapshot,
        verdicts,
        breach,
    })
}

/// Waits for every worker to finish, sending `Stop` on deadline or abort.
fn coordinate(
    workers: &[WorkerHandle],
    event_rx: &Receiver<RunEvent>,
    mut deadline: Option<Instant>,
) -> Option<ThresholdBreach> {
    let mut breach = None;
    loop {
        let event = match deadline {
            Some(at) => match event_rx.recv_deadline(at) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) => {
                    tracing::info!("duration reached, stopping virtual users");
                    stop_all(workers);
                    deadline = None;
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match event_rx.recv() {
                Ok(event) => event,
                Err(_) => break,
            },
        };

        match event {
            RunEvent::Aborted(found) => {
                stop_all(workers);
                deadline = None;
                breach.get_or_insert(found);
            }
            RunEvent::Finished { vu, probes } => {
                tracing::debug!(vu, probes, "virtual user finished");
            }
        }
    }
    breach
}

fn stop_all(workers: &[WorkerHandle]) {
    for worker in workers {
        let _ = worker.sender.send(ControlMessage::Stop);
    }
}

fn spawn_vu_worker<P: Probe + 'static>(
    vu: usize,
    probe: P,
    shared: Arc<SharedRun>,
    event_tx: Sender<RunEvent>,
) -> WorkerHandle {
    let (tx, rx) = crossbeam_channel::unbounded();
    let join = thread::spawn(move || run_worker(vu, probe, shared, rx, event_tx));
    WorkerHandle {
        vu,
        sender: tx,
        join: Some(join),
    }
}

fn run_worker<P: Probe>(
    vu: usize,
    mut probe: P,
    shared: Arc<SharedRun>,
    control_rx: Receiver<ControlMessage>,
    event_tx: Sender<RunEvent>,
) {
    let mut probes = 0u64;
    let watches_abort = shared.evaluator.watches_abort();
    let reads_latency = shared.evaluator.abort_reads_latency();

    loop {
        if shared.evaluator.abort_signal().is_tripped() {
            break;
        }
        let Some(iteration) = shared.claim_iteration() else {
            break;
        };

        let result = probe.probe(&shared.target);
        let outcome = shared.classifier.classify(&result);
        shared.sink.record_probe(&result, &outcome);
        probes += 1;
        if !shared.quiet {
            log_probe(vu, iteration, &result, &outcome);
        }

        if watches_abort {
            let view = if reads_latency {
                shared.sink.snapshot()
            } else {
                shared.sink.counters()
            };
            if let Some(breach) = shared.evaluator.check(&view) {
                let _ = event_tx.send(RunEvent::Aborted(breach));
                break;
            }
        }

        match control_rx.recv_timeout(shared.pause) {
            Ok(ControlMessage::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }

    let _ = event_tx.send(RunEvent::Finished { vu, probes });
}

fn log_probe(vu: usize, iteration: u64, result: &ProbeResult, outcome: &Outcome) {
    let latency_ms = result.latency.as_secs_f64() * 1000.0;
    let http_version = result.http_version.as_deref().unwrap_or("-");
    match outcome.failure() {
        None => tracing::info!(
            vu,
            iteration,
            latency_ms,
            http_version,
            "Status: {}",
            result.status_display()
        ),
        Some(reason) => tracing::info!(
            vu,
            iteration,
            latency_ms,
            http_version,
            failure = %reason,
            "Status: {}",
            result.status_display()
        ),
    }
}
