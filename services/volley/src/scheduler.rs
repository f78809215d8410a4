//! Arrival scheduler: paces iteration starts against the rate profile.
//!
//! The scheduler is the only component with a strict ordering
//! requirement: event `n` must not fire before the integral-of-rate
//! condition for `n` is satisfied. Iterations themselves complete in any
//! order. A tick that finds the pool saturated records a dropped
//! iteration instead of queueing, so requested and achieved throughput
//! stay comparable.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use volley_core::{Acquire, Outcome, PayloadGenerator, RunMetrics, Status, VolleyConfig, WorkerPool};

use crate::client::ApiClient;
use crate::workload::run_iteration;

const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(1);

/// Drives the timed load phase to completion, including the
/// graceful-stop drain. All results land in `metrics`.
pub async fn run_load_phase(
    config: &VolleyConfig,
    client: Arc<ApiClient>,
    generator: Arc<PayloadGenerator>,
    pool: Arc<WorkerPool>,
    metrics: Arc<RunMetrics>,
) {
    let profile = &config.profile;
    let started = Instant::now();
    let mut tasks: JoinSet<()> = JoinSet::new();
    let mut last_maintenance = started;

    info!(
        expected_events = profile.expected_events() as u64,
        duration_secs = profile.total_duration().as_secs_f64(),
        max_units = pool.max_units(),
        "starting load phase"
    );

    for offset in profile.schedule() {
        tokio::time::sleep_until(started + offset).await;

        // Reap finished iterations so the task set stays bounded.
        while tasks.try_join_next().is_some() {}

        let now = Instant::now();
        if now.duration_since(last_maintenance) >= MAINTENANCE_INTERVAL {
            let retired = pool.retire_idle();
            if retired > 0 {
                debug!(retired, live = pool.size(), "retired idle slots");
            }
            last_maintenance = now;
        }

        match pool.acquire() {
            Acquire::Busy => {
                // Pool saturated at max_units: surface it, do not queue.
                metrics.record(&Outcome::dropped());
            }
            Acquire::Acquired(handle) => {
                let client = Arc::clone(&client);
                let generator = Arc::clone(&generator);
                let pool = Arc::clone(&pool);
                let metrics = Arc::clone(&metrics);
                let mode = config.workload;
                tasks.spawn(async move {
                    run_iteration(mode, &client, &generator, &metrics, handle).await;
                    pool.release(handle);
                });
            }
        }
    }

    drain(tasks, profile.graceful_stop(), started + profile.total_duration(), &metrics).await;

    info!(
        scheduled = metrics.scheduled(),
        executed = metrics.total(),
        dropped = metrics.dropped(),
        "load phase complete"
    );
}

/// Lets in-flight iterations finish inside the graceful-stop window,
/// then aborts the rest and counts each as a network-error outcome.
async fn drain(
    mut tasks: JoinSet<()>,
    graceful_stop: Duration,
    load_end: Instant,
    metrics: &RunMetrics,
) {
    let deadline = load_end + graceful_stop;
    loop {
        if tasks.is_empty() {
            return;
        }
        if Instant::now() >= deadline {
            break;
        }
        match tokio::time::timeout_at(deadline, tasks.join_next()).await {
            Ok(Some(_)) => {}
            Ok(None) => return,
            Err(_) => break,
        }
    }

    tasks.abort_all();
    let mut abandoned = 0u64;
    while let Some(result) = tasks.join_next().await {
        if result.is_err() {
            abandoned += 1;
            metrics.record(&Outcome {
                operation: "iteration",
                status: Status::NetworkError,
                latency: graceful_stop,
            });
        }
    }
    if abandoned > 0 {
        warn!(
            abandoned,
            graceful_stop_secs = graceful_stop.as_secs_f64(),
            "graceful-stop window elapsed, abandoned in-flight iterations"
        );
    }
}
