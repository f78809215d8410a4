//! Whole-run orchestration: setup probe, load phase, teardown probe,
//! final verdict.

use std::sync::Arc;

use volley_core::{
    evaluate, MetricsSnapshot, PayloadGenerator, RunMetrics, Verdict, VolleyConfig, WorkerPool,
};

use crate::client::ApiClient;
use crate::error::RunnerResult;
use crate::lifecycle::{self, ProbeReport};
use crate::scheduler;

/// Everything the caller needs to report on one run and pick an exit
/// code.
#[derive(Debug)]
pub struct RunReport {
    pub setup: ProbeReport,
    pub teardown: ProbeReport,
    pub snapshot: MetricsSnapshot,
    pub verdict: Verdict,
}

/// Executes one complete run against the configured target.
///
/// # Errors
///
/// Returns an error when the configuration is invalid, the HTTP client
/// cannot be built, or the setup probe fails. Load-phase failures never
/// error; they are folded into the metrics and the verdict.
pub async fn execute(config: &VolleyConfig) -> RunnerResult<RunReport> {
    config.validate()?;

    let client = Arc::new(ApiClient::new(&config.target)?);
    let generator = Arc::new(PayloadGenerator::new(
        config.payload.policy,
        config.payload.amounts,
    )?);

    let setup = lifecycle::setup(&client, &generator).await?;

    let pool = Arc::new(WorkerPool::new(
        config.pool.preallocated,
        config.pool.max_units,
        config.pool.idle_timeout(),
    )?);
    let metrics = Arc::new(RunMetrics::new());

    scheduler::run_load_phase(
        config,
        Arc::clone(&client),
        Arc::clone(&generator),
        pool,
        Arc::clone(&metrics),
    )
    .await;

    let teardown = lifecycle::teardown(&client, &generator).await;

    let snapshot = metrics.snapshot();
    let verdict = evaluate(&config.thresholds, &snapshot);
    Ok(RunReport {
        setup,
        teardown,
        snapshot,
        verdict,
    })
}
