//! One-time setup/teardown probes bracketing the timed load phase.
//!
//! Each probe performs one representative transfer. A failed setup probe
//! is fatal and aborts the run before any load-phase iteration executes;
//! a failed teardown probe is advisory and reported to the caller, who
//! decides how to surface it.

use std::fmt;

use serde::Serialize;
use tracing::info;

use volley_core::{PayloadGenerator, SlotHandle, Status};

use crate::client::ApiClient;
use crate::error::{RunnerError, RunnerResult};

/// Structured result of one lifecycle probe.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProbeReport {
    pub phase: &'static str,
    pub succeeded: bool,
    pub operation: &'static str,
    pub status: Status,
    pub latency_ms: u64,
}

impl fmt::Display for ProbeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} probe: {} {:?} in {}ms",
            self.phase, self.operation, self.status, self.latency_ms
        )
    }
}

/// Health check before the load phase. Fatal on failure.
pub async fn setup(client: &ApiClient, generator: &PayloadGenerator) -> RunnerResult<ProbeReport> {
    let report = probe(client, generator, "setup").await;
    if !report.succeeded {
        return Err(RunnerError::SetupFailed(report));
    }
    info!(latency_ms = report.latency_ms, "setup probe passed, target is healthy");
    Ok(report)
}

/// Health check after the load phase. Failure does not invalidate the
/// run's recorded results.
pub async fn teardown(client: &ApiClient, generator: &PayloadGenerator) -> ProbeReport {
    let report = probe(client, generator, "teardown").await;
    if report.succeeded {
        info!(
            latency_ms = report.latency_ms,
            "teardown probe passed, target survived the load"
        );
    }
    report
}

async fn probe(client: &ApiClient, generator: &PayloadGenerator, phase: &'static str) -> ProbeReport {
    // Probes run outside any slot; ordinal 0 is a safe stand-in for
    // every selection policy.
    let transfer = generator.next_transfer(&SlotHandle {
        ordinal: 0,
        iteration: 0,
    });
    let result = client.create_transfer(&transfer).await;
    ProbeReport {
        phase,
        succeeded: result.outcome.status == Status::Success,
        operation: result.outcome.operation,
        status: result.outcome.status,
        latency_ms: result.outcome.latency.as_millis() as u64,
    }
}
