//! Streaming run metrics.
//!
//! All worker slots record outcomes concurrently into one [`RunMetrics`].
//! Counters are atomic and the latency distribution sits behind a mutex,
//! so no sample is lost or double-counted. Dropped iterations are tallied
//! separately from request-level failures: they indicate generator
//! saturation, not target-API failure.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use hdrhistogram::Histogram;
use parking_lot::Mutex;
use serde::Serialize;

/// Outcome classification for one exchange or scheduling tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Response satisfied the operation's acceptance predicate.
    Success,
    /// Target rejected the request (4xx).
    ClientRejected,
    /// Target failed or violated its contract (5xx or unexpected class).
    ServerError,
    /// Timeout, connection failure, or abandoned in-flight request.
    NetworkError,
    /// The scheduler found no slot within capacity; no request was sent.
    Dropped,
}

impl Status {
    /// Whether this outcome counts against the error rate.
    #[must_use]
    pub fn is_failure(self) -> bool {
        !matches!(self, Self::Success)
    }
}

/// One recorded result, tagged with a logical operation name so that
/// per-operation metrics stay low-cardinality even when the request path
/// contains a variable identifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Outcome {
    pub operation: &'static str,
    pub status: Status,
    pub latency: Duration,
}

impl Outcome {
    /// Outcome for an iteration the scheduler could not dispatch.
    #[must_use]
    pub fn dropped() -> Self {
        Self {
            operation: "iteration",
            status: Status::Dropped,
            latency: Duration::ZERO,
        }
    }
}

/// Per-operation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OpCounters {
    pub total: u64,
    pub failed: u64,
}

/// Concurrent streaming aggregator for a single run window.
#[derive(Debug)]
pub struct RunMetrics {
    total: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
    latency: Mutex<Histogram<u64>>,
    per_op: Mutex<HashMap<&'static str, OpCounters>>,
}

impl RunMetrics {
    /// Creates an empty aggregator. Latencies are tracked in whole
    /// milliseconds up to one minute with three significant figures.
    #[must_use]
    pub fn new() -> Self {
        let histogram = Histogram::new_with_bounds(1, 60_000, 3)
            .unwrap_or_else(|_| Histogram::new(3).expect("histogram construction cannot fail"));
        Self {
            total: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            latency: Mutex::new(histogram),
            per_op: Mutex::new(HashMap::new()),
        }
    }

    /// Folds one outcome into the running aggregates.
    pub fn record(&self, outcome: &Outcome) {
        if outcome.status == Status::Dropped {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.total.fetch_add(1, Ordering::Relaxed);
        if outcome.status.is_failure() {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        {
            let mut latency = self.latency.lock();
            let millis = outcome.latency.as_millis().min(60_000) as u64;
            latency.record(millis.max(1)).ok();
        }
        let mut per_op = self.per_op.lock();
        let counters = per_op.entry(outcome.operation).or_default();
        counters.total += 1;
        if outcome.status.is_failure() {
            counters.failed += 1;
        }
    }

    /// Executed exchanges (dropped iterations excluded).
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Dropped iterations.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// All scheduling decisions: executed exchanges plus drops.
    #[must_use]
    pub fn scheduled(&self) -> u64 {
        self.total() + self.dropped()
    }

    /// Consistent point-in-time copy of the aggregates.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total: self.total.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            latency: self.latency.lock().clone(),
            per_op: self.per_op.lock().clone(),
        }
    }
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view consumed by the threshold evaluator and summary.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub total: u64,
    pub failed: u64,
    pub dropped: u64,
    latency: Histogram<u64>,
    pub per_op: HashMap<&'static str, OpCounters>,
}

impl MetricsSnapshot {
    /// Failed-or-dropped share of all scheduled iterations. Drops count
    /// against the error rate because a saturated generator is a failed
    /// run even when every request that did go out succeeded.
    #[must_use]
    pub fn error_rate(&self) -> f64 {
        let scheduled = self.total + self.dropped;
        if scheduled == 0 {
            return 0.0;
        }
        (self.failed + self.dropped) as f64 / scheduled as f64
    }

    /// Latency at the given quantile (0.0..=1.0), in milliseconds.
    #[must_use]
    pub fn latency_at(&self, quantile: f64) -> u64 {
        self.latency.value_at_quantile(quantile)
    }

    /// 95th-percentile latency in milliseconds.
    #[must_use]
    pub fn p95_ms(&self) -> u64 {
        self.latency_at(0.95)
    }

    /// Mean latency in milliseconds.
    #[must_use]
    pub fn mean_ms(&self) -> f64 {
        self.latency.mean()
    }

    /// Highest recorded latency in milliseconds.
    #[must_use]
    pub fn max_ms(&self) -> u64 {
        self.latency.max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn outcome(status: Status, millis: u64) -> Outcome {
        Outcome {
            operation: "create transfer",
            status,
            latency: Duration::from_millis(millis),
        }
    }

    #[test]
    fn counts_successes_and_failures() {
        let metrics = RunMetrics::new();
        metrics.record(&outcome(Status::Success, 10));
        metrics.record(&outcome(Status::ClientRejected, 20));
        metrics.record(&outcome(Status::ServerError, 30));
        metrics.record(&outcome(Status::NetworkError, 40));

        let snap = metrics.snapshot();
        assert_eq!(snap.total, 4);
        assert_eq!(snap.failed, 3);
        assert_eq!(snap.dropped, 0);
        assert!((snap.error_rate() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn drops_are_tallied_separately_from_failures() {
        let metrics = RunMetrics::new();
        metrics.record(&outcome(Status::Success, 5));
        metrics.record(&Outcome::dropped());
        metrics.record(&Outcome::dropped());

        let snap = metrics.snapshot();
        assert_eq!(snap.total, 1);
        assert_eq!(snap.failed, 0);
        assert_eq!(snap.dropped, 2);
        assert_eq!(metrics.scheduled(), 3);
        // Drops still count against the error rate.
        assert!((snap.error_rate() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn percentiles_reflect_recorded_latencies() {
        let metrics = RunMetrics::new();
        for millis in 1..=100 {
            metrics.record(&outcome(Status::Success, millis));
        }
        let snap = metrics.snapshot();
        let p95 = snap.p95_ms();
        // Three significant figures of approximation error allowed.
        assert!((90..=100).contains(&p95), "p95 was {p95}");
        assert!(snap.max_ms() >= 100);
    }

    #[test]
    fn per_operation_counters_stay_low_cardinality() {
        let metrics = RunMetrics::new();
        metrics.record(&Outcome {
            operation: "read participant",
            status: Status::Success,
            latency: Duration::from_millis(3),
        });
        metrics.record(&Outcome {
            operation: "read participant",
            status: Status::ServerError,
            latency: Duration::from_millis(3),
        });
        metrics.record(&outcome(Status::Success, 3));

        let snap = metrics.snapshot();
        assert_eq!(snap.per_op.len(), 2);
        assert_eq!(
            snap.per_op["read participant"],
            OpCounters { total: 2, failed: 1 }
        );
    }

    #[test]
    fn concurrent_recording_loses_no_samples() {
        let metrics = Arc::new(RunMetrics::new());
        let mut joins = Vec::new();
        for _ in 0..8 {
            let metrics = Arc::clone(&metrics);
            joins.push(std::thread::spawn(move || {
                for i in 0..1000u64 {
                    let status = if i % 10 == 0 {
                        Status::ServerError
                    } else {
                        Status::Success
                    };
                    metrics.record(&outcome(status, i % 50 + 1));
                }
            }));
        }
        for join in joins {
            join.join().unwrap();
        }
        let snap = metrics.snapshot();
        assert_eq!(snap.total, 8000);
        assert_eq!(snap.failed, 800);
    }

    #[test]
    fn empty_snapshot_has_zero_error_rate() {
        let snap = RunMetrics::new().snapshot();
        assert_eq!(snap.error_rate(), 0.0);
        assert_eq!(snap.total, 0);
    }
}
