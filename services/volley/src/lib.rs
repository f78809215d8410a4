//! Volley: synthetic-load generator for financial transfer APIs.
//!
//! Drives iterations at a prescribed arrival rate (independent of target
//! latency), scales an elastic worker pool to sustain that rate,
//! generates collision-free payloads, and judges the run against
//! declared pass/fail thresholds.

pub mod client;
pub mod error;
pub mod lifecycle;
pub mod run;
pub mod scheduler;
pub mod workload;

pub use client::ApiClient;
pub use error::{RunnerError, RunnerResult};
pub use lifecycle::ProbeReport;
pub use run::{execute, RunReport};
