//! Core scheduling, payload, and metrics logic for the Volley load generator.

pub mod config;
pub mod error;
pub mod metrics;
pub mod payload;
pub mod pool;
pub mod profile;
pub mod threshold;

pub use config::{PayloadConfig, PoolConfig, TargetConfig, VolleyConfig, WorkloadMode};
pub use error::{CoreError, CoreResult};
pub use metrics::{MetricsSnapshot, OpCounters, Outcome, RunMetrics, Status};
pub use payload::{AmountPolicy, ParticipantRecord, PayloadGenerator, SelectionPolicy, WorkloadRequest};
pub use pool::{Acquire, SlotHandle, WorkerPool};
pub use profile::{ArrivalSchedule, RateProfile, Stage};
pub use threshold::{evaluate, Comparison, Selector, ThresholdRule, Verdict, Violation};
