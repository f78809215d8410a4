//! Pass/fail threshold rules over aggregated run metrics.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::metrics::MetricsSnapshot;

/// Which aggregate metric a rule reads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "metric")]
pub enum Selector {
    /// Failed-or-dropped share of all scheduled iterations.
    ErrorRate,
    /// Latency at the given quantile, in milliseconds.
    LatencyPercentile {
        /// Quantile in `(0, 1]`, e.g. `0.95`.
        quantile: f64,
    },
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ErrorRate => write!(f, "error_rate"),
            Self::LatencyPercentile { quantile } => write!(f, "p({})", quantile * 100.0),
        }
    }
}

/// Comparison applied between the observed metric and the limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    fn holds(self, observed: f64, limit: f64) -> bool {
        match self {
            Self::Lt => observed < limit,
            Self::Le => observed <= limit,
            Self::Gt => observed > limit,
            Self::Ge => observed >= limit,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        };
        write!(f, "{symbol}")
    }
}

/// One declared pass/fail rule, e.g. `error_rate < 0.01` or `p(95) < 500`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    #[serde(flatten)]
    pub selector: Selector,
    pub comparison: Comparison,
    pub limit: f64,
}

impl ThresholdRule {
    /// `error_rate < limit`.
    #[must_use]
    pub fn error_rate_below(limit: f64) -> Self {
        Self {
            selector: Selector::ErrorRate,
            comparison: Comparison::Lt,
            limit,
        }
    }

    /// `p(quantile) < limit_ms`.
    #[must_use]
    pub fn latency_below(quantile: f64, limit_ms: f64) -> Self {
        Self {
            selector: Selector::LatencyPercentile { quantile },
            comparison: Comparison::Lt,
            limit: limit_ms,
        }
    }

    /// Validates quantile and limit ranges.
    pub fn validate(&self) -> CoreResult<()> {
        if let Selector::LatencyPercentile { quantile } = self.selector {
            if !(quantile > 0.0 && quantile <= 1.0) {
                return Err(CoreError::invalid_config(format!(
                    "latency quantile must be in (0, 1], got {quantile}"
                )));
            }
        }
        if !self.limit.is_finite() || self.limit < 0.0 {
            return Err(CoreError::invalid_config(format!(
                "threshold limit must be non-negative, got {}",
                self.limit
            )));
        }
        Ok(())
    }

    /// Reads the rule's metric from the snapshot.
    #[must_use]
    pub fn observed(&self, snapshot: &MetricsSnapshot) -> f64 {
        match self.selector {
            Selector::ErrorRate => snapshot.error_rate(),
            Selector::LatencyPercentile { quantile } => snapshot.latency_at(quantile) as f64,
        }
    }

    /// Whether the rule holds for the snapshot.
    #[must_use]
    pub fn passes(&self, snapshot: &MetricsSnapshot) -> bool {
        self.comparison.holds(self.observed(snapshot), self.limit)
    }
}

impl fmt::Display for ThresholdRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.selector, self.comparison, self.limit)
    }
}

/// A rule that did not hold, with the value actually observed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Violation {
    pub rule: ThresholdRule,
    pub observed: f64,
}

/// Conjunction of all rules over one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub passed: bool,
    pub violations: Vec<Violation>,
}

/// Evaluates every rule against the snapshot. Callable at run end for the
/// final verdict or mid-run against an interim snapshot.
#[must_use]
pub fn evaluate(rules: &[ThresholdRule], snapshot: &MetricsSnapshot) -> Verdict {
    let violations: Vec<Violation> = rules
        .iter()
        .filter(|rule| !rule.passes(snapshot))
        .map(|rule| Violation {
            rule: *rule,
            observed: rule.observed(snapshot),
        })
        .collect();
    Verdict {
        passed: violations.is_empty(),
        violations,
    }
}
