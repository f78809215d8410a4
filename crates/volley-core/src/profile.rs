//! Staged arrival-rate profiles and deterministic event schedules.
//!
//! A [`RateProfile`] describes the target arrival rate over wall-clock
//! time as a sequence of stages, each ramping linearly from the previous
//! rate to its own target. The [`ArrivalSchedule`] iterator integrates
//! that piecewise-linear rate function and yields the offset at which
//! each event must fire: event `n` fires when the cumulative integral of
//! `r(t)` reaches `n`, independent of how long earlier iterations take.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// One profile stage: ramp linearly to `target_rate` over `duration_secs`.
///
/// A stage whose target equals the rate at its start is a constant stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    /// Arrival rate (events per second) reached at the end of the stage.
    pub target_rate: f64,
    /// Stage length in seconds.
    pub duration_secs: f64,
}

/// Immutable staged arrival-rate profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateProfile {
    /// Rate at the very start of the run, before the first stage ramps.
    pub start_rate: f64,
    /// Ordered ramp stages.
    pub stages: Vec<Stage>,
    /// Window after the final stage during which in-flight iterations
    /// may finish before the run is torn down.
    pub graceful_stop_secs: f64,
}

impl RateProfile {
    /// Builds a constant-arrival-rate profile: `rate` events/second for
    /// `duration_secs` seconds.
    #[must_use]
    pub fn constant(rate: f64, duration_secs: f64) -> Self {
        Self {
            start_rate: rate,
            stages: vec![Stage {
                target_rate: rate,
                duration_secs,
            }],
            graceful_stop_secs: 30.0,
        }
    }

    /// Builds a ramping profile from an initial rate through the given stages.
    #[must_use]
    pub fn ramping(start_rate: f64, stages: Vec<Stage>) -> Self {
        Self {
            start_rate,
            stages,
            graceful_stop_secs: 30.0,
        }
    }

    /// Validates that all rates and durations are non-negative and finite
    /// and that at least one stage is present.
    pub fn validate(&self) -> CoreResult<()> {
        if self.stages.is_empty() {
            return Err(CoreError::invalid_config("profile must have at least one stage"));
        }
        if !self.start_rate.is_finite() || self.start_rate < 0.0 {
            return Err(CoreError::invalid_config(format!(
                "start_rate must be non-negative, got {}",
                self.start_rate
            )));
        }
        if !self.graceful_stop_secs.is_finite() || self.graceful_stop_secs < 0.0 {
            return Err(CoreError::invalid_config(
                "graceful_stop_secs must be non-negative",
            ));
        }
        for (i, stage) in self.stages.iter().enumerate() {
            if !stage.target_rate.is_finite() || stage.target_rate < 0.0 {
                return Err(CoreError::invalid_config(format!(
                    "stage {i}: target_rate must be non-negative, got {}",
                    stage.target_rate
                )));
            }
            if !stage.duration_secs.is_finite() || stage.duration_secs < 0.0 {
                return Err(CoreError::invalid_config(format!(
                    "stage {i}: duration_secs must be non-negative, got {}",
                    stage.duration_secs
                )));
            }
        }
        Ok(())
    }

    /// Total timed load duration across all stages.
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        let secs: f64 = self.stages.iter().map(|s| s.duration_secs).sum();
        Duration::from_secs_f64(secs)
    }

    /// Graceful-stop window as a [`Duration`].
    #[must_use]
    pub fn graceful_stop(&self) -> Duration {
        Duration::from_secs_f64(self.graceful_stop_secs)
    }

    /// Expected number of scheduled events over the whole profile: the
    /// trapezoid integral of the rate function.
    #[must_use]
    pub fn expected_events(&self) -> f64 {
        let mut rate = self.start_rate;
        let mut total = 0.0;
        for stage in &self.stages {
            total += (rate + stage.target_rate) / 2.0 * stage.duration_secs;
            rate = stage.target_rate;
        }
        total
    }

    /// Instantaneous target rate at `offset` from run start, linearly
    /// interpolated within the active stage. Zero past the final stage.
    #[must_use]
    pub fn rate_at(&self, offset: Duration) -> f64 {
        let mut t = offset.as_secs_f64();
        let mut rate = self.start_rate;
        for stage in &self.stages {
            if t < stage.duration_secs {
                if stage.duration_secs == 0.0 {
                    return stage.target_rate;
                }
                return rate + (stage.target_rate - rate) * t / stage.duration_secs;
            }
            t -= stage.duration_secs;
            rate = stage.target_rate;
        }
        0.0
    }

    /// Returns the deterministic event schedule for this profile.
    #[must_use]
    pub fn schedule(&self) -> ArrivalSchedule {
        let mut segments = Vec::with_capacity(self.stages.len());
        let mut rate = self.start_rate;
        let mut start = 0.0;
        let mut cumulative = 0.0;
        for stage in &self.stages {
            let capacity = (rate + stage.target_rate) / 2.0 * stage.duration_secs;
            segments.push(Segment {
                r0: rate,
                r1: stage.target_rate,
                duration: stage.duration_secs,
                start,
                cumulative_before: cumulative,
            });
            cumulative += capacity;
            start += stage.duration_secs;
            rate = stage.target_rate;
        }
        ArrivalSchedule {
            segments,
            total_events: cumulative,
            emitted: 0,
            segment_idx: 0,
        }
    }
}

impl Default for RateProfile {
    /// Constant 50 events/second for one minute, the smallest canned
    /// scenario.
    fn default() -> Self {
        Self::constant(50.0, 60.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    r0: f64,
    r1: f64,
    duration: f64,
    /// Offset of the segment start from run start, in seconds.
    start: f64,
    /// Events accumulated by all earlier segments.
    cumulative_before: f64,
}

impl Segment {
    fn capacity(&self) -> f64 {
        (self.r0 + self.r1) / 2.0 * self.duration
    }

    /// Time into the segment at which the cumulative integral of the
    /// segment's rate function reaches `k` events.
    ///
    /// Solves `r0*t + (r1-r0)/(2d) * t^2 = k` for `t`.
    fn time_for(&self, k: f64) -> f64 {
        debug_assert!(k >= 0.0 && k <= self.capacity() + 1e-9);
        let t = if (self.r1 - self.r0).abs() < f64::EPSILON {
            // Constant segment: even spacing of 1/r0.
            k / self.r0
        } else {
            let a = (self.r1 - self.r0) / (2.0 * self.duration);
            let discriminant = (self.r0 * self.r0 + 4.0 * a * k).max(0.0);
            (-self.r0 + discriminant.sqrt()) / (2.0 * a)
        };
        t.clamp(0.0, self.duration)
    }
}

/// Iterator over event offsets from run start.
///
/// The `n`-th yielded offset is the instant at which the cumulative
/// integral of the profile's rate function reaches `n`. Fractional event
/// mass carries across stage boundaries, so a stage ending mid-event
/// contributes its remainder to the next stage.
#[derive(Debug, Clone)]
pub struct ArrivalSchedule {
    segments: Vec<Segment>,
    total_events: f64,
    emitted: u64,
    segment_idx: usize,
}

impl ArrivalSchedule {
    /// Events the schedule has yet to emit.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        (self.total_events.floor() as u64).saturating_sub(self.emitted)
    }
}

impl Iterator for ArrivalSchedule {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let needed = (self.emitted + 1) as f64;
        if needed > self.total_events {
            return None;
        }
        // Advance past segments that cannot reach the needed integral.
        while self.segment_idx < self.segments.len() {
            let seg = self.segments[self.segment_idx];
            if seg.cumulative_before + seg.capacity() >= needed {
                let k = needed - seg.cumulative_before;
                let t = seg.time_for(k);
                self.emitted += 1;
                return Some(Duration::from_secs_f64(seg.start + t));
            }
            self.segment_idx += 1;
        }
        None
    }
}
