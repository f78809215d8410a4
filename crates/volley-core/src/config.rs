//! Run configuration for the load generator.
//!
//! Configuration is declared statically, not computed at runtime:
//! - YAML/TOML configuration files
//! - Environment variable overrides
//! - Reasonable defaults taken from the canned transfer-API scenarios
//! - Validation before a run starts

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::payload::{AmountPolicy, SelectionPolicy};
use crate::profile::RateProfile;
use crate::threshold::ThresholdRule;

/// Root configuration for one run.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VolleyConfig {
    #[serde(default)]
    pub target: TargetConfig,

    #[serde(default)]
    pub profile: RateProfile,

    #[serde(default)]
    pub pool: PoolConfig,

    #[serde(default)]
    pub payload: PayloadConfig,

    #[serde(default)]
    pub workload: WorkloadMode,

    #[serde(default = "default_thresholds")]
    pub thresholds: Vec<ThresholdRule>,
}

impl VolleyConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Environment variables (highest priority)
    /// 2. Config file specified by VOLLEY_CONFIG env var
    /// 3. ./config/volley.yaml
    /// 4. /etc/volley/volley.yaml
    /// 5. Hardcoded defaults (lowest priority)
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Ok(config_path) = std::env::var("VOLLEY_CONFIG") {
            builder = builder.add_source(File::with_name(&config_path).required(false));
        }

        builder = builder
            .add_source(File::with_name("./config/volley").required(false))
            .add_source(File::with_name("/etc/volley/volley").required(false));

        // Override with environment variables.
        // Example: VOLLEY_POOL__MAX_UNITS=2000
        builder = builder.add_source(
            Environment::with_prefix("VOLLEY")
                .separator("__")
                .try_parsing(true),
        );

        let config: VolleyConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: VolleyConfig = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target.base_url.is_empty() {
            return Err(ConfigError::Message(
                "target.base_url cannot be empty".to_string(),
            ));
        }
        if self.target.request_timeout_secs <= 0.0 {
            return Err(ConfigError::Message(
                "target.request_timeout_secs must be > 0".to_string(),
            ));
        }
        self.profile
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;
        if self.pool.max_units == 0 {
            return Err(ConfigError::Message("pool.max_units must be > 0".to_string()));
        }
        if self.pool.preallocated > self.pool.max_units {
            return Err(ConfigError::Message(
                "pool.preallocated must be <= pool.max_units".to_string(),
            ));
        }
        self.payload
            .policy
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;
        self.payload
            .amounts
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;
        if let WorkloadMode::Mixed {
            transfer_weight,
            account_read_weight,
            transaction_read_weight,
        } = self.workload
        {
            if transfer_weight + account_read_weight + transaction_read_weight == 0 {
                return Err(ConfigError::Message(
                    "workload.mixed weights must not all be zero".to_string(),
                ));
            }
        }
        for rule in &self.thresholds {
            rule.validate()
                .map_err(|e| ConfigError::Message(e.to_string()))?;
        }
        Ok(())
    }
}

impl Default for VolleyConfig {
    fn default() -> Self {
        Self {
            target: TargetConfig::default(),
            profile: RateProfile::default(),
            pool: PoolConfig::default(),
            payload: PayloadConfig::default(),
            workload: WorkloadMode::default(),
            thresholds: default_thresholds(),
        }
    }
}

/// Target API endpoint and exchange policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetConfig {
    /// Base URL of the transfer API.
    pub base_url: String,

    /// Per-request timeout in seconds; expiry is a network-error outcome.
    pub request_timeout_secs: f64,

    /// Replay a transfer once, with the same idempotency key, when the
    /// send fails at the transport level. Off by default: every logical
    /// attempt is sent exactly once.
    pub retry_transport_errors: bool,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8082/api/v1".to_string(),
            request_timeout_secs: 30.0,
            retry_transport_errors: false,
        }
    }
}

impl TargetConfig {
    /// Request timeout as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.request_timeout_secs)
    }
}

/// Worker pool bounds.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct PoolConfig {
    /// Slots created eagerly before the run begins.
    pub preallocated: usize,

    /// Hard cap on concurrent slots.
    pub max_units: usize,

    /// Seconds a slot may stay idle before retirement.
    pub idle_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            preallocated: 100,
            max_units: 1000,
            idle_timeout_secs: 30,
        }
    }
}

impl PoolConfig {
    /// Idle timeout as a [`Duration`].
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// Payload synthesis configuration.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct PayloadConfig {
    #[serde(default = "default_policy")]
    pub policy: SelectionPolicy,

    #[serde(default)]
    pub amounts: AmountPolicy,
}

impl Default for PayloadConfig {
    fn default() -> Self {
        Self {
            policy: default_policy(),
            amounts: AmountPolicy::default(),
        }
    }
}

fn default_policy() -> SelectionPolicy {
    // Matches the seeded participant universe of the canned scenarios.
    SelectionPolicy::UniformRandom {
        max_participant: 100_000,
    }
}

/// What each iteration does against the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum WorkloadMode {
    /// One transfer per iteration.
    #[default]
    TransferOnly,
    /// Create sender and receiver, read the sender back, then transfer.
    FullFlow,
    /// Weighted choice between a transfer and cache-exercising reads.
    Mixed {
        transfer_weight: u32,
        account_read_weight: u32,
        transaction_read_weight: u32,
    },
}

fn default_thresholds() -> Vec<ThresholdRule> {
    vec![
        ThresholdRule::error_rate_below(0.01),
        ThresholdRule::latency_below(0.95, 500.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::threshold::{Comparison, Selector};

    #[test]
    fn default_configuration_matches_canned_scenarios() {
        let config = VolleyConfig::default();

        assert_eq!(config.target.base_url, "http://localhost:8082/api/v1");
        assert!(!config.target.retry_transport_errors);

        assert_eq!(config.pool.preallocated, 100);
        assert_eq!(config.pool.max_units, 1000);
        assert_eq!(config.pool.idle_timeout_secs, 30);

        assert_eq!(config.profile, RateProfile::constant(50.0, 60.0));
        assert_eq!(config.workload, WorkloadMode::TransferOnly);

        // The canned rules apply both by default and when deserializing
        // a file that leaves thresholds out.
        assert_eq!(config.thresholds.len(), 2);
        let deserialized: VolleyConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(deserialized.thresholds.len(), 2);
        assert_eq!(
            deserialized.thresholds[0],
            ThresholdRule {
                selector: Selector::ErrorRate,
                comparison: Comparison::Lt,
                limit: 0.01,
            }
        );
    }

    #[test]
    fn validation_errors() {
        let mut config = VolleyConfig::default();
        config.pool.preallocated = 5000;
        assert!(config.validate().is_err());

        config.pool.preallocated = 100;
        assert!(config.validate().is_ok());

        config.target.base_url.clear();
        assert!(config.validate().is_err());
        config.target = TargetConfig::default();

        config.profile.start_rate = -1.0;
        assert!(config.validate().is_err());
        config.profile = RateProfile::default();

        config.workload = WorkloadMode::Mixed {
            transfer_weight: 0,
            account_read_weight: 0,
            transaction_read_weight: 0,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn deserializes_a_scripted_scenario() {
        let raw = r#"
        {
            "target": {
                "base_url": "http://localhost:8082/api/v1",
                "request_timeout_secs": 10.0,
                "retry_transport_errors": false
            },
            "profile": {
                "start_rate": 50.0,
                "stages": [
                    { "target_rate": 200.0, "duration_secs": 30.0 },
                    { "target_rate": 500.0, "duration_secs": 60.0 },
                    { "target_rate": 1000.0, "duration_secs": 120.0 },
                    { "target_rate": 0.0, "duration_secs": 30.0 }
                ],
                "graceful_stop_secs": 30.0
            },
            "pool": { "preallocated": 100, "max_units": 3000, "idle_timeout_secs": 30 },
            "payload": {
                "policy": { "mode": "uniform_random", "max_participant": 110002 },
                "amounts": { "min": 1, "max": 50 }
            },
            "workload": { "mode": "transfer_only" },
            "thresholds": [
                { "metric": "error_rate", "comparison": "lt", "limit": 0.01 },
                { "metric": "latency_percentile", "quantile": 0.95, "comparison": "lt", "limit": 1000.0 }
            ]
        }
        "#;
        let config: VolleyConfig = serde_json::from_str(raw).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.profile.stages.len(), 4);
        assert_eq!(config.pool.max_units, 3000);
        assert_eq!(
            config.payload.policy,
            SelectionPolicy::UniformRandom {
                max_participant: 110_002
            }
        );
    }
}
