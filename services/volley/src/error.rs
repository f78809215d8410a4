use thiserror::Error;

use crate::lifecycle::ProbeReport;

/// Errors that abort a run before or outside the load phase. Failures
/// during the load phase are never errors; they are recorded outcomes.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Core component rejected its parameters.
    #[error(transparent)]
    Core(#[from] volley_core::CoreError),

    /// The HTTP client could not be constructed.
    #[error("http client error: {0}")]
    Client(#[from] reqwest::Error),

    /// The setup health probe did not satisfy its acceptance predicate;
    /// the run aborts before any load-phase iteration executes.
    #[error("setup probe failed: {0}")]
    SetupFailed(ProbeReport),
}

/// Convenient result alias for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;
