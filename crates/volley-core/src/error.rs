use thiserror::Error;

/// Canonical error type for core load-generation operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A rate profile, pool bound, payload policy, or threshold rule
    /// failed validation.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Human-readable explanation of the invalid value.
        message: String,
    },
}

impl CoreError {
    /// Creates an `InvalidConfig` variant.
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

/// Convenient result alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
