//! Error types for the support desk router

use std::time::Duration;
use thiserror::Error;

/// Result type alias for router operations
pub type Result<T> = std::result::Result<T, RouterError>;

#[derive(Error, Debug)]
pub enum RouterError {

    // =============================
    // Turn Preconditions & Invariants
    // =============================

    #[error("Empty user message: a turn needs non-blank input")]
    EmptyMessage,

    #[error("Invalid turn state: {0}")]
    StateError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // =============================
    // Completion Service Failures
    // =============================

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("LLM authentication failed: {0}")]
    AuthError(String),

    #[error("LLM rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("LLM request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Out-of-contract {field} value {value:?} (expected one of {expected:?})")]
    OutOfContract {
        field: &'static str,
        value: String,
        expected: &'static [&'static str],
    },

    // =============================
    // External Library Conversions
    // =============================

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl RouterError {
    /// Failure of the external completion call itself (transport, auth, quota,
    /// unparseable body). Out-of-contract answers are reported separately.
    pub fn is_external_failure(&self) -> bool {
        matches!(
            self,
            Self::LlmError(_)
                | Self::AuthError(_)
                | Self::RateLimited(_)
                | Self::Timeout(_)
                | Self::HttpError(_)
        )
    }

    pub fn is_out_of_contract(&self) -> bool {
        matches!(self, Self::OutOfContract { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(RouterError::LlmError("boom".into()).is_external_failure());
        assert!(RouterError::Timeout(Duration::from_secs(3)).is_external_failure());
        assert!(!RouterError::EmptyMessage.is_external_failure());

        let err = RouterError::OutOfContract {
            field: "next_node",
            value: "billing".into(),
            expected: &["receptionist", "classifier"],
        };
        assert!(err.is_out_of_contract());
        assert!(!err.is_external_failure());
        assert!(err.to_string().contains("\"billing\""));
    }
}
