//! Failure taxonomy for collaborator calls and the retry policy applied to them.
//!
//! Collaborators (content generators, search, image providers, publishers)
//! report either a transient failure, which the retry adapter may repeat, or a
//! permanent one, which surfaces to the workflow as an error.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

/// Error returned by any collaborator call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CollaboratorError {
    /// Retryable failure (network hiccup, empty output, rate limit).
    #[error("transient failure in {collaborator}: {message}")]
    Transient {
        collaborator: String,
        message: String,
    },
    /// Deterministic failure; retrying will not help.
    #[error("permanent failure in {collaborator}: {message}")]
    Permanent {
        collaborator: String,
        message: String,
    },
    /// The call exceeded its caller-imposed timeout.
    #[error("{collaborator} timed out after {}s", .after.as_secs())]
    Timeout {
        collaborator: String,
        after: Duration,
    },
}

impl CollaboratorError {
    pub fn transient(collaborator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient {
            collaborator: collaborator.into(),
            message: message.into(),
        }
    }

    pub fn permanent(collaborator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Permanent {
            collaborator: collaborator.into(),
            message: message.into(),
        }
    }

    /// Returns true if this failure is potentially recoverable via retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::Timeout { .. })
    }

    /// Short, user-facing description without the collaborator prefix noise.
    pub fn summary(&self) -> String {
        match self {
            Self::Transient { message, .. } | Self::Permanent { message, .. } => message.clone(),
            Self::Timeout { after, .. } => format!("timed out after {}s", after.as_secs()),
        }
    }
}

/// Canonical classification of a failed command invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No result within the configured duration.
    Timeout,
    /// Network-related error detected from stderr patterns.
    Network,
    /// Non-zero exit code from the collaborator process.
    ProcessExit(i32),
    /// The command could not be started at all.
    SpawnFailed(String),
    /// Collaborator produced no output.
    EmptyOutput,
}

impl FailureKind {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FailureKind::Timeout | FailureKind::Network | FailureKind::EmptyOutput
        )
    }

    /// Converts the classification into a collaborator error.
    pub fn into_error(self, collaborator: &str, detail: &str) -> CollaboratorError {
        let message = match &self {
            FailureKind::Timeout => format!("no result ({})", detail),
            FailureKind::Network => format!("network error: {}", detail),
            FailureKind::ProcessExit(code) => format!("exited with code {}: {}", code, detail),
            FailureKind::SpawnFailed(reason) => format!("could not start: {}", reason),
            FailureKind::EmptyOutput => "produced no output".to_string(),
        };
        if self.is_retryable() {
            CollaboratorError::transient(collaborator, message)
        } else {
            CollaboratorError::permanent(collaborator, message)
        }
    }
}

/// Regex pattern for classifying network errors from stderr.
pub const NETWORK_ERROR_PATTERN: &str = r"(?i)connect|network|ECONNREFUSED|ETIMEDOUT|connection\s+refused|name\s+resolution|DNS|socket|rate\s*limit|\b429\b|\b503\b";

/// Returns true if the stderr text looks like a transient network failure.
pub fn looks_like_network_error(stderr: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(NETWORK_ERROR_PATTERN).expect("network error pattern is valid"))
        .is_match(stderr)
}

/// Retry policy for collaborator adapters: bounded exponential backoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Default: 3
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry. Default: 2000ms
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Backoff multiplier. Default: 2.0
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Upper bound for any single delay. Default: 10000ms
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Per-call timeout imposed on collaborators. Default: 120s
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    2000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_call_timeout_secs() -> u64 {
    120
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

impl RetryPolicy {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// Delay to wait after the given failed attempt (1-based), before jitter.
    pub fn delay_after_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let raw = self.base_delay_ms as f64 * self.multiplier.powi(exponent);
        let capped = raw.min(self.max_delay_ms as f64);
        Duration::from_millis(capped as u64)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_attempts == 0 {
            anyhow::bail!("failure_policy.max_attempts must be at least 1");
        }
        if self.base_delay_ms == 0 {
            anyhow::bail!("failure_policy.base_delay_ms must be positive");
        }
        if self.max_delay_ms < self.base_delay_ms {
            anyhow::bail!("failure_policy.max_delay_ms must be >= base_delay_ms");
        }
        if self.multiplier < 1.0 {
            anyhow::bail!("failure_policy.multiplier must be >= 1.0");
        }
        if self.call_timeout_secs == 0 {
            anyhow::bail!("failure_policy.call_timeout_secs must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_delays_are_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after_attempt(0), Duration::ZERO);
        assert_eq!(policy.delay_after_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_after_attempt(2), Duration::from_secs(4));
        assert_eq!(policy.delay_after_attempt(3), Duration::from_secs(8));
        assert_eq!(policy.delay_after_attempt(4), Duration::from_secs(10));
        assert_eq!(policy.delay_after_attempt(9), Duration::from_secs(10));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(CollaboratorError::transient("llm", "503").is_retryable());
        assert!(CollaboratorError::Timeout {
            collaborator: "llm".into(),
            after: Duration::from_secs(1)
        }
        .is_retryable());
        assert!(!CollaboratorError::permanent("llm", "bad key").is_retryable());
    }

    #[test]
    fn test_failure_kind_maps_to_error_class() {
        let err = FailureKind::Network.into_error("gemini", "connection refused");
        assert!(err.is_retryable());
        let err = FailureKind::ProcessExit(2).into_error("gemini", "usage");
        assert!(!err.is_retryable());
        let err = FailureKind::SpawnFailed("not found".into()).into_error("gemini", "");
        assert!(matches!(err, CollaboratorError::Permanent { .. }));
    }

    #[test]
    fn test_network_pattern() {
        assert!(looks_like_network_error("Error: ECONNREFUSED 127.0.0.1"));
        assert!(looks_like_network_error("HTTP 429 rate limit exceeded"));
        assert!(!looks_like_network_error("invalid argument --foo"));
    }

    #[test]
    fn test_policy_validation() {
        assert!(RetryPolicy::default().validate().is_ok());
        let bad = RetryPolicy {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_policy_rejects_zero_base_delay() {
        let policy = RetryPolicy {
            base_delay_ms: 0,
            ..Default::default()
        };
        let err = policy.validate().expect_err("zero base delay");
        assert!(err.to_string().contains("base_delay_ms"));
    }

    #[test]
    fn test_policy_rejects_cap_below_base() {
        let policy = RetryPolicy {
            base_delay_ms: 5_000,
            max_delay_ms: 1_000,
            ..Default::default()
        };
        let err = policy.validate().expect_err("cap below base");
        assert!(err.to_string().contains("max_delay_ms"));

        let equal = RetryPolicy {
            base_delay_ms: 5_000,
            max_delay_ms: 5_000,
            ..Default::default()
        };
        assert!(equal.validate().is_ok());
    }
}
