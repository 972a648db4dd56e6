//! Error taxonomy and retry policy for model calls.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors raised by an [`super::LlmClient`].
///
/// The split drives the coordinator's degradation policy: `Transient` is
/// retried with backoff, `Fatal` latches the whole run into stand-in mode.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    /// Retryable condition: rate limit, timeout, 5xx-equivalent, network.
    #[error("transient model error: {message}")]
    Transient { message: String },

    /// Unrecoverable condition: missing credential, auth/config failure.
    /// No retry; further remote calls are pointless.
    #[error("fatal model error: {message}")]
    Fatal { message: String },
}

impl LlmError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal {
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }
}

/// Classify an HTTP status code from a model provider.
///
/// 408/429 and all 5xx are worth retrying; auth and other client errors
/// are configuration problems and retrying would fail identically.
pub fn classify_http_status(status: u16, body: &str) -> LlmError {
    match status {
        408 | 429 => LlmError::transient(format!("HTTP {status}: {body}")),
        500..=599 => LlmError::transient(format!("HTTP {status}: {body}")),
        401 | 403 => LlmError::fatal(format!("authentication rejected (HTTP {status}): {body}")),
        _ => LlmError::fatal(format!("HTTP {status}: {body}")),
    }
}

/// Retry policy for transient model failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first (so 3 means up to 2 retries).
    pub max_attempts: u32,
    /// Base delay before the first retry; doubles each attempt.
    pub base_delay_ms: u64,
    /// Upper bound on any single backoff delay.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
        }
    }
}

impl RetryConfig {
    /// Backoff delay before retry number `retry` (1-based), jitter excluded.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let exp = self
            .base_delay_ms
            .saturating_mul(1u64 << retry.saturating_sub(1).min(16));
        Duration::from_millis(exp.min(self.max_delay_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_transient_statuses() {
        assert!(!classify_http_status(429, "rate limited").is_fatal());
        assert!(!classify_http_status(503, "overloaded").is_fatal());
        assert!(!classify_http_status(408, "timeout").is_fatal());
    }

    #[test]
    fn test_classify_fatal_statuses() {
        assert!(classify_http_status(401, "bad key").is_fatal());
        assert!(classify_http_status(403, "forbidden").is_fatal());
        assert!(classify_http_status(400, "bad request").is_fatal());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let cfg = RetryConfig {
            max_attempts: 5,
            base_delay_ms: 100,
            max_delay_ms: 350,
        };
        assert_eq!(cfg.backoff_delay(1), Duration::from_millis(100));
        assert_eq!(cfg.backoff_delay(2), Duration::from_millis(200));
        // Third retry would be 400ms, capped at 350ms.
        assert_eq!(cfg.backoff_delay(3), Duration::from_millis(350));
    }
}
