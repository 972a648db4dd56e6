//! Model client abstraction.
//!
//! This module provides a trait-based abstraction over LLM providers, with
//! Gemini as the primary implementation. The contract is deliberately
//! minimal: a prompt in, generated text out, or a classified error. Retry
//! with backoff lives in [`RetryingClient`] so every stage shares identical
//! retry semantics instead of re-implementing them.

mod error;
mod gemini;
pub mod standin;

pub use error::{classify_http_status, LlmError, RetryConfig};
pub use gemini::GeminiClient;

use async_trait::async_trait;
use rand::Rng;
use tracing::warn;

/// Trait for model clients.
///
/// Any concrete provider (hosted API, local model, scripted mock) implements
/// exactly this contract to be pluggable. Implementations must be safe to
/// call repeatedly with identical input.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a prompt and return the generated text.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for std::sync::Arc<T> {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        (**self).complete(prompt).await
    }
}

/// Wrapper that retries transient failures with exponential backoff + jitter.
///
/// Fatal errors propagate immediately with no retry. After exhausting
/// `max_attempts` the last transient error is re-raised rather than
/// returning empty text; the caller decides whether to fall back.
pub struct RetryingClient<C> {
    inner: C,
    config: RetryConfig,
}

impl<C: LlmClient> RetryingClient<C> {
    pub fn new(inner: C, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl<C: LlmClient> LlmClient for RetryingClient<C> {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let attempts = self.config.max_attempts.max(1);
        let mut last_err = None;

        for attempt in 1..=attempts {
            match self.inner.complete(prompt).await {
                Ok(text) => return Ok(text),
                Err(err @ LlmError::Fatal { .. }) => return Err(err),
                Err(err) => {
                    warn!(attempt, %err, "transient model failure");
                    if attempt < attempts {
                        let base = self.config.backoff_delay(attempt);
                        let jitter_ms =
                            rand::thread_rng().gen_range(0..=(base.as_millis() as u64).max(2) / 2);
                        tokio::time::sleep(base + std::time::Duration::from_millis(jitter_ms))
                            .await;
                    }
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| LlmError::transient("retries exhausted")))
    }
}

/// Client used when no credential is configured.
///
/// Always fails fatally, which latches the coordinator into stand-in mode so
/// the whole workflow still runs end to end offline.
pub struct OfflineClient;

#[async_trait]
impl LlmClient for OfflineClient {
    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::fatal("no API key configured"))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted client that replays a fixed sequence of responses.
    pub struct ScriptedClient {
        script: Mutex<VecDeque<Result<String, LlmError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedClient {
        pub fn new(script: Vec<Result<String, LlmError>>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().collect()),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::transient("script exhausted")))
        }
    }

    pub fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 2,
        }
    }
}
