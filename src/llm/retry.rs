use crate::memory::AgentMemory;
use crate::tools::ToolRegistry;
use crate::types::LlmResponse;
use async_trait::async_trait;

use std::sync::Arc;
use std::time::Duration;

/// A wrapper around any `AsyncLlmCaller` that retries transient failures
/// with exponential back-off.
pub struct RetryingLlmCaller {
    inner:       Arc<dyn super::AsyncLlmCaller>,
    max_retries: u32,
}

impl RetryingLlmCaller {
    pub fn new(inner: Arc<dyn super::AsyncLlmCaller>, max_retries: u32) -> Self {
        Self { inner, max_retries }
    }

    fn is_auth_error(err: &str) -> bool {
        let lower = err.to_lowercase();
        lower.contains("401")
            || lower.contains("403")
            || lower.contains("authentication")
            || lower.contains("unauthorized")
            || lower.contains("forbidden")
            || lower.contains("invalid api key")
            || lower.contains("api key not valid")
            || lower.contains("permission_denied")
    }

    fn is_rate_limit_error(err: &str) -> bool {
        let lower = err.to_lowercase();
        lower.contains("429")
            || lower.contains("rate limit")
            || lower.contains("too many requests")
            || lower.contains("resource_exhausted")
            || lower.contains("quota")
    }

    /// Seconds to wait after the given failed attempt (0-indexed).
    fn backoff_secs(err: &str, attempt: u32) -> u64 {
        let base_wait: u64 = if Self::is_rate_limit_error(err) { 5 } else { 1 };
        std::cmp::min(base_wait << attempt.min(6), 60)
    }
}

#[async_trait]
impl super::AsyncLlmCaller for RetryingLlmCaller {
    async fn call_async(
        &self,
        memory: &AgentMemory,
        tools:  &ToolRegistry,
        model:  &str,
    ) -> Result<LlmResponse, String> {
        let mut last_err = String::new();
        let mut rate_limited = false;

        for attempt in 0..=self.max_retries {
            match self.inner.call_async(memory, tools, model).await {
                Ok(resp) => return Ok(resp),
                Err(e) if Self::is_auth_error(&e) => {
                    tracing::error!(error = %e, "LLM auth error, not retrying");
                    return Err(e);
                }
                Err(e) => {
                    if Self::is_rate_limit_error(&e) {
                        rate_limited = true;
                    }

                    if attempt < self.max_retries {
                        let wait_secs = Self::backoff_secs(&e, attempt);
                        tracing::warn!(
                            attempt = attempt + 1,
                            max     = self.max_retries,
                            wait_s  = wait_secs,
                            error   = %e,
                            "LLM transient error, retrying"
                        );
                        tokio::time::sleep(Duration::from_secs(wait_secs)).await;
                    }
                    last_err = e;
                }
            }
        }

        let prefix = if rate_limited {
            "LLM RATE LIMIT EXCEEDED"
        } else {
            "LLM failed"
        };

        Err(format!(
            "{} after {} retries; last error: {}",
            prefix, self.max_retries, last_err
        ))
    }
}
