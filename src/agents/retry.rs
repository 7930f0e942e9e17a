//! Retry adapters: bounded exponential backoff with jitter for transient
//! collaborator failures.
//!
//! Retries live here so the engine and the pipeline stay retry-agnostic and
//! only see the final success or error.

use super::{ContentGenerator, GenerationRequest, SearchProvider, SearchResult};
use crate::domain::failure::{CollaboratorError, RetryPolicy};
use async_trait::async_trait;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Runs `operation` until it succeeds, fails permanently or runs out of attempts.
pub async fn retry_transient<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut operation: F,
) -> Result<T, CollaboratorError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CollaboratorError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                let delay = with_jitter(policy.delay_after_attempt(attempt));
                warn!(
                    collaborator = label,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Adds up to 10% random jitter.
fn with_jitter(delay: Duration) -> Duration {
    if delay.is_zero() {
        return delay;
    }
    let factor = 1.0 + rand::thread_rng().gen_range(0.0..0.1);
    delay.mul_f64(factor)
}

/// Wraps a content generator with the retry policy.
pub struct RetryingContentGenerator<G> {
    inner: G,
    policy: RetryPolicy,
}

impl<G: ContentGenerator> RetryingContentGenerator<G> {
    pub fn new(inner: G, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<G: ContentGenerator> ContentGenerator for RetryingContentGenerator<G> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, CollaboratorError> {
        retry_transient(&self.policy, self.inner.name(), || self.inner.generate(request)).await
    }
}

/// Wraps a search provider with the retry policy.
pub struct RetryingSearchProvider<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: SearchProvider> RetryingSearchProvider<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<S: SearchProvider> SearchProvider for RetryingSearchProvider<S> {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, CollaboratorError> {
        retry_transient(&self.policy, "search", || self.inner.search(query)).await
    }
}
