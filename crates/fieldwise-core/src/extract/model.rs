use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::prompt::PromptPayload;
use crate::value::Citation;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Rate limited by model service")]
    RateLimited,
    #[error("Authentication failure: {0}")]
    AuthFailure(String),
    #[error("Model call timed out after {0:?}")]
    Timeout(Duration),
    #[error("Credits exhausted")]
    CreditsExhausted,
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("Transport error: {0}")]
    Transport(String),
}

impl ModelError {
    /// Transient failures are retried with backoff; everything else is
    /// surfaced immediately.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Timeout(_))
    }
}

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn add(&mut self, other: TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// One field as reported by the model, before type mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFieldResult {
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub citation: Option<Citation>,
    #[serde(default)]
    pub confidence: f64,
}

/// Structured output of one model invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelResponse {
    pub fields: BTreeMap<String, RawFieldResult>,
    #[serde(default)]
    pub usage: TokenUsage,
}

/// The boundary to the external generative model. Substitutable with a fake
/// in tests; the pipeline never sees a concrete wire format.
#[async_trait::async_trait]
pub trait ModelBoundary: Send + Sync {
    async fn invoke(&self, payload: &PromptPayload) -> ModelResult<ModelResponse>;
}

/// Token bucket shared by all concurrent extraction requests in front of the
/// model boundary. Explicitly injected so concurrent-request tests stay
/// deterministic; never a process-wide singleton.
pub struct RateLimiter {
    state: Mutex<BucketState>,
    capacity: f64,
    refill_per_second: f64,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Slowest accepted refill rate. Non-positive or non-finite rates clamp
/// here, keeping every computed refill wait finite.
const MIN_REFILL_PER_SECOND: f64 = 0.001;

impl RateLimiter {
    #[must_use]
    pub fn new(capacity: u32, refill_per_second: f64) -> Arc<Self> {
        let refill_per_second = if refill_per_second.is_finite() {
            refill_per_second.max(MIN_REFILL_PER_SECOND)
        } else {
            MIN_REFILL_PER_SECOND
        };
        Arc::new(Self {
            state: Mutex::new(BucketState {
                tokens: f64::from(capacity),
                last_refill: Instant::now(),
            }),
            capacity: f64::from(capacity),
            refill_per_second,
        })
    }

    /// A limiter that never blocks, for tests and single-request hosts.
    #[must_use]
    pub fn unlimited() -> Arc<Self> {
        Self::new(u32::MAX, f64::from(u32::MAX))
    }

    /// Wait until one call's worth of budget is available, then consume it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(state.last_refill).as_secs_f64();
                state.tokens =
                    (state.tokens + elapsed * self.refill_per_second).min(self.capacity);
                state.last_refill = now;

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return;
                }
                Duration::from_secs_f64((1.0 - state.tokens) / self.refill_per_second)
            };
            tokio::time::sleep(wait).await;
        }
    }
}

/// Wraps any [`ModelBoundary`] with the shared rate limiter, a per-call
/// timeout, and capped exponential backoff for transient failures.
pub struct RetryingBoundary<B> {
    inner: B,
    limiter: Arc<RateLimiter>,
    timeout: Duration,
    max_retries: u32,
    initial_backoff: Duration,
}

impl<B: ModelBoundary> RetryingBoundary<B> {
    #[must_use]
    pub fn new(
        inner: B,
        limiter: Arc<RateLimiter>,
        timeout: Duration,
        max_retries: u32,
        initial_backoff: Duration,
    ) -> Self {
        Self {
            inner,
            limiter,
            timeout,
            max_retries,
            initial_backoff,
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        use rand::Rng;

        let base = self.initial_backoff * 2_u32.saturating_pow(attempt);
        let jitter_ms = rand::rng().random_range(0..250);
        base + Duration::from_millis(jitter_ms)
    }
}

#[async_trait::async_trait]
impl<B: ModelBoundary> ModelBoundary for RetryingBoundary<B> {
    async fn invoke(&self, payload: &PromptPayload) -> ModelResult<ModelResponse> {
        let mut attempt = 0;

        loop {
            self.limiter.acquire().await;

            let outcome = match tokio::time::timeout(self.timeout, self.inner.invoke(payload)).await
            {
                Ok(result) => result,
                Err(_) => Err(ModelError::Timeout(self.timeout)),
            };

            match outcome {
                Ok(response) => return Ok(response),
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    let delay = self.backoff_delay(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        max = self.max_retries,
                        error = %err,
                        "transient model failure, retrying after {delay:?}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
