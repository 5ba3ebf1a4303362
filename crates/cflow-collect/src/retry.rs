//! Retry with exponential backoff and rate-limit gating for remote reads.
//!
//! A [`RetryClient`] wraps every request: before each attempt it waits out
//! an exhausted rate-limit window, after each success it records the rate
//! limit the remote reported, and transient failures are retried with
//! `base_delay * 2^attempt` backoff.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use cflow_core::{CflowError, CflowResult};

/// Configuration for retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Backoff after failed attempt `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2_u32.saturating_pow(attempt))
    }
}

/// Retry classification for errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    NoRetry,
}

/// Errors that know whether another attempt can help.
pub trait RetryableError {
    fn retry_decision(&self) -> RetryDecision;
}

impl RetryableError for CflowError {
    fn retry_decision(&self) -> RetryDecision {
        match self {
            CflowError::RateLimited(_) | CflowError::Server { .. } | CflowError::Network(_) => RetryDecision::Retry,
            _ => RetryDecision::NoRetry,
        }
    }
}

/// Rate-limit window as last reported by the remote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub remaining: Option<u32>,
    pub reset_at: Option<DateTime<Utc>>,
}

impl RateLimitInfo {
    pub fn is_empty(&self) -> bool {
        self.remaining.is_none() && self.reset_at.is_none()
    }
}

/// A response value plus the rate-limit metadata that came with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub value: T,
    pub rate_limit: Option<RateLimitInfo>,
}

impl<T> Fetched<T> {
    pub fn new(value: T) -> Self {
        Self { value, rate_limit: None }
    }

    pub fn with_rate_limit(mut self, info: Option<RateLimitInfo>) -> Self {
        self.rate_limit = info.filter(|i| !i.is_empty());
        self
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
        Fetched {
            value: f(self.value),
            rate_limit: self.rate_limit,
        }
    }
}

/// Source of time for rate-limit waits and backoff sleeps.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `tokio::time`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Executes remote reads under a [`RetryPolicy`], sharing one rate-limit
/// window across all calls made through it.
pub struct RetryClient {
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
    rate_limit: Mutex<RateLimitInfo>,
}

impl RetryClient {
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_clock(policy, Arc::new(TokioClock))
    }

    pub fn with_clock(policy: RetryPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy,
            clock,
            rate_limit: Mutex::new(RateLimitInfo::default()),
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Last recorded rate-limit window.
    pub async fn rate_limit(&self) -> RateLimitInfo {
        *self.rate_limit.lock().await
    }

    async fn record_rate_limit(&self, info: RateLimitInfo) {
        let mut cached = self.rate_limit.lock().await;
        if let Some(remaining) = info.remaining {
            cached.remaining = Some(remaining);
        }
        if let Some(reset_at) = info.reset_at {
            cached.reset_at = Some(reset_at);
        }
    }

    /// Block until the reset time when the window is used up.
    async fn wait_for_rate_limit(&self, operation: &str) {
        let info = *self.rate_limit.lock().await;
        let (Some(0), Some(reset_at)) = (info.remaining, info.reset_at) else {
            return;
        };

        let now = self.clock.now();
        if reset_at > now {
            let wait = (reset_at - now).to_std().unwrap_or_default();
            warn!(
                operation,
                wait_secs = wait.as_secs_f64(),
                reset_at = %reset_at,
                "Rate limit exhausted, waiting for reset"
            );
            self.clock.sleep(wait).await;
        }
    }

    /// Run `operation` until it succeeds, fails permanently, or runs out of
    /// attempts.
    ///
    /// There is no sleep after the final attempt. Exhaustion returns
    /// [`CflowError::RetryExhausted`] wrapping the last error.
    pub async fn execute<F, Fut, T>(&self, operation: &str, mut call: F) -> CflowResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CflowResult<Fetched<T>>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            self.wait_for_rate_limit(operation).await;

            match call().await {
                Ok(fetched) => {
                    if let Some(info) = fetched.rate_limit {
                        self.record_rate_limit(info).await;
                    }
                    return Ok(fetched.value);
                }
                Err(e) => match e.retry_decision() {
                    RetryDecision::NoRetry => {
                        debug!(operation, attempt = attempt + 1, error = %e, "Operation failed with non-retryable error");
                        return Err(e);
                    }
                    RetryDecision::Retry => {
                        attempt += 1;
                        if attempt >= max_attempts {
                            warn!(operation, attempts = attempt, error = %e, "Operation failed, giving up");
                            return Err(CflowError::RetryExhausted {
                                attempts: attempt,
                                last: Box::new(e),
                            });
                        }

                        let backoff = self.policy.backoff(attempt - 1);
                        warn!(
                            operation,
                            attempt,
                            max_attempts,
                            backoff_secs = backoff.as_secs_f64(),
                            error = %e,
                            "Retrying after error"
                        );
                        self.clock.sleep(backoff).await;
                    }
                },
            }
        }
    }
}
