use backoff::{backoff::Backoff, ExponentialBackoff};
use std::future::Future;
use std::time::Duration;

use super::context::CallContext;
use super::errors::GeminiError;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_INITIAL_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(120);

const BACKOFF_MULTIPLIER: f64 = 2.0;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_interval: DEFAULT_INITIAL_INTERVAL,
            max_interval: DEFAULT_MAX_INTERVAL,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with default intervals and the given retry budget
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Set the delay before the first retry
    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    /// Set the ceiling for every delay
    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    /// Total number of times an operation may be invoked.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    fn backoff(&self) -> ExponentialBackoff {
        // The first interval is returned as-is by `backoff`, so clamp it here.
        let mut backoff = ExponentialBackoff {
            initial_interval: self.initial_interval.min(self.max_interval),
            max_interval: self.max_interval,
            multiplier: BACKOFF_MULTIPLIER,
            randomization_factor: 0.0,
            max_elapsed_time: None,
            ..Default::default()
        };
        backoff.reset();
        backoff
    }
}

pub struct RetryHandler {
    policy: RetryPolicy,
    backoff: ExponentialBackoff,
    attempts: u32,
}

impl RetryHandler {
    pub fn new(policy: RetryPolicy) -> Self {
        let backoff = policy.backoff();
        Self {
            policy,
            backoff,
            attempts: 0,
        }
    }

    /// Runs `operation` until it succeeds, `should_retry` declines the error,
    /// the attempt budget runs out, or `ctx` ends.
    ///
    /// `label` only names the operation in logs and in the exhausted error.
    pub async fn retry<F, Fut, T, P>(
        &mut self,
        ctx: &CallContext,
        label: &str,
        mut operation: F,
        should_retry: P,
    ) -> Result<T, GeminiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GeminiError>>,
        P: Fn(&GeminiError) -> bool,
    {
        let max_attempts = self.policy.max_attempts();

        loop {
            // Check if the caller gave up before spending another attempt
            if let Some(err) = ctx.err() {
                return Err(err);
            }

            self.attempts += 1;

            let error = match operation().await {
                Ok(result) => return Ok(result),
                Err(error) => error,
            };

            // Check if the error is worth retrying at all
            if !should_retry(&error) {
                return Err(error);
            }

            // Check if we've exhausted all attempts
            if self.attempts >= max_attempts {
                tracing::error!(
                    label,
                    attempts = self.attempts,
                    error = %error,
                    "Retries exhausted"
                );
                return Err(GeminiError::RetriesExhausted {
                    label: label.to_string(),
                    attempts: self.attempts,
                    source: Box::new(error),
                });
            }

            let delay = self
                .backoff
                .next_backoff()
                .unwrap_or(self.policy.max_interval)
                .min(self.policy.max_interval);

            tracing::warn!(
                label,
                attempt = self.attempts,
                max_attempts,
                error = %error,
                delay_ms = delay.as_millis() as u64,
                "Attempt failed with retryable error, backing off"
            );

            // Sleep unless the context ends first
            ctx.sleep(delay).await?;
        }
    }

    /// Number of times the operation has been invoked
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Reset the handler for a new operation
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.backoff.reset();
    }
}

pub async fn with_retry<F, Fut, T, P>(
    ctx: &CallContext,
    policy: &RetryPolicy,
    label: &str,
    operation: F,
    should_retry: P,
) -> Result<T, GeminiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GeminiError>>,
    P: Fn(&GeminiError) -> bool,
{
    let mut handler = RetryHandler::new(policy.clone());
    handler.retry(ctx, label, operation, should_retry).await
}
