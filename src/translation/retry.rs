/*!
 * Bounded retry and timeout envelope around collaborator calls.
 */

use log::warn;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::app_config::Config;
use crate::errors::{ChunkFailure, ProviderError};
use crate::providers::{Completion, CompletionRequest, Provider};

/// Upper bound for a single backoff sleep
const MAX_DELAY: Duration = Duration::from_secs(60);

/// Shared abort switch checked before each chunk and between attempts
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why [`RetryPolicy::run`] gave up
#[derive(Debug, Clone, PartialEq)]
pub enum RetryError {
    /// Every attempt failed; carries the attempt count and the last failure
    Exhausted { attempts: u32, last: ChunkFailure },
    /// The cancel flag was raised between attempts
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, first one included
    pub max_attempts: u32,
    /// Sleep after the first failure
    pub initial_delay: Duration,
    /// Multiplier applied per further failure
    pub backoff: f64,
    /// Deadline for one collaborator call
    pub timeout: Duration,
    /// Add up to 10% random jitter to each sleep
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 5,
            initial_delay: Duration::from_secs(2),
            backoff: 2.0,
            timeout: Duration::from_secs(120),
            jitter: true,
        }
    }
}

impl From<&Config> for RetryPolicy {
    fn from(config: &Config) -> Self {
        RetryPolicy {
            max_attempts: config.retry_times.max(1),
            initial_delay: Duration::from_secs_f64(config.retry_delay_secs.max(0.0)),
            backoff: config.retry_backoff.max(1.0),
            timeout: Duration::from_secs(config.timeout_secs),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// No sleeping between attempts; for tests and local stubs
    pub fn immediate(max_attempts: u32) -> Self {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::ZERO,
            backoff: 1.0,
            timeout: Duration::from_secs(30),
            jitter: false,
        }
    }

    /// Sleep before attempt `failed + 1`, after `failed` failures (1-based)
    pub fn delay_after(&self, failed: u32) -> Duration {
        let exponent = failed.saturating_sub(1) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff.powi(exponent);
        let base = Duration::from_secs_f64(secs.min(MAX_DELAY.as_secs_f64()));
        if self.jitter && !base.is_zero() {
            let extra = rand::rng().random_range(0.0..=0.1);
            base.mul_f64(1.0 + extra)
        } else {
            base
        }
    }

    /// Call the provider once, bounded by the policy timeout
    pub async fn call(&self, provider: &dyn Provider, request: CompletionRequest) -> Result<Completion, ProviderError> {
        match tokio::time::timeout(self.timeout, provider.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(format!(
                "no completion within {}s",
                self.timeout.as_secs_f64()
            ))),
        }
    }

    /// Run `attempt` until it succeeds, attempts run out, or `cancel` is
    /// raised. The closure receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, label: &str, cancel: &CancelFlag, mut attempt: F) -> Result<T, RetryError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ChunkFailure>>,
    {
        let mut number = 1;
        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled);
            }
            match attempt(number).await {
                Ok(value) => return Ok(value),
                Err(failure) if number >= self.max_attempts => {
                    return Err(RetryError::Exhausted {
                        attempts: number,
                        last: failure,
                    });
                }
                Err(failure) => {
                    let delay = self.delay_after(number);
                    warn!(
                        "{}: attempt {}/{} failed ({}), retrying in {:.1}s",
                        label,
                        number,
                        self.max_attempts,
                        failure,
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                    number += 1;
                }
            }
        }
    }
}
