//! Bounded exponential-backoff retry.
//!
//! Attempts run strictly one after another. Between two attempts the
//! controller sleeps `delay`, which starts at `initial_delay`, is multiplied
//! by `backoff_factor` after every retry and never exceeds `max_delay`. The
//! whole loop is bounded by `timeout`: an attempt still running at the
//! deadline is dropped and no sleep extends past it.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::config::RetryConfig;
use crate::error::{CancelReason, ErrorCollector, PdfOpsError, Result};

/// What to do after a failed attempt, as decided by an [`AttemptHook`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Retry only if the error kind is retryable.
    Default,
    /// Stop now and surface the error.
    Fatal,
    /// Like `Default`, sleeping this much longer before the next attempt.
    Pause(Duration),
    /// Retry even past the attempt budget, once per loop.
    ExtraAttempt,
}

/// Extension points around each attempt.
#[async_trait]
pub trait AttemptHook: Send + Sync {
    /// Runs before every attempt. An error ends the loop without running the
    /// attempt.
    async fn before_attempt(&self, _attempt: u32) -> Result<()> {
        Ok(())
    }

    /// Runs after every failed attempt.
    async fn after_failure(&self, _err: &PdfOpsError) -> Recovery {
        Recovery::Default
    }
}

/// Hook that changes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHook;

impl AttemptHook for NoHook {}

/// Everything a retry loop observed.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    /// Final result.
    pub result: Result<T>,
    /// Attempts started.
    pub attempts: u32,
    /// Delays slept between attempts, in order.
    pub delays: Vec<Duration>,
    /// Every attempt error, in order.
    pub errors: Vec<PdfOpsError>,
}

/// Runs operations under a [`RetryConfig`].
#[derive(Debug, Clone)]
pub struct RetryController {
    config: RetryConfig,
    collector: Option<Arc<ErrorCollector>>,
}

impl RetryController {
    /// Create a controller.
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            collector: None,
        }
    }

    /// Also append every attempt error to `collector`.
    pub fn with_collector(mut self, collector: Arc<ErrorCollector>) -> Self {
        self.collector = Some(collector);
        self
    }

    /// Settings in use.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `op` until it succeeds, fails terminally, or the budget runs out.
    pub async fn execute<T, F, Fut>(&self, op: F, cancel: &CancelToken) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute_with_report(op, cancel).await.result
    }

    /// Like [`execute`](Self::execute), reporting attempts, delays and errors.
    pub async fn execute_with_report<T, F, Fut>(&self, op: F, cancel: &CancelToken) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute_with_hook(op, &NoHook, cancel).await
    }

    /// Run `op` with `hook` consulted around every attempt.
    pub async fn execute_with_hook<T, F, Fut>(
        &self,
        mut op: F,
        hook: &dyn AttemptHook,
        cancel: &CancelToken,
    ) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let deadline = Instant::now() + self.config.timeout;
        let mut budget = self.config.max_retries.saturating_add(1);
        let mut extra_granted = false;
        let mut delay = self.config.initial_delay.min(self.config.max_delay);

        let mut outcome = RetryOutcome {
            result: Err(PdfOpsError::cancelled(CancelReason::Cancelled)),
            attempts: 0,
            delays: Vec::new(),
            errors: Vec::new(),
        };

        loop {
            if let Err(err) = cancel.check() {
                return self.finish(outcome, err);
            }
            if Instant::now() >= deadline {
                return self.finish(outcome, PdfOpsError::cancelled(CancelReason::Timeout));
            }
            if let Err(err) = hook.before_attempt(outcome.attempts + 1).await {
                return self.finish(outcome, err);
            }

            outcome.attempts += 1;
            debug!(attempt = outcome.attempts, budget, "starting attempt");

            let err = match tokio::time::timeout_at(deadline, op()).await {
                Ok(Ok(value)) => {
                    outcome.result = Ok(value);
                    return outcome;
                }
                Ok(Err(err)) => err,
                Err(_) => PdfOpsError::cancelled(CancelReason::Timeout),
            };
            self.record(&mut outcome, &err);

            if err.is_cancellation() {
                return self.finish(outcome, err);
            }

            let mut pause = Duration::ZERO;
            match hook.after_failure(&err).await {
                Recovery::Fatal => return self.finish(outcome, err),
                Recovery::Default if !err.is_retryable() => return self.finish(outcome, err),
                Recovery::Pause(_) if !err.is_retryable() => return self.finish(outcome, err),
                Recovery::Pause(extra) => pause = extra,
                Recovery::ExtraAttempt if !extra_granted => {
                    extra_granted = true;
                    budget = budget.saturating_add(1);
                }
                Recovery::Default | Recovery::ExtraAttempt => {}
            }

            if outcome.attempts >= budget {
                warn!(attempts = outcome.attempts, error = %err, "retries exhausted");
                return self.finish(outcome, err);
            }

            let sleep = delay + pause;
            let remaining = deadline.saturating_duration_since(Instant::now());
            warn!(attempt = outcome.attempts, ?sleep, error = %err, "attempt failed, retrying");

            if sleep >= remaining {
                // The deadline falls inside this sleep.
                if let Err(err) = cancel.sleep(remaining).await {
                    return self.finish(outcome, err);
                }
                return self.finish(outcome, PdfOpsError::cancelled(CancelReason::Timeout));
            }
            if let Err(err) = cancel.sleep(sleep).await {
                return self.finish(outcome, err);
            }
            outcome.delays.push(sleep);

            delay = scale(delay, self.config.backoff_factor).min(self.config.max_delay);
        }
    }

    fn record<T>(&self, outcome: &mut RetryOutcome<T>, err: &PdfOpsError) {
        outcome.errors.push(err.clone());
        if let Some(collector) = &self.collector {
            collector.push(err.clone());
        }
    }

    fn finish<T>(&self, mut outcome: RetryOutcome<T>, err: PdfOpsError) -> RetryOutcome<T> {
        // Attempt errors are already recorded; add the ones raised around them.
        let from_attempt = outcome.errors.last().is_some_and(|last| same_error(last, &err));
        if !from_attempt && let Some(collector) = &self.collector {
            collector.push(err.clone());
        }
        outcome.result = Err(err);
        outcome
    }
}

fn same_error(a: &PdfOpsError, b: &PdfOpsError) -> bool {
    a.kind() == b.kind() && a.message() == b.message() && a.cancellation() == b.cancellation()
}

fn scale(delay: Duration, factor: f64) -> Duration {
    Duration::from_nanos((delay.as_nanos() as f64 * factor).round() as u64)
}
