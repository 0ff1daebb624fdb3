//! Retry plus memory recovery.
//!
//! For every operation the orchestrator first makes sure memory is within
//! bounds (reclaim, pause, re-check), then runs the operation under the
//! retry controller with these extra rules:
//!
//! - a Memory failure triggers the same memory recovery and, if that works,
//!   one attempt beyond the retry budget
//! - an IO failure adds a fixed pause before the next attempt
//! - a Permission failure is never retried
//!
//! Every error seen, including ones from memory checks, lands in the shared
//! [`ErrorCollector`].

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::memory::MemoryMonitor;
use super::retry::{AttemptHook, Recovery, RetryController, RetryOutcome};
use crate::cancel::CancelToken;
use crate::config::RetryConfig;
use crate::error::{ErrorCollector, ErrorKind, PdfOpsError, Result};

/// Default pause added after an IO failure.
pub const DEFAULT_IO_PAUSE: Duration = Duration::from_millis(500);

/// Composes a [`RetryController`] and a [`MemoryMonitor`].
#[derive(Debug, Clone)]
pub struct RecoveryOrchestrator {
    retry: RetryController,
    monitor: MemoryMonitor,
    collector: Arc<ErrorCollector>,
    io_pause: Duration,
}

impl RecoveryOrchestrator {
    /// Create an orchestrator feeding `collector`.
    pub fn new(retry: RetryConfig, monitor: MemoryMonitor, collector: Arc<ErrorCollector>) -> Self {
        Self {
            retry: RetryController::new(retry).with_collector(Arc::clone(&collector)),
            monitor,
            collector,
            io_pause: DEFAULT_IO_PAUSE,
        }
    }

    /// Override the pause added after IO failures.
    pub fn with_io_pause(mut self, pause: Duration) -> Self {
        self.io_pause = pause;
        self
    }

    /// Shared error collector.
    pub fn collector(&self) -> &Arc<ErrorCollector> {
        &self.collector
    }

    /// Memory monitor in use.
    pub fn monitor(&self) -> &MemoryMonitor {
        &self.monitor
    }

    /// Retry controller in use. Its errors also feed the collector.
    pub fn retry(&self) -> &RetryController {
        &self.retry
    }

    /// Check memory; on failure reclaim, pause, and check once more.
    ///
    /// # Errors
    ///
    /// Returns the Memory error of the second check, or a cancellation error
    /// if `cancel` fires during the pause.
    pub async fn recover_memory(&self, cancel: &CancelToken) -> Result<()> {
        if self.monitor.check().is_ok() {
            return Ok(());
        }

        let usage = self.monitor.force_reclaim();
        warn!(%usage, "memory over limit, reclaiming");
        cancel.sleep(self.monitor.config().recovery_pause).await?;

        self.monitor.check().inspect(|_| info!("memory recovered"))
    }

    /// Run `op` under memory recovery and retry.
    pub async fn run<T, F, Fut>(&self, op: F, cancel: &CancelToken) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_with_report(op, cancel).await.result
    }

    /// Like [`run`](Self::run), reporting what the retry loop observed.
    pub async fn run_with_report<T, F, Fut>(&self, op: F, cancel: &CancelToken) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let hook = RecoveryHook {
            orchestrator: self,
            cancel,
        };
        self.retry.execute_with_hook(op, &hook, cancel).await
    }
}

struct RecoveryHook<'a> {
    orchestrator: &'a RecoveryOrchestrator,
    cancel: &'a CancelToken,
}

#[async_trait]
impl AttemptHook for RecoveryHook<'_> {
    async fn before_attempt(&self, _attempt: u32) -> Result<()> {
        self.orchestrator.recover_memory(self.cancel).await
    }

    async fn after_failure(&self, err: &PdfOpsError) -> Recovery {
        match err.kind() {
            ErrorKind::Memory => match self.orchestrator.recover_memory(self.cancel).await {
                Ok(()) => Recovery::ExtraAttempt,
                Err(_) => Recovery::Fatal,
            },
            ErrorKind::Io => Recovery::Pause(self.orchestrator.io_pause),
            ErrorKind::Permission => Recovery::Fatal,
            _ => Recovery::Default,
        }
    }
}
