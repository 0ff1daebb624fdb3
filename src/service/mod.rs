//! Resilient service facade.
//!
//! [`ResilientService`] is what the binary and most library users talk to.
//! It owns the discovered engine and layers the cross-cutting behaviour on
//! top of it:
//!
//! - inspections (`validate`, `info`, `is_encrypted`) run under the retry
//!   controller after a readability check of the input
//! - writes (`decrypt`, `merge`) run under the recovery orchestrator, with
//!   the destination passed through the output resolver and, when
//!   configured, protected by a backup
//! - batch variants record one outcome per job and never stop early
//!
//! When discovery found no engine, writes fail with Processing and
//! inspections with InvalidFile.

pub mod jobs;

use futures::stream::{self, StreamExt, TryStreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::decrypt::{DecryptOutcome, Decryptor};
use crate::engine::{Discovery, EngineAvailability, PdfEngine, quick_encryption_scan};
use crate::error::{ErrorCollector, PdfOpsError, Result};
use crate::info::PdfInfo;
use crate::io::guard::{check_readable, safe_output_operation};
use crate::io::{OutputResolver, RollbackManager};
use crate::merge::{MergeReport, StreamingMerger};
use crate::output::progress::ProgressSink;
use crate::password::{PasswordManager, default_dictionary};
use crate::recovery::{MemoryMonitor, MemoryProbe, ProcessMemory, RecoveryOrchestrator, RetryController};

pub use jobs::{JobStatus, MergeJob, ValidationJob};

const PREFLIGHT_CONCURRENCY: usize = 8;

/// Engine plus retry, recovery, output naming and rollback.
pub struct ResilientService {
    discovery: Discovery,
    config: Config,
    collector: Arc<ErrorCollector>,
    retry: RetryController,
    orchestrator: Arc<RecoveryOrchestrator>,
    resolver: OutputResolver,
    rollback: RollbackManager,
    passwords: Arc<PasswordManager>,
    decryptor: Option<Decryptor>,
    merger: Option<StreamingMerger>,
}

impl ResilientService {
    /// Service measuring the memory of the current process.
    pub fn new(discovery: Discovery, config: Config) -> Self {
        Self::with_probe(discovery, config, Arc::new(ProcessMemory))
    }

    /// Service measuring memory through `probe`.
    pub fn with_probe(discovery: Discovery, config: Config, probe: Arc<dyn MemoryProbe>) -> Self {
        let collector = Arc::new(ErrorCollector::new());
        let retry = RetryController::new(config.retry.clone()).with_collector(Arc::clone(&collector));
        let orchestrator = Arc::new(RecoveryOrchestrator::new(
            config.retry.clone(),
            MemoryMonitor::new(config.memory.clone(), probe),
            Arc::clone(&collector),
        ));
        let passwords = Arc::new(PasswordManager::with_dictionary(default_dictionary()));

        let decryptor = discovery.engine.as_ref().map(|engine| {
            Decryptor::new(Arc::clone(engine), Arc::clone(&passwords), config.decrypt.clone())
        });
        let merger = discovery.engine.as_ref().map(|engine| {
            StreamingMerger::new(Arc::clone(engine), Arc::clone(&orchestrator), &config.merge)
        });

        Self {
            resolver: OutputResolver::new(config.output.clone()),
            rollback: RollbackManager::new(),
            discovery,
            config,
            collector,
            retry,
            orchestrator,
            passwords,
            decryptor,
            merger,
        }
    }

    /// Replace the pause the orchestrator adds after IO failures.
    pub fn with_io_pause(mut self, pause: std::time::Duration) -> Self {
        let orchestrator = Arc::new((*self.orchestrator).clone().with_io_pause(pause));
        self.merger = self.discovery.engine.as_ref().map(|engine| {
            StreamingMerger::new(Arc::clone(engine), Arc::clone(&orchestrator), &self.config.merge)
        });
        self.orchestrator = orchestrator;
        self
    }

    /// Engine state captured at discovery.
    pub fn availability(&self) -> &EngineAvailability {
        &self.discovery.availability
    }

    /// The discovered engine, if any.
    pub fn engine(&self) -> Option<&Arc<dyn PdfEngine>> {
        self.discovery.engine.as_ref()
    }

    /// Version of the engine in use.
    pub fn engine_version(&self) -> Option<&str> {
        self.discovery.version()
    }

    /// Settings the service was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Every error seen by retries and recoveries.
    pub fn collector(&self) -> &Arc<ErrorCollector> {
        &self.collector
    }

    /// Password cache shared with the decryptor.
    pub fn passwords(&self) -> &Arc<PasswordManager> {
        &self.passwords
    }

    /// Output resolver applied to write destinations.
    pub fn resolver(&self) -> &OutputResolver {
        &self.resolver
    }

    fn inspect_engine(&self) -> Result<&Arc<dyn PdfEngine>> {
        self.discovery
            .engine
            .as_ref()
            .ok_or_else(|| PdfOpsError::invalid_file(self.unavailable_reason()))
    }

    fn unavailable_for_write(&self) -> PdfOpsError {
        PdfOpsError::processing(self.unavailable_reason())
    }

    fn unavailable_reason(&self) -> String {
        match &self.discovery.availability {
            EngineAvailability::Unavailable { reason } => format!("no PDF engine available: {reason}"),
            _ => "no PDF engine available".to_string(),
        }
    }

    /// Check that `path` is a well-formed PDF.
    #[instrument(skip(self, cancel), fields(path = %path.display()))]
    pub async fn validate(&self, path: &Path, cancel: &CancelToken) -> Result<()> {
        let engine = self.inspect_engine()?;
        check_readable(path).await?;
        self.retry.execute(move || engine.validate(path), cancel).await
    }

    /// Information record of `path`.
    #[instrument(skip(self, cancel), fields(path = %path.display()))]
    pub async fn info(&self, path: &Path, cancel: &CancelToken) -> Result<PdfInfo> {
        let engine = self.inspect_engine()?;
        check_readable(path).await?;
        self.retry.execute(move || engine.info(path), cancel).await
    }

    /// Whether `path` is encrypted. Uses the engine when there is one and
    /// the raw-byte scan otherwise.
    pub async fn is_encrypted(&self, path: &Path, cancel: &CancelToken) -> Result<bool> {
        check_readable(path).await?;
        match &self.discovery.engine {
            Some(engine) => self.retry.execute(move || engine.is_encrypted(path), cancel).await,
            None => quick_encryption_scan(path).await,
        }
    }

    /// Decrypt `path` with the cached password or the `dictionary`.
    ///
    /// With `output`, the readable result is copied to the resolved
    /// destination; without it, the decrypted copy stays in the temp
    /// directory until [`cleanup`](Self::cleanup).
    #[instrument(skip_all, fields(path = %path.display()))]
    pub async fn decrypt(
        &self,
        path: &Path,
        output: Option<&str>,
        dictionary: &[String],
        progress: Option<&dyn ProgressSink>,
        cancel: &CancelToken,
    ) -> Result<DecryptOutcome> {
        let decryptor = self.decryptor.as_ref().ok_or_else(|| self.unavailable_for_write())?;
        check_readable(path).await?;

        let mut outcome = self
            .orchestrator
            .run(|| decryptor.decrypt_file(path, dictionary, progress, cancel), cancel)
            .await?;

        if let Some(requested) = output {
            let dest = self.resolver.resolve(requested)?;
            let src = outcome.path.clone();
            self.write_protected(&dest, || async {
                tokio::fs::copy(&src, &dest)
                    .await
                    .map(|_| ())
                    .map_err(|e| PdfOpsError::from(e).with_path(&dest))
            })
            .await?;
            outcome.path = dest;
            outcome.is_original = false;
        }

        info!(output = %outcome.path.display(), attempts = outcome.attempts, "decrypt completed");
        Ok(outcome)
    }

    /// Merge `inputs`, in order, into the resolved `output`.
    #[instrument(skip_all, fields(inputs = inputs.len()))]
    pub async fn merge(
        &self,
        inputs: &[PathBuf],
        output: &str,
        progress: Option<&dyn ProgressSink>,
        cancel: &CancelToken,
    ) -> Result<MergeReport> {
        let merger = self.merger.as_ref().ok_or_else(|| self.unavailable_for_write())?;
        if inputs.is_empty() {
            return Err(PdfOpsError::invalid_file("no files to merge"));
        }
        check_all_readable(inputs).await?;

        let dest = self.resolver.resolve(output)?;
        self.write_protected(&dest, || merger.merge(inputs, &dest, progress, cancel))
            .await
    }

    /// Validate every path. One job per path, in order; failures are
    /// recorded on the job and do not stop the sweep.
    ///
    /// # Errors
    ///
    /// InvalidInput if a job refuses a lifecycle transition.
    pub async fn validate_many(&self, paths: &[PathBuf], cancel: &CancelToken) -> Result<Vec<ValidationJob>> {
        let mut jobs: Vec<ValidationJob> = paths.iter().map(ValidationJob::new).collect();
        for job in &mut jobs {
            job.start()?;
            match self.validate(job.path(), cancel).await {
                Ok(()) => job.complete()?,
                Err(err) => {
                    warn!(path = %job.path().display(), error = %err, "validation failed");
                    job.fail(err)?;
                }
            }
        }
        Ok(jobs)
    }

    /// Run every pending job in order. Returns how many completed.
    ///
    /// # Errors
    ///
    /// InvalidInput if a job is not pending; nothing is run in that case.
    pub async fn merge_many(&self, jobs: &mut [MergeJob], cancel: &CancelToken) -> Result<usize> {
        if let Some(job) = jobs.iter().find(|j| j.status() != JobStatus::Pending) {
            return Err(PdfOpsError::invalid_input(format!(
                "job {} is already {}",
                job.id(),
                job.status()
            )));
        }

        let mut completed = 0;
        for job in jobs.iter_mut() {
            job.start()?;
            match self.merge(job.inputs(), job.output(), None, cancel).await {
                Ok(report) => {
                    job.complete(report)?;
                    completed += 1;
                }
                Err(err) => {
                    warn!(job = job.id(), error = %err, "merge job failed");
                    job.fail(err)?;
                }
            }
        }
        Ok(completed)
    }

    /// Delete decrypted temp copies. Returns how many were removed.
    pub async fn cleanup(&self) -> usize {
        match &self.decryptor {
            Some(decryptor) => decryptor.cleanup().await,
            None => 0,
        }
    }

    async fn write_protected<T, F, Fut>(&self, dest: &Path, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        safe_output_operation(dest, || async {
            if self.config.output.backup_existing && tokio::fs::try_exists(dest).await.unwrap_or(false) {
                self.rollback.with_rollback(dest, op).await
            } else {
                op().await
            }
        })
        .await
    }
}

/// Pre-flight check of every input. Checks overlap, but the first failing
/// input in list order is the one reported.
async fn check_all_readable(inputs: &[PathBuf]) -> Result<()> {
    stream::iter(inputs.iter().map(|path| check_readable(path)))
        .buffered(PREFLIGHT_CONCURRENCY)
        .try_collect::<Vec<()>>()
        .await
        .map(|_| ())
}

impl std::fmt::Debug for ResilientService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientService")
            .field("discovery", &self.discovery)
            .field("errors", &self.collector.len())
            .finish_non_exhaustive()
    }
}
