//! Batched merging of long input lists.
//!
//! [`StreamingMerger`] executes a [`MergePlan`]: chunk merges into batch
//! files, then one final merge over the batch files. Every engine call runs
//! under the [`RecoveryOrchestrator`]. Batch files never outlive the call:
//! they are deleted after the final merge whether it worked or not, and all
//! of them are deleted as soon as one chunk fails.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::plan::{BatchStep, MergePlan};
use crate::cancel::CancelToken;
use crate::config::MergeConfig;
use crate::engine::PdfEngine;
use crate::error::Result;
use crate::output::progress::{ProgressEvent, ProgressSink};
use crate::recovery::RecoveryOrchestrator;

/// What a completed merge did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    /// Final output.
    pub output: PathBuf,
    /// Intermediate batch files produced (and deleted).
    pub batches: usize,
    /// Merge calls in the executed plan, not counting retries.
    pub engine_calls: usize,
}

/// Merges any number of inputs in bounded engine calls.
pub struct StreamingMerger {
    engine: Arc<dyn PdfEngine>,
    orchestrator: Arc<RecoveryOrchestrator>,
    batch_size: usize,
}

impl StreamingMerger {
    /// Create a merger.
    pub fn new(
        engine: Arc<dyn PdfEngine>,
        orchestrator: Arc<RecoveryOrchestrator>,
        config: &MergeConfig,
    ) -> Self {
        Self {
            engine,
            orchestrator,
            batch_size: config.batch_size,
        }
    }

    /// Override the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Inputs handed to the engine per call at most.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Merge `inputs`, in order, into `output`.
    ///
    /// # Errors
    ///
    /// InvalidFile for an empty input list, a cancellation error if `cancel`
    /// fires before a chunk starts, otherwise the failing engine call's error
    /// after retries.
    #[instrument(skip_all, fields(inputs = inputs.len(), output = %output.display()))]
    pub async fn merge(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        progress: Option<&dyn ProgressSink>,
        cancel: &CancelToken,
    ) -> Result<MergeReport> {
        let plan = MergePlan::build(inputs, output, self.batch_size)?;
        let engine_calls = plan.engine_calls();
        let batches = plan.batch_count();

        match &plan {
            MergePlan::Direct { inputs, output } => {
                cancel.check()?;
                report_final(progress, inputs.len(), output);
                self.engine_merge(inputs, output, cancel).await?;
            }
            MergePlan::Batched {
                batches: steps,
                final_inputs,
                output,
            } => {
                self.run_batches(steps, progress, cancel).await?;

                let result = match cancel.check() {
                    Ok(()) => {
                        report_final(progress, final_inputs.len(), output);
                        self.engine_merge(final_inputs, output, cancel).await
                    }
                    Err(err) => Err(err),
                };
                remove_batches(final_inputs).await;
                result?;
            }
        }

        info!(batches, engine_calls, "merge completed");
        Ok(MergeReport {
            output: plan.output().to_path_buf(),
            batches,
            engine_calls,
        })
    }

    async fn run_batches(
        &self,
        steps: &[BatchStep],
        progress: Option<&dyn ProgressSink>,
        cancel: &CancelToken,
    ) -> Result<()> {
        let total = steps.len();

        for (done, step) in steps.iter().enumerate() {
            let result = match cancel.check() {
                Ok(()) => {
                    if let Some(sink) = progress {
                        sink.report(&ProgressEvent::MergeBatch {
                            index: step.index,
                            total,
                            output: &step.output,
                        });
                    }
                    debug!(index = step.index, inputs = step.inputs.len(), "merging batch");
                    self.engine_merge(&step.inputs, &step.output, cancel).await
                }
                Err(err) => Err(err),
            };

            if let Err(err) = result {
                warn!(index = step.index, error = %err, "batch failed, removing intermediates");
                // Includes the failing chunk's output in case the engine left one.
                let produced: Vec<PathBuf> = steps[..=done].iter().map(|s| s.output.clone()).collect();
                remove_batches(&produced).await;
                return Err(err);
            }
        }

        Ok(())
    }

    async fn engine_merge(&self, inputs: &[PathBuf], output: &Path, cancel: &CancelToken) -> Result<()> {
        let engine = &self.engine;
        self.orchestrator
            .run(move || engine.merge(inputs, output), cancel)
            .await
    }
}

fn report_final(progress: Option<&dyn ProgressSink>, inputs: usize, output: &Path) {
    if let Some(sink) = progress {
        sink.report(&ProgressEvent::FinalMerge { inputs, output });
    }
}

async fn remove_batches(paths: &[PathBuf]) {
    for path in paths {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!(path = %path.display(), "removed batch file"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(path = %path.display(), error = %err, "cannot remove batch file"),
        }
    }
}
