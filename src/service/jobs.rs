//! Jobs swept by the batch operations of the service.
//!
//! Each job moves `Pending -> Running -> Completed | Failed`. Terminal
//! states are set once; any other transition is refused with InvalidInput.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{PdfOpsError, Result};
use crate::merge::MergeReport;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Not reached by the sweep yet.
    #[default]
    Pending,
    /// Being processed.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
}

impl JobStatus {
    /// Whether the job has finished.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        })
    }
}

fn transition(status: &mut JobStatus, from: JobStatus, to: JobStatus, id: &str) -> Result<()> {
    if *status != from {
        return Err(PdfOpsError::invalid_input(format!(
            "job {id}: cannot move from {status} to {to}"
        )));
    }
    *status = to;
    Ok(())
}

/// One merge in a [`merge_many`](super::ResilientService::merge_many) sweep.
#[derive(Debug, Clone)]
pub struct MergeJob {
    id: String,
    inputs: Vec<PathBuf>,
    output: String,
    status: JobStatus,
    report: Option<MergeReport>,
    error: Option<PdfOpsError>,
}

impl MergeJob {
    /// Pending job merging `inputs` into the requested `output`.
    pub fn new(id: impl Into<String>, inputs: Vec<PathBuf>, output: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            inputs,
            output: output.into(),
            status: JobStatus::Pending,
            report: None,
            error: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn inputs(&self) -> &[PathBuf] {
        &self.inputs
    }

    /// Output as requested, before resolution.
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Report of a completed job.
    pub fn report(&self) -> Option<&MergeReport> {
        self.report.as_ref()
    }

    /// Error of a failed job.
    pub fn error(&self) -> Option<&PdfOpsError> {
        self.error.as_ref()
    }

    /// `Pending -> Running`.
    pub fn start(&mut self) -> Result<()> {
        transition(&mut self.status, JobStatus::Pending, JobStatus::Running, &self.id)
    }

    /// `Running -> Completed`.
    pub fn complete(&mut self, report: MergeReport) -> Result<()> {
        transition(&mut self.status, JobStatus::Running, JobStatus::Completed, &self.id)?;
        self.report = Some(report);
        Ok(())
    }

    /// `Running -> Failed`.
    pub fn fail(&mut self, error: PdfOpsError) -> Result<()> {
        transition(&mut self.status, JobStatus::Running, JobStatus::Failed, &self.id)?;
        self.error = Some(error);
        Ok(())
    }
}

/// One file in a [`validate_many`](super::ResilientService::validate_many)
/// sweep.
#[derive(Debug, Clone)]
pub struct ValidationJob {
    path: PathBuf,
    status: JobStatus,
    error: Option<PdfOpsError>,
}

impl ValidationJob {
    /// Pending job validating `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            status: JobStatus::Pending,
            error: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn error(&self) -> Option<&PdfOpsError> {
        self.error.as_ref()
    }

    /// Whether the file validated.
    pub fn is_valid(&self) -> bool {
        self.status == JobStatus::Completed
    }

    /// `Pending -> Running`.
    pub fn start(&mut self) -> Result<()> {
        let id = self.path.display().to_string();
        transition(&mut self.status, JobStatus::Pending, JobStatus::Running, &id)
    }

    /// `Running -> Completed`.
    pub fn complete(&mut self) -> Result<()> {
        let id = self.path.display().to_string();
        transition(&mut self.status, JobStatus::Running, JobStatus::Completed, &id)
    }

    /// `Running -> Failed`.
    pub fn fail(&mut self, error: PdfOpsError) -> Result<()> {
        let id = self.path.display().to_string();
        transition(&mut self.status, JobStatus::Running, JobStatus::Failed, &id)?;
        self.error = Some(error);
        Ok(())
    }
}
