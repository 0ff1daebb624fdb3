//! Output formatting and display for pdfops.
//!
//! This module handles all user-facing output including:
//! - Formatted status messages
//! - Progress lines for long-running operations
//! - Summaries of info records, merges and strength checks
//!
//! Log events go through `tracing`; nothing here is a log.
//!
//! # Examples
//!
//! ```no_run
//! use pdfops::output::OutputFormatter;
//! use pdfops::config::Config;
//!
//! # fn example(config: Config) {
//! let formatter = OutputFormatter::from_config(&config);
//! formatter.info("Starting merge operation");
//! formatter.success("Merge completed successfully");
//! # }
//! ```

pub mod formatter;
pub mod progress;

pub use formatter::{MessageLevel, OutputFormatter};
pub use progress::{LineSink, MemorySink, ProgressEvent, ProgressSink};

use crate::error::PdfOpsError;
use crate::info::{Permission, PdfInfo};
use crate::merge::MergeReport;
use crate::password::Strength;
use crate::service::ValidationJob;
use crate::utils::format_file_size;

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

/// Display an information record.
pub fn display_info(formatter: &OutputFormatter, info: &PdfInfo) {
    formatter.section(&info.path().display().to_string());
    formatter.field("Pages", &info.page_count().to_string());
    formatter.field("Size", &format_file_size(info.file_size()));
    formatter.field("PDF version", info.version());
    formatter.field("Encrypted", yes_no(info.is_encrypted()));

    if info.is_encrypted() {
        if let Some(method) = info.encryption_method() {
            formatter.field("Encryption method", method);
        }
        if let Some(bits) = info.key_length() {
            formatter.field("Key length", &format!("{bits} bits"));
        }
        formatter.field("User password", yes_no(info.has_user_password()));
        formatter.field("Owner password", yes_no(info.has_owner_password()));
    }

    let granted: Vec<&str> = Permission::ALL
        .into_iter()
        .filter(|p| info.flags().allows(*p))
        .map(Permission::as_str)
        .collect();
    formatter.field(
        "Permissions",
        &if granted.is_empty() { "none".to_string() } else { granted.join(", ") },
    );

    for (field, value) in info.metadata_fields() {
        formatter.detail(field.as_str(), value);
    }
}

/// Display the outcome of a validation sweep.
pub fn display_validation(formatter: &OutputFormatter, jobs: &[ValidationJob]) {
    let failed: Vec<&ValidationJob> = jobs.iter().filter(|j| !j.is_valid()).collect();

    for job in jobs.iter().filter(|j| j.is_valid()) {
        formatter.success(&format!("{}: valid", job.path().display()));
    }
    for job in &failed {
        if let Some(err) = job.error() {
            formatter.error(&format!("{}: {}", job.path().display(), err.user_message()));
            formatter.detail("Details", &err.detailed_message());
        }
    }

    if failed.is_empty() {
        formatter.info(&format!("Validated {} file(s)", jobs.len()));
    } else {
        formatter.warning(&format!(
            "{} of {} file(s) failed validation",
            failed.len(),
            jobs.len()
        ));
    }
}

/// Display a finished merge.
pub fn display_merge_report(formatter: &OutputFormatter, report: &MergeReport) {
    formatter.success(&format!("Successfully created {}", report.output.display()));
    formatter.detail("Engine calls", &report.engine_calls.to_string());
    formatter.detail("Batches", &report.batches.to_string());
}

/// Display a strength verdict.
pub fn display_strength(formatter: &OutputFormatter, strength: &Strength) {
    formatter.field("Score", &format!("{}/100", strength.score));
    formatter.field("Level", &strength.level.to_string());
    for (idx, suggestion) in strength.suggestions.iter().enumerate() {
        formatter.list_item(idx + 1, suggestion);
    }
}

/// Display an error with its user message and, in verbose mode, details.
pub fn display_error(formatter: &OutputFormatter, err: &PdfOpsError) {
    formatter.error(&format!("{}: {}", err.user_message(), err.message()));
    formatter.detail("Kind", err.kind().as_str());
    formatter.detail("Details", &err.detailed_message());
}
