//! Error types for pdfops.
//!
//! Every failure in the crate is a [`PdfOpsError`] tagged with one of nine
//! [`ErrorKind`]s. The kind alone decides whether the retry machinery may try
//! again ([`ErrorKind::is_retryable`]) and how loudly the failure should be
//! reported ([`ErrorKind::severity`]).
//!
//! # Error Categories
//!
//! - **Retryable**: [`ErrorKind::Memory`] and [`ErrorKind::Io`]
//! - **Terminal**: everything else, including [`ErrorKind::Encrypted`] outside
//!   of the password loop
//!
//! Raw engine failures arrive as free text and are mapped onto a kind by
//! [`classify_message`].

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result type alias for pdfops operations.
pub type Result<T> = std::result::Result<T, PdfOpsError>;

/// Shared, clonable error cause.
pub type ErrorSource = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Kind of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The file is missing, not a PDF, or otherwise unusable as input.
    InvalidFile,
    /// The file is encrypted, or the supplied password is wrong.
    Encrypted,
    /// The file is structurally damaged.
    Corrupted,
    /// Access to the file or directory was denied.
    Permission,
    /// The process is over its memory budget.
    Memory,
    /// Transient I/O failure, including cancellation and timeouts.
    Io,
    /// The document failed validation.
    Validation,
    /// The engine failed for an unclassified reason.
    Processing,
    /// The caller passed an unusable argument.
    InvalidInput,
}

/// How serious a failure is for reporting purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Expected during normal use (bad input, wrong password).
    Low,
    /// Needs attention but the process is healthy.
    Medium,
    /// The environment is in trouble.
    High,
}

impl ErrorKind {
    /// All kinds, in declaration order.
    pub const ALL: [ErrorKind; 9] = [
        Self::InvalidFile,
        Self::Encrypted,
        Self::Corrupted,
        Self::Permission,
        Self::Memory,
        Self::Io,
        Self::Validation,
        Self::Processing,
        Self::InvalidInput,
    ];

    /// Whether an operation that failed with this kind may be attempted again.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Memory | Self::Io)
    }

    /// Reporting severity of this kind.
    pub fn severity(self) -> Severity {
        match self {
            Self::Memory | Self::Io => Severity::High,
            Self::Permission | Self::Corrupted | Self::Processing => Severity::Medium,
            Self::InvalidFile | Self::Encrypted | Self::Validation | Self::InvalidInput => {
                Severity::Low
            }
        }
    }

    /// Stable lowercase identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidFile => "invalid_file",
            Self::Encrypted => "encrypted",
            Self::Corrupted => "corrupted",
            Self::Permission => "permission",
            Self::Memory => "memory",
            Self::Io => "io",
            Self::Validation => "validation",
            Self::Processing => "processing",
            Self::InvalidInput => "invalid_input",
        }
    }

    /// Message suitable for showing to an end user.
    ///
    /// The text does not depend on the failing file; callers that need the
    /// file context use [`PdfOpsError::detailed_message`].
    pub fn user_message(self) -> &'static str {
        match self {
            Self::InvalidFile => "The file is not a valid PDF document",
            Self::Encrypted => "The PDF is password protected",
            Self::Corrupted => "The PDF file is damaged and cannot be read",
            Self::Permission => "Access to the file was denied",
            Self::Memory => "Not enough memory to complete the operation",
            Self::Io => "A file system error occurred",
            Self::Validation => "The PDF failed validation",
            Self::Processing => "The PDF could not be processed",
            Self::InvalidInput => "The request contained invalid arguments",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => f.write_str("low"),
            Self::Medium => f.write_str("medium"),
            Self::High => f.write_str("high"),
        }
    }
}

/// Why an operation was stopped before completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// The caller cancelled through a [`crate::cancel::CancelToken`].
    Cancelled,
    /// The overall operation deadline elapsed.
    Timeout,
}

/// Main error type for pdfops operations.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}{}", fmt_path(.path))]
pub struct PdfOpsError {
    kind: ErrorKind,
    message: String,
    path: Option<PathBuf>,
    cancellation: Option<CancelReason>,
    #[source]
    source: Option<ErrorSource>,
}

fn fmt_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" ({})", path.display()),
        None => String::new(),
    }
}

impl PdfOpsError {
    /// Create an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            path: None,
            cancellation: None,
            source: None,
        }
    }

    /// Create an InvalidFile error.
    pub fn invalid_file(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidFile, message)
    }

    /// Create an Encrypted error.
    pub fn encrypted(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Encrypted, message)
    }

    /// Create a Corrupted error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Corrupted, message)
    }

    /// Create a Permission error.
    pub fn permission(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permission, message)
    }

    /// Create a Memory error.
    pub fn memory(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Memory, message)
    }

    /// Create an IO error.
    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    /// Create a Validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create a Processing error.
    pub fn processing(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Processing, message)
    }

    /// Create an InvalidInput error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    /// IO error raised when an operation is stopped early.
    pub fn cancelled(reason: CancelReason) -> Self {
        let message = match reason {
            CancelReason::Cancelled => "operation cancelled",
            CancelReason::Timeout => "operation timed out",
        };
        let mut err = Self::io(message);
        err.cancellation = Some(reason);
        err
    }

    /// Wrap a raw engine failure, classifying it by its text.
    pub fn from_engine(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(classify_message(&message), message)
    }

    /// Attach the file this error is about.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Attach the underlying cause.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    /// Kind of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Raw message, without the path.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// File this error is about, if known.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Cancellation cause, if this error reports a cancelled operation.
    pub fn cancellation(&self) -> Option<CancelReason> {
        self.cancellation
    }

    /// Whether this error reports a cancellation or a timeout.
    pub fn is_cancellation(&self) -> bool {
        self.cancellation.is_some()
    }

    /// Whether the operation may be attempted again.
    ///
    /// Cancellations are never retried even though they are IO-kinded.
    pub fn is_retryable(&self) -> bool {
        self.cancellation.is_none() && self.kind.is_retryable()
    }

    /// Reporting severity.
    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    /// End-user message for this error's kind.
    pub fn user_message(&self) -> &'static str {
        self.kind.user_message()
    }

    /// User message followed by the file and the technical reason.
    pub fn detailed_message(&self) -> String {
        let mut out = self.user_message().to_string();
        if let Some(path) = &self.path {
            out.push_str(&format!("\n  File: {}", path.display()));
        }
        out.push_str(&format!("\n  Reason: {}", self.message));
        out
    }

    /// Underlying cause, if any.
    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        if self.cancellation == Some(CancelReason::Cancelled) {
            return 130; // Standard exit code for SIGINT
        }
        match self.kind {
            ErrorKind::InvalidInput => 1,
            ErrorKind::InvalidFile => 2,
            ErrorKind::Encrypted | ErrorKind::Corrupted | ErrorKind::Validation => 3,
            ErrorKind::Permission => 4,
            ErrorKind::Io => 5,
            ErrorKind::Processing => 6,
            ErrorKind::Memory => 7,
        }
    }
}

impl From<io::Error> for PdfOpsError {
    fn from(err: io::Error) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::PermissionDenied => ErrorKind::Permission,
            _ => ErrorKind::Io,
        };
        Self::new(kind, err.to_string()).with_source(err)
    }
}

impl From<lopdf::Error> for PdfOpsError {
    fn from(err: lopdf::Error) -> Self {
        Self::from_engine(err.to_string()).with_source(err)
    }
}

impl From<serde_json::Error> for PdfOpsError {
    fn from(err: serde_json::Error) -> Self {
        Self::processing(format!("JSON error: {err}")).with_source(err)
    }
}

/// Map free-form engine output onto an error kind.
///
/// The checks run in order, so a message mentioning both a password and a
/// missing file is reported as [`ErrorKind::Encrypted`].
pub fn classify_message(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(&["encrypt", "password", "decrypt"]) {
        ErrorKind::Encrypted
    } else if has(&["permission", "access denied", "access is denied", "not permitted"]) {
        ErrorKind::Permission
    } else if has(&[
        "no such file",
        "not found",
        "does not exist",
        "i/o error",
        "io error",
        "broken pipe",
        "disk full",
        "no space left",
    ]) {
        ErrorKind::Io
    } else if has(&[
        "corrupt",
        "malformed",
        "invalid",
        "xref",
        "unexpected end",
        "unexpected eof",
        "parse",
        "syntax",
        "header",
        "trailer",
    ]) {
        ErrorKind::Corrupted
    } else {
        ErrorKind::Processing
    }
}

/// Thread-safe, insertion-ordered accumulator of errors.
///
/// Used to keep every failure seen across retries for post-hoc diagnostics
/// while only the final one is returned to the caller.
#[derive(Debug, Default)]
pub struct ErrorCollector {
    errors: Mutex<Vec<PdfOpsError>>,
}

impl ErrorCollector {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error. `None` is ignored.
    pub fn add(&self, err: Option<PdfOpsError>) {
        if let Some(err) = err {
            self.errors.lock().push(err);
        }
    }

    /// Record an error.
    pub fn push(&self, err: PdfOpsError) {
        self.errors.lock().push(err);
    }

    /// Number of recorded errors.
    pub fn len(&self) -> usize {
        self.errors.lock().len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.errors.lock().is_empty()
    }

    /// Snapshot of the recorded errors, oldest first.
    pub fn errors(&self) -> Vec<PdfOpsError> {
        self.errors.lock().clone()
    }

    /// Number of recorded errors of the given kind.
    pub fn count_kind(&self, kind: ErrorKind) -> usize {
        self.errors.lock().iter().filter(|e| e.kind() == kind).count()
    }

    /// Multi-line summary of everything recorded.
    pub fn summary(&self) -> String {
        let errors = self.errors.lock();
        if errors.is_empty() {
            return "No errors".to_string();
        }

        let mut out = format!("{} error(s) collected:", errors.len());
        for (idx, err) in errors.iter().enumerate() {
            out.push_str(&format!("\n  {}. [{}] {}", idx + 1, err.severity(), err));
        }
        out
    }

    /// Forget every recorded error.
    pub fn clear(&self) {
        self.errors.lock().clear();
    }
}
