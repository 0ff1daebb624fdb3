//! Pre-flight checks for file operations.
//!
//! Both helpers fail early with a typed error that carries the offending
//! path, so a caller never has to decode an engine message to learn that a
//! file was missing or a directory read-only.

use std::future::Future;
use std::io::ErrorKind as IoKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{PdfOpsError, Result};

/// Name of the file written to probe directory writability.
pub const WRITE_PROBE_NAME: &str = ".pdfops_write_probe";

/// Check that `path` is an existing, readable regular file, then run `op`.
///
/// # Errors
///
/// InvalidFile when the path is missing or not a file, Permission when it
/// cannot be read, otherwise whatever `op` returns.
pub async fn robust_file_operation<T, F, Fut>(path: &Path, op: F) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    check_readable(path).await?;
    op().await
}

/// Make sure the directory of `path` exists and is writable, then run `op`.
///
/// # Errors
///
/// Permission when the directory cannot be created or written, IO for
/// other filesystem failures, otherwise whatever `op` returns.
pub async fn safe_output_operation<T, F, Fut>(path: &Path, op: F) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let dir = output_dir(path);
    create_dir(&dir).await?;
    probe_writable(&dir).await?;
    op().await
}

pub(crate) async fn check_readable(path: &Path) -> Result<()> {
    let metadata = tokio::fs::metadata(path).await.map_err(|e| match e.kind() {
        IoKind::NotFound => PdfOpsError::invalid_file("file not found").with_path(path),
        IoKind::PermissionDenied => {
            PdfOpsError::permission("cannot access file").with_path(path).with_source(e)
        }
        _ => PdfOpsError::from(e).with_path(path),
    })?;

    if !metadata.is_file() {
        return Err(PdfOpsError::invalid_file("not a regular file").with_path(path));
    }

    tokio::fs::File::open(path).await.map_err(|e| match e.kind() {
        IoKind::PermissionDenied => {
            PdfOpsError::permission("file is not readable").with_path(path).with_source(e)
        }
        _ => PdfOpsError::from(e).with_path(path),
    })?;

    Ok(())
}

fn output_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

async fn create_dir(dir: &Path) -> Result<()> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o755);

    builder
        .create(dir)
        .await
        .map_err(|e| PdfOpsError::from(e).with_path(dir))
}

async fn probe_writable(dir: &Path) -> Result<()> {
    let probe = dir.join(WRITE_PROBE_NAME);
    tokio::fs::write(&probe, b"")
        .await
        .map_err(|e| match e.kind() {
            IoKind::PermissionDenied | IoKind::ReadOnlyFilesystem => {
                PdfOpsError::permission("output directory is not writable")
                    .with_path(dir)
                    .with_source(e)
            }
            _ => PdfOpsError::from(e).with_path(dir),
        })?;

    if let Err(e) = tokio::fs::remove_file(&probe).await {
        debug!(path = %probe.display(), error = %e, "cannot remove write probe");
    }
    Ok(())
}
