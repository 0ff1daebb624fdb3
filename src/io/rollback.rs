//! Backup and restore around destination-mutating operations.
//!
//! A [`RollbackToken`] pairs a destination with a sibling backup copy named
//! `<stem>.backup_<YYYYMMDD_HHMMSS_micro>.<ext>`. Tokens are consumed by
//! either [`RollbackManager::discard`] or [`RollbackManager::restore`].

use chrono::Local;
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

use crate::error::{PdfOpsError, Result};

/// Snapshot of a destination taken before it is overwritten.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a token must be restored or discarded"]
pub struct RollbackToken {
    backup: PathBuf,
    original: PathBuf,
}

impl RollbackToken {
    /// Backup copy.
    pub fn backup_path(&self) -> &Path {
        &self.backup
    }

    /// Destination the backup belongs to.
    pub fn original_path(&self) -> &Path {
        &self.original
    }
}

/// Creates and consumes [`RollbackToken`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct RollbackManager;

impl RollbackManager {
    /// Create a manager.
    pub fn new() -> Self {
        Self
    }

    /// Copy `path` verbatim into a fresh sibling backup.
    ///
    /// # Errors
    ///
    /// IO when `path` does not exist or the copy fails.
    pub async fn backup(&self, path: &Path) -> Result<RollbackToken> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(PdfOpsError::io("cannot back up a file that does not exist").with_path(path));
        }

        let backup = backup_path_for(path);
        tokio::fs::copy(path, &backup)
            .await
            .map_err(|e| PdfOpsError::io(format!("backup failed: {e}")).with_path(path).with_source(e))?;

        debug!(original = %path.display(), backup = %backup.display(), "backup created");
        Ok(RollbackToken {
            backup,
            original: path.to_path_buf(),
        })
    }

    /// Put the backup back over the destination and delete it.
    pub async fn restore(&self, token: RollbackToken) -> Result<()> {
        tokio::fs::rename(&token.backup, &token.original)
            .await
            .map_err(|e| {
                PdfOpsError::io(format!("restore failed: {e}"))
                    .with_path(&token.original)
                    .with_source(e)
            })?;
        warn!(path = %token.original.display(), "destination restored from backup");
        Ok(())
    }

    /// Delete the backup, keeping the destination as it is.
    pub async fn discard(&self, token: RollbackToken) -> Result<()> {
        match tokio::fs::remove_file(&token.backup).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PdfOpsError::from(e).with_path(&token.backup)),
        }
    }

    /// Back up `path`, run `op`, then discard the backup on success or
    /// restore it on failure.
    ///
    /// # Errors
    ///
    /// Fails before running `op` if `path` does not exist. Otherwise returns
    /// the error of `op`, after the destination has been restored.
    pub async fn with_rollback<T, F, Fut>(&self, path: &Path, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let token = self.backup(path).await?;

        match op().await {
            Ok(value) => {
                self.discard(token).await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(restore_err) = self.restore(token).await {
                    error!(error = %restore_err, "rollback failed");
                }
                Err(err)
            }
        }
    }
}

fn backup_path_for(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let stamp = Local::now().format("%Y%m%d_%H%M%S_%6f");

    let first = path.with_file_name(format!("{stem}.backup_{stamp}{ext}"));
    if !first.exists() {
        return first;
    }
    (1u32..)
        .map(|n| path.with_file_name(format!("{stem}.backup_{stamp}_{n}{ext}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}
