//! Output path resolution.
//!
//! Resolution applies, in order: the default file name for an empty request,
//! the base directory for relative paths, the `.pdf` extension check, the
//! optional `_YYYYMMDD_HHMMSS` suffix, and finally the auto-increment policy
//! (`stem_1.pdf`, `stem_2.pdf`, ...) when the target already exists.
//!
//! Resolving an already-resolved path that still does not exist returns it
//! unchanged.

use chrono::{DateTime, Local};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::config::OutputConfig;
use crate::error::{PdfOpsError, Result};

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Applies an [`OutputConfig`] to caller-supplied output paths.
#[derive(Debug, Clone)]
pub struct OutputResolver {
    config: OutputConfig,
}

impl OutputResolver {
    /// Create a resolver.
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    /// Settings in use.
    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    /// Resolve `requested` using the current local time for timestamps.
    pub fn resolve(&self, requested: &str) -> Result<PathBuf> {
        self.resolve_at(requested, Local::now())
    }

    /// Resolve `requested`, timestamping with `now`.
    ///
    /// # Errors
    ///
    /// Returns InvalidInput if the extension is not `.pdf`.
    pub fn resolve_at(&self, requested: &str, now: DateTime<Local>) -> Result<PathBuf> {
        let requested = requested.trim();
        let name = if requested.is_empty() {
            self.config.default_file_name.as_str()
        } else {
            requested
        };

        let mut path = self.anchor(Path::new(name));
        validate_extension(&path)?;

        if self.config.timestamp {
            path = with_timestamp(&path, now);
        }

        if self.config.auto_increment && path.exists() {
            path = next_free(&path);
        }

        debug!(requested = name, resolved = %path.display(), "resolved output path");
        Ok(path)
    }

    /// Default output for `inputs`: `<first stem>_<suffix>.pdf` in the base
    /// directory, or the default file name when there are no inputs.
    pub fn suggested_path(&self, inputs: &[PathBuf], suffix: &str) -> PathBuf {
        let name = inputs
            .first()
            .and_then(|first| first.file_stem())
            .map(|stem| format!("{}_{suffix}.pdf", stem.to_string_lossy()))
            .unwrap_or_else(|| self.config.default_file_name.clone());
        self.anchor(Path::new(&name))
    }

    fn anchor(&self, path: &Path) -> PathBuf {
        let base = normalize(&self.config.base_dir);
        let path = normalize(path);
        if path.is_absolute() || base.as_os_str().is_empty() || path.starts_with(&base) {
            path
        } else {
            base.join(path)
        }
    }
}

/// Refuse any extension other than `.pdf` (case-insensitive).
pub fn validate_extension(path: &Path) -> Result<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("pdf") => Ok(()),
        _ => Err(PdfOpsError::invalid_input("output file must have a .pdf extension").with_path(path)),
    }
}

/// Create the parent directory of `path` if it is missing.
pub async fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| PdfOpsError::from(e).with_path(parent)),
        None => Ok(()),
    }
}

/// Drop `.` components so equal paths compare equal.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

fn split_name(path: &Path) -> (String, String) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "pdf".to_string());
    (stem, ext)
}

fn has_timestamp_suffix(stem: &str) -> bool {
    if ends_with_timestamp(stem) {
        return true;
    }
    // An auto-increment counter may follow the stamp: `_<TS>_<N>`.
    match stem.rsplit_once('_') {
        Some((head, counter)) if !counter.is_empty() && counter.bytes().all(|b| b.is_ascii_digit()) => {
            ends_with_timestamp(head)
        }
        _ => false,
    }
}

fn ends_with_timestamp(stem: &str) -> bool {
    // _YYYYMMDD_HHMMSS
    let bytes = stem.as_bytes();
    if bytes.len() < 16 {
        return false;
    }
    let tail = &bytes[bytes.len() - 16..];
    tail[0] == b'_'
        && tail[9] == b'_'
        && tail[1..9].iter().all(u8::is_ascii_digit)
        && tail[10..].iter().all(u8::is_ascii_digit)
}

fn with_timestamp(path: &Path, now: DateTime<Local>) -> PathBuf {
    let (stem, ext) = split_name(path);
    if has_timestamp_suffix(&stem) {
        return path.to_path_buf();
    }
    path.with_file_name(format!("{stem}_{}.{ext}", now.format(TIMESTAMP_FORMAT)))
}

fn next_free(path: &Path) -> PathBuf {
    let (stem, ext) = split_name(path);
    (1u32..)
        .map(|n| path.with_file_name(format!("{stem}_{n}.{ext}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| path.to_path_buf())
}
