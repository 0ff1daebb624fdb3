//! JSON persistence for the password cache.
//!
//! The file is a single JSON object mapping path hashes to passwords. It is
//! trusted but optional: a missing or unreadable file loads as empty.

use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

use crate::error::{PdfOpsError, Result};

/// Load a cache file. Missing or corrupt files yield an empty map.
pub async fn load_cache(path: &Path) -> BTreeMap<String, String> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) => {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %err, "cannot read password cache");
            }
            return BTreeMap::new();
        }
    };

    serde_json::from_slice(&bytes).unwrap_or_else(|err| {
        warn!(path = %path.display(), error = %err, "discarding corrupt password cache");
        BTreeMap::new()
    })
}

/// Write `entries` to `path`, creating the parent directory if needed.
pub async fn save_cache(path: &Path, entries: &BTreeMap<String, String>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| PdfOpsError::from(e).with_path(parent))?;
    }

    let json = serde_json::to_vec_pretty(entries)?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| PdfOpsError::from(e).with_path(path))
}
