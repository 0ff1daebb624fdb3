//! A/B results file: a JSON object mapping test name to comparison.

use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use super::harness::Comparison;
use crate::error::{PdfOpsError, Result};

/// Write `results` as pretty-printed JSON, creating the parent directory.
pub async fn save_results(path: &Path, results: &BTreeMap<String, Comparison>) -> Result<()> {
    crate::io::ensure_parent_dir(path).await?;
    let json = serde_json::to_string_pretty(results)?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| PdfOpsError::from(e).with_path(path))?;
    debug!(path = %path.display(), count = results.len(), "results saved");
    Ok(())
}

/// Read a results file. A missing file is an empty result set.
///
/// # Errors
///
/// Processing when the file is not a valid results document.
pub async fn load_results(path: &Path) -> Result<BTreeMap<String, Comparison>> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(PdfOpsError::from(e).with_path(path)),
    };
    serde_json::from_str(&text).map_err(|e| PdfOpsError::from(e).with_path(path))
}
