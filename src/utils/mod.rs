//! Small shared helpers: input glob expansion and size formatting.

use crate::error::{PdfOpsError, Result};
use std::path::PathBuf;

/// Expand multiple glob patterns into filesystem paths.
///
/// Accepts anything iterable with items that convert to `&str`, e.g.:
/// `&[&str]`, `Vec<String>`, or `Vec<&str>`.
///
/// A pattern without glob metacharacters that matches nothing is kept
/// verbatim so the caller reports the missing file with its real name.
/// Order of the patterns is preserved; matches of one pattern are sorted.
pub fn collect_paths_for_patterns<T>(patterns: T) -> Result<Vec<PathBuf>>
where
    T: IntoIterator,
    T::Item: AsRef<str>,
{
    let mut resolved_paths = Vec::new();

    for pattern in patterns.into_iter() {
        let paths = collect_paths_for_pattern(pattern.as_ref())?;
        resolved_paths.extend(paths);
    }

    Ok(resolved_paths)
}

/// Expand a single glob pattern into filesystem paths.
///
/// Pattern examples:
/// - `"**/*.pdf"`
/// - `"./docs/*.pdf"`
fn collect_paths_for_pattern(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths = glob::glob(pattern)
        .map_err(|err| PdfOpsError::invalid_input(format!("Invalid pattern '{pattern}': {err}")))?;

    let mut resolved_paths = Vec::new();
    for entry in paths {
        let path = entry.map_err(|err| {
            let path = err.path().to_path_buf();
            PdfOpsError::from(err.into_error()).with_path(path)
        })?;
        resolved_paths.push(path);
    }

    if resolved_paths.is_empty() && !has_glob_meta(pattern) {
        resolved_paths.push(PathBuf::from(pattern));
    }

    Ok(resolved_paths)
}

fn has_glob_meta(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// Format file size as human-readable string.
pub fn format_file_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{size} bytes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(100), "100 bytes");
        assert_eq!(format_file_size(1024), "1.00 KB");
        assert_eq!(format_file_size(1024 * 1024), "1.00 MB");
        assert_eq!(format_file_size(1536 * 1024), "1.50 MB");
    }

    #[test]
    fn test_collect_paths_expands_globs() {
        let dir = TempDir::new().unwrap();
        for name in ["b.pdf", "a.pdf", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let pattern = format!("{}/*.pdf", dir.path().display());
        let paths = collect_paths_for_patterns([pattern]).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("a.pdf"));
        assert!(paths[1].ends_with("b.pdf"));
    }

    #[test]
    fn test_literal_missing_path_is_kept() {
        let paths = collect_paths_for_patterns(["/nonexistent/file.pdf"]).unwrap();
        assert_eq!(paths, vec![PathBuf::from("/nonexistent/file.pdf")]);
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(collect_paths_for_patterns(["[unclosed"]).is_err());
    }
}
