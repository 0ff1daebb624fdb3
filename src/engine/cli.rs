//! Subprocess engine backend.
//!
//! Invokes an external binary as `<bin> <subcommand> [flags] <args>`:
//!
//! | Call | Invocation |
//! |---|---|
//! | version | `<bin> version` |
//! | validate | `<bin> validate <file>` |
//! | info | `<bin> info <file>` |
//! | decrypt | `<bin> decrypt -upw <pw> -opw <pw> <src> <dst>` |
//! | merge | `<bin> merge <dst> <inputs...>` |
//!
//! A non-zero exit status is turned into a typed error by classifying the
//! child's stderr (stdout when stderr is empty).

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use super::PdfEngine;
use crate::error::{PdfOpsError, Result};
use crate::info::{MetadataField, PdfInfo, PdfInfoBuilder, Permission};

/// Engine backed by an external command-line binary.
pub struct CliEngine {
    binary: PathBuf,
    lock: Mutex<()>,
}

impl CliEngine {
    /// Create an engine that invokes `binary`.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            lock: Mutex::new(()),
        }
    }

    /// Binary this engine invokes.
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Run one subcommand and return its stdout.
    async fn run(&self, args: Vec<OsString>) -> Result<String> {
        let _guard = self.lock.lock().await;
        debug!(binary = %self.binary.display(), ?args, "running engine command");

        // Dropping the future (cancellation) kills the child.
        let output = Command::new(&self.binary)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                let kind = if e.kind() == std::io::ErrorKind::NotFound {
                    crate::ErrorKind::Processing
                } else {
                    crate::ErrorKind::Io
                };
                PdfOpsError::new(
                    kind,
                    format!("Failed to run engine {}: {e}", self.binary.display()),
                )
                .with_source(e)
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        trace!(%stdout, "engine output");

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            let message = if message.is_empty() {
                format!("engine exited with {}", output.status)
            } else {
                message
            };
            return Err(PdfOpsError::from_engine(message));
        }

        Ok(stdout)
    }
}

#[async_trait]
impl PdfEngine for CliEngine {
    fn name(&self) -> &str {
        "cli"
    }

    async fn version(&self) -> Result<String> {
        let stdout = self.run(vec!["version".into()]).await?;
        parse_version_output(&stdout)
    }

    async fn validate(&self, path: &Path) -> Result<()> {
        self.run(vec!["validate".into(), path.into()])
            .await
            .map(|_| ())
            .map_err(|e| e.with_path(path))
    }

    async fn info(&self, path: &Path) -> Result<PdfInfo> {
        let stdout = self
            .run(vec!["info".into(), path.into()])
            .await
            .map_err(|e| e.with_path(path))?;
        let file_size = tokio::fs::metadata(path).await.map(|m| m.len()).unwrap_or(0);
        parse_info_output(&stdout, path, file_size)
    }

    async fn is_encrypted(&self, path: &Path) -> Result<bool> {
        Ok(self.info(path).await?.is_encrypted())
    }

    async fn decrypt(&self, src: &Path, dst: &Path, password: &str) -> Result<()> {
        self.run(vec![
            "decrypt".into(),
            "-upw".into(),
            password.into(),
            "-opw".into(),
            password.into(),
            src.into(),
            dst.into(),
        ])
        .await
        .map(|_| ())
        .map_err(|e| e.with_path(src))
    }

    async fn merge(&self, inputs: &[PathBuf], dst: &Path) -> Result<()> {
        if inputs.is_empty() {
            return Err(PdfOpsError::invalid_file("no files to merge"));
        }
        let mut args: Vec<OsString> = vec!["merge".into(), dst.into()];
        args.extend(inputs.iter().map(OsString::from));
        self.run(args).await.map(|_| ()).map_err(|e| e.with_path(dst))
    }
}

/// Extract a version string from `<bin> version` output.
///
/// Accepts `1.2.3`, `v1.2.3`, `pdfcpu: v1.2.3 dev` and similar first lines.
pub fn parse_version_output(output: &str) -> Result<String> {
    let line = output
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| PdfOpsError::processing("engine returned an empty version"))?;

    let value = match line.split_once(':') {
        Some((_, rest)) if !rest.trim().is_empty() => rest.trim(),
        _ => line,
    };
    let token = value.split_whitespace().next().unwrap_or(value);
    let token = token
        .strip_prefix('v')
        .filter(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
        .unwrap_or(token);

    Ok(token.to_string())
}

/// Parse a boolean value: `true|yes|false|no`, case-insensitive.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" => Some(true),
        "false" | "no" => Some(false),
        _ => None,
    }
}

fn normalize_key(key: &str) -> String {
    key.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Parse `<bin> info` output into an information record.
///
/// Lines are `Key: value`; keys are matched case-insensitively with runs of
/// whitespace collapsed. Unknown keys and unparsable values are skipped.
///
/// # Errors
///
/// Returns a Processing error when not a single known key is present.
pub fn parse_info_output(output: &str, path: &Path, file_size: u64) -> Result<PdfInfo> {
    let mut builder = PdfInfo::builder(path).file_size(file_size);
    let mut recognized = 0usize;

    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let (next, known) = apply_info_line(builder, &normalize_key(key), value.trim());
        builder = next;
        if known {
            recognized += 1;
        }
    }

    if recognized == 0 {
        return Err(PdfOpsError::processing("unrecognised engine info output").with_path(path));
    }

    Ok(builder.build())
}

fn apply_info_line(builder: PdfInfoBuilder, key: &str, value: &str) -> (PdfInfoBuilder, bool) {
    match key {
        "page count" => match value.parse::<usize>() {
            Ok(pages) => (builder.page_count(pages), true),
            Err(_) => (builder, false),
        },
        "encrypted" => match parse_bool(value) {
            Some(flag) => (builder.encrypted(flag), true),
            None => (builder, false),
        },
        "user password" => match parse_bool(value) {
            Some(flag) => (builder.user_password(flag), true),
            None => (builder, false),
        },
        "owner password" => match parse_bool(value) {
            Some(flag) => (builder.owner_password(flag), true),
            None => (builder, false),
        },
        "pdf version" => (builder.version(value), true),
        "encryption method" => (builder.encryption_method(value), true),
        "key length" => {
            let digits: String = value.chars().take_while(|c| c.is_ascii_digit()).collect();
            match digits.parse::<u32>() {
                Ok(bits) => (builder.key_length(bits), true),
                Err(_) => (builder, false),
            }
        }
        "permissions" => (builder.permissions(parse_permissions(value)), true),
        other => match MetadataField::parse(other) {
            Some(field) => (builder.metadata(field, value), true),
            None => (builder, false),
        },
    }
}

/// Parse a comma-separated permission list. `all`/`full` grants every
/// permission, `none` grants nothing, unknown words are ignored.
pub fn parse_permissions(value: &str) -> Vec<Permission> {
    let trimmed = value.trim().to_lowercase();
    match trimmed.as_str() {
        "all" | "full" => return Permission::ALL.to_vec(),
        "" | "none" => return Vec::new(),
        _ => {}
    }

    trimmed
        .split(',')
        .filter_map(|word| word.parse::<Permission>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const SAMPLE: &str = "\
  PDF version:     1.7
Page count:  12
  Title:   Quarterly Report
AUTHOR: Jane Doe
Producer: engine 0.8
Encrypted:   Yes
Encryption   Method: AES
Key Length: 256 bit
User password: no
Owner Password: YES
Permissions: print, copy, print_high, teleport
garbage line without separator
";

    #[test]
    fn test_parse_info_output() {
        let info = parse_info_output(SAMPLE, Path::new("report.pdf"), 4096).unwrap();

        assert_eq!(info.page_count(), 12);
        assert_eq!(info.version(), "1.7");
        assert_eq!(info.file_size(), 4096);
        assert!(info.is_encrypted());
        assert_eq!(info.encryption_method(), Some("AES"));
        assert_eq!(info.key_length(), Some(256));
        assert!(!info.has_user_password());
        assert!(info.has_owner_password());
        assert_eq!(info.metadata(MetadataField::Title), Some("Quarterly Report"));
        assert_eq!(info.metadata(MetadataField::Author), Some("Jane Doe"));

        assert!(info.can_print());
        assert!(info.can_copy());
        assert!(!info.can_modify());
        assert_eq!(info.permissions().len(), 3);
    }

    #[test]
    fn test_parse_info_output_unencrypted_grants_all() {
        let info = parse_info_output("Page count: 1\nEncrypted: false\n", Path::new("a.pdf"), 0)
            .unwrap();
        assert!(!info.is_encrypted());
        assert!(info.can_modify());
    }

    #[test]
    fn test_parse_info_output_rejects_noise() {
        let err = parse_info_output("hello world\n", Path::new("a.pdf"), 0).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Processing);
    }

    #[rstest(
        input, expected,
        case("1.2.3\n", "1.2.3"),
        case("v0.8.1\n", "0.8.1"),
        case("pdfcpu: v0.8.1 dev\n", "0.8.1"),
        case("\n\n  2.0 beta  \n", "2.0")
    )]
    fn test_parse_version_output(input: &str, expected: &str) {
        assert_eq!(parse_version_output(input).unwrap(), expected);
    }

    #[test]
    fn test_parse_version_output_empty() {
        assert!(parse_version_output("   \n").is_err());
    }

    #[rstest(
        input, expected,
        case("true", Some(true)),
        case("YES", Some(true)),
        case(" no ", Some(false)),
        case("False", Some(false)),
        case("maybe", None)
    )]
    fn test_parse_bool(input: &str, expected: Option<bool>) {
        assert_eq!(parse_bool(input), expected);
    }

    #[test]
    fn test_parse_permissions_keywords() {
        assert_eq!(parse_permissions("All").len(), 8);
        assert!(parse_permissions("none").is_empty());
        assert_eq!(
            parse_permissions("fill , assemble"),
            vec![Permission::Fill, Permission::Assemble]
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_processing_error() {
        let engine = CliEngine::new("/nonexistent/pdf-engine-binary");
        let err = engine.version().await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Processing);
    }
}
