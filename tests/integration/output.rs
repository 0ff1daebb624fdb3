//! Integration tests for output naming, backups and rollback.

use chrono::{Local, TimeZone};
use pdfops::config::OutputConfig;
use pdfops::engine::ScriptedEngine;
use pdfops::engine::scripted::ScriptedOp;
use pdfops::io::{OutputResolver, RollbackManager};
use pdfops::{CancelToken, ErrorKind, PdfOpsError};
use serial_test::serial;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use crate::common::{files_containing, marker_file, service_with, test_config};

#[tokio::test]
async fn test_rollback_on_failed_write() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("report.pdf");
    std::fs::write(&dest, "A").unwrap();

    let err = RollbackManager::new()
        .with_rollback(&dest, || async {
            tokio::fs::write(&dest, "B").await?;
            Err::<(), _>(PdfOpsError::io("write interrupted"))
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Io);
    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "A");
    assert!(files_containing(dir.path(), ".backup_").is_empty());
}

#[tokio::test]
async fn test_rollback_discards_backup_on_success() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("report.pdf");
    std::fs::write(&dest, "A").unwrap();

    RollbackManager::new()
        .with_rollback(&dest, || async {
            tokio::fs::write(&dest, "B").await?;
            Ok::<(), PdfOpsError>(())
        })
        .await
        .unwrap();

    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "B");
    assert!(files_containing(dir.path(), ".backup_").is_empty());
}

#[test]
fn test_auto_increment_never_returns_existing_path() {
    let dir = TempDir::new().unwrap();
    let resolver = OutputResolver::new(OutputConfig {
        base_dir: dir.path().to_path_buf(),
        ..OutputConfig::default()
    });

    for expected in ["merged.pdf", "merged_1.pdf", "merged_2.pdf"] {
        let path = resolver.resolve("merged.pdf").unwrap();
        assert_eq!(path, dir.path().join(expected));
        assert!(!path.exists());
        std::fs::write(&path, b"x").unwrap();
    }
}

#[test]
fn test_resolving_twice_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let resolver = OutputResolver::new(OutputConfig {
        base_dir: dir.path().to_path_buf(),
        timestamp: true,
        ..OutputConfig::default()
    });

    let once = resolver.resolve("out/merged.pdf").unwrap();
    let twice = resolver.resolve(&once.to_string_lossy()).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn test_resolving_twice_is_idempotent_with_increment() {
    let dir = TempDir::new().unwrap();
    let resolver = OutputResolver::new(OutputConfig {
        base_dir: dir.path().to_path_buf(),
        timestamp: true,
        auto_increment: true,
        ..OutputConfig::default()
    });
    let noon = Local.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
    std::fs::write(dir.path().join("out_20260101_120000.pdf"), b"x").unwrap();

    let once = resolver.resolve_at("out.pdf", noon).unwrap();
    assert_eq!(once, dir.path().join("out_20260101_120000_1.pdf"));

    let later = noon + chrono::Duration::seconds(5);
    let twice = resolver.resolve_at(&once.to_string_lossy(), later).unwrap();
    assert_eq!(once, twice);
}

#[test]
#[serial]
fn test_relative_base_dir_follows_cwd() {
    let dir = TempDir::new().unwrap();
    let previous = std::env::current_dir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();

    let resolver = OutputResolver::new(OutputConfig::default());
    let resolved = resolver.resolve("merged.pdf");
    std::fs::write("merged.pdf", b"x").unwrap();
    let second = resolver.resolve("merged.pdf");

    std::env::set_current_dir(previous).unwrap();

    assert_eq!(resolved.unwrap(), Path::new("merged.pdf"));
    assert_eq!(second.unwrap(), Path::new("merged_1.pdf"));
}

#[tokio::test]
async fn test_service_restores_backup_when_merge_fails() {
    let dir = TempDir::new().unwrap();
    let inputs = vec![
        marker_file(dir.path(), "a.pdf", 1),
        marker_file(dir.path(), "b.pdf", 1),
    ];
    let dest = dir.path().join("out.pdf");
    std::fs::write(&dest, "previous").unwrap();

    let engine = Arc::new(ScriptedEngine::new().fail_times(ScriptedOp::Merge, ErrorKind::Corrupted, 1));
    let mut config = test_config(dir.path());
    config.output.auto_increment = false;
    config.output.backup_existing = true;
    let service = service_with(engine.clone(), config).await;

    let err = service
        .merge(&inputs, "out.pdf", None, &CancelToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Corrupted);
    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "previous");
    assert!(files_containing(dir.path(), ".backup_").is_empty());

    // A second, successful run replaces the file and drops the backup.
    service
        .merge(&inputs, "out.pdf", None, &CancelToken::new())
        .await
        .unwrap();
    assert!(std::fs::read_to_string(&dest).unwrap().contains("pages=2"));
    assert!(files_containing(dir.path(), ".backup_").is_empty());
}

#[tokio::test]
async fn test_decrypt_to_explicit_output() {
    let dir = TempDir::new().unwrap();
    let file = marker_file(dir.path(), "locked.pdf", 3);
    let engine = Arc::new(ScriptedEngine::new().with_encrypted(&file).with_password("pw"));
    let service = service_with(engine.clone(), test_config(dir.path())).await;

    let outcome = service
        .decrypt(
            &file,
            Some("plain/unlocked.pdf"),
            &["pw".to_string()],
            None,
            &CancelToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.path, dir.path().join("plain").join("unlocked.pdf"));
    assert!(std::fs::read_to_string(&outcome.path).unwrap().contains("pages=3"));
}
