//! Integration tests for engine discovery and the library engine.

use pdfops::config::{EngineConfig, EngineKind};
use pdfops::engine::cli::parse_info_output;
use pdfops::engine::{EngineAvailability, NativeEngine, PdfEngine, discover, quick_encryption_scan};
use pdfops::info::{MetadataField, Permission};
use pdfops::{CancelToken, ErrorKind, fixtures};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use crate::common::{service_with, test_config};

fn missing_cli() -> PathBuf {
    PathBuf::from("/nonexistent/bin/pdf-engine")
}

#[tokio::test]
async fn test_discovery_falls_back_to_library() {
    let config = EngineConfig {
        cli_path: missing_cli(),
        ..EngineConfig::default()
    };

    let discovery = discover(&config).await;

    match &discovery.availability {
        EngineAvailability::Available { kind, version } => {
            assert_eq!(*kind, EngineKind::Library);
            assert!(version.ends_with(" (library)"));
        }
        other => panic!("expected library engine, got {other:?}"),
    }
    assert!(discovery.engine.is_some());
}

#[tokio::test]
async fn test_service_without_engine() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("doc.pdf");
    fixtures::write_pdf(&file, 1).unwrap();

    let config = EngineConfig {
        cli_path: missing_cli(),
        discovery_order: vec![EngineKind::Cli],
        ..EngineConfig::default()
    };
    let discovery = discover(&config).await;
    assert!(!discovery.availability.is_available());

    let service = pdfops::ResilientService::new(discovery, test_config(dir.path()));
    let cancel = CancelToken::new();

    let inspect = service.validate(&file, &cancel).await.unwrap_err();
    assert_eq!(inspect.kind(), ErrorKind::InvalidFile);

    let write = service
        .merge(&[file.clone()], "out.pdf", None, &cancel)
        .await
        .unwrap_err();
    assert_eq!(write.kind(), ErrorKind::Processing);

    // The raw-byte scan still answers without an engine.
    assert!(!service.is_encrypted(&file, &cancel).await.unwrap());
}

#[tokio::test]
async fn test_native_info_of_fixture() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("report.pdf");
    fixtures::write_pdf_with_info(&file, 4, Some("Quarterly"), Some("Finance")).unwrap();

    let engine: Arc<dyn PdfEngine> = Arc::new(NativeEngine::new());
    let service = service_with(engine, test_config(dir.path())).await;
    let info = service.info(&file, &CancelToken::new()).await.unwrap();

    assert_eq!(info.page_count(), 4);
    assert!(!info.is_encrypted());
    assert!(info.can_print() && info.can_modify() && info.can_copy());
    assert_eq!(info.metadata(MetadataField::Title), Some("Quarterly"));
    assert_eq!(info.metadata(MetadataField::Author), Some("Finance"));
    assert!(info.file_size() > 0);
}

#[tokio::test]
async fn test_native_validation_sweep() {
    let dir = TempDir::new().unwrap();
    let good = fixtures::synthetic_set(dir.path(), 2, 1).unwrap();
    let empty = dir.path().join("empty.pdf");
    std::fs::write(&empty, b"").unwrap();

    let engine: Arc<dyn PdfEngine> = Arc::new(NativeEngine::new());
    let service = service_with(engine, test_config(dir.path())).await;
    let paths = vec![good[0].clone(), empty.clone(), good[1].clone()];

    let jobs = service.validate_many(&paths, &CancelToken::new()).await.unwrap();

    assert_eq!(jobs.len(), 3);
    assert!(jobs[0].is_valid());
    assert_eq!(jobs[1].error().unwrap().kind(), ErrorKind::Corrupted);
    assert!(jobs[2].is_valid());
}

#[tokio::test]
async fn test_quick_scan_on_fixture() {
    let dir = TempDir::new().unwrap();
    let plain = dir.path().join("plain.pdf");
    fixtures::write_pdf(&plain, 1).unwrap();
    assert!(!quick_encryption_scan(&plain).await.unwrap());

    let marked = dir.path().join("marked.pdf");
    std::fs::write(&marked, b"%PDF-1.7\ntrailer << /Encrypt 5 0 R >>\n").unwrap();
    assert!(quick_encryption_scan(&marked).await.unwrap());
}

#[test]
fn test_cli_info_output_grammar() {
    let output = "\
PDF version: 1.6
Page count:  12
Title:       Annual Report
Encrypted:   Yes
Encryption method: AES
Key length:  256 bit
User password: no
Owner password: YES
Permissions: print, copy
";
    let info = parse_info_output(output, Path::new("/docs/r.pdf"), 1024).unwrap();

    assert_eq!(info.page_count(), 12);
    assert_eq!(info.version(), "1.6");
    assert!(info.is_encrypted());
    assert_eq!(info.key_length(), Some(256));
    assert!(!info.has_user_password());
    assert!(info.has_owner_password());
    assert!(info.can_print());
    assert!(info.can_copy());
    assert!(!info.can_modify());
    assert!(info.flags().allows(Permission::Print));
    assert_eq!(info.metadata(MetadataField::Title), Some("Annual Report"));
}
