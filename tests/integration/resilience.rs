//! Integration tests for retry, recovery and the error collector.

use pdfops::config::RetryConfig;
use pdfops::engine::scripted::ScriptedOp;
use pdfops::engine::ScriptedEngine;
use pdfops::recovery::RetryController;
use pdfops::{CancelToken, ErrorCollector, ErrorKind, PdfOpsError};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tempfile::TempDir;

use crate::common::{fast_retry, marker_file, scripted_service};

#[tokio::test(start_paused = true)]
async fn test_retry_succeeds_on_third_attempt() {
    let retry = RetryController::new(RetryConfig::default());
    let calls = AtomicU32::new(0);

    let outcome = retry
        .execute_with_report(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err(PdfOpsError::io(format!("transient {n}")))
                    } else {
                        Ok(n)
                    }
                }
            },
            &CancelToken::new(),
        )
        .await;

    assert_eq!(outcome.result.unwrap(), 3);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(
        outcome.delays,
        vec![Duration::from_millis(100), Duration::from_millis(200)]
    );
}

#[tokio::test]
async fn test_retry_exhaustion_fills_collector() {
    let collector = Arc::new(ErrorCollector::new());
    let retry = RetryController::new(fast_retry(2)).with_collector(Arc::clone(&collector));
    let calls = AtomicU32::new(0);

    let err = retry
        .execute(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(PdfOpsError::io("disk unplugged")) }
            },
            &CancelToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Io);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(collector.len(), 3);
    assert!(collector.errors().iter().all(|e| e.kind() == ErrorKind::Io));
}

#[tokio::test]
async fn test_non_retryable_fails_fast() {
    let retry = RetryController::new(fast_retry(5));
    let calls = AtomicU32::new(0);

    let outcome = retry
        .execute_with_report(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(PdfOpsError::invalid_file("not a PDF")) }
            },
            &CancelToken::new(),
        )
        .await;

    assert_eq!(outcome.result.unwrap_err().kind(), ErrorKind::InvalidFile);
    assert_eq!(outcome.attempts, 1);
    assert!(outcome.delays.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_zero_retries_is_one_attempt() {
    let retry = RetryController::new(fast_retry(0));
    let outcome = retry
        .execute_with_report(
            || async { Err::<(), _>(PdfOpsError::memory("over budget")) },
            &CancelToken::new(),
        )
        .await;

    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.result.unwrap_err().kind(), ErrorKind::Memory);
}

#[tokio::test]
async fn test_service_validate_recovers_from_io() {
    let dir = TempDir::new().unwrap();
    let file = marker_file(dir.path(), "a.pdf", 1);
    let engine = Arc::new(ScriptedEngine::new().fail_times(ScriptedOp::Validate, ErrorKind::Io, 2));
    let service = scripted_service(&engine, dir.path()).await;

    service.validate(&file, &CancelToken::new()).await.unwrap();

    assert_eq!(engine.call_count(ScriptedOp::Validate), 3);
    assert_eq!(service.collector().len(), 2);
}

#[tokio::test]
async fn test_service_encrypted_is_terminal_outside_decrypt() {
    let dir = TempDir::new().unwrap();
    let file = marker_file(dir.path(), "a.pdf", 1);
    let engine = Arc::new(ScriptedEngine::new().fail_times(ScriptedOp::Info, ErrorKind::Encrypted, 5));
    let service = scripted_service(&engine, dir.path()).await;

    let err = service.info(&file, &CancelToken::new()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Encrypted);
    assert_eq!(engine.call_count(ScriptedOp::Info), 1);
}

#[tokio::test]
async fn test_cancelled_before_first_attempt() {
    let dir = TempDir::new().unwrap();
    let inputs = vec![
        marker_file(dir.path(), "a.pdf", 1),
        marker_file(dir.path(), "b.pdf", 1),
    ];
    let engine = Arc::new(ScriptedEngine::new());
    let service = scripted_service(&engine, dir.path()).await;

    let cancel = CancelToken::new();
    cancel.cancel();
    let err = service.merge(&inputs, "out.pdf", None, &cancel).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Io);
    assert!(err.is_cancellation());
    assert_eq!(engine.call_count(ScriptedOp::Merge), 0);
    assert!(!dir.path().join("out.pdf").exists());
}

#[test]
fn test_collector_clear_is_idempotent() {
    let collector = ErrorCollector::new();
    collector.add(Some(PdfOpsError::io("one")));
    collector.add(None);
    collector.add(Some(PdfOpsError::corrupted("two")));
    assert_eq!(collector.len(), 2);

    collector.clear();
    let once = collector.errors();
    collector.clear();
    assert_eq!(collector.errors().len(), once.len());
    assert!(collector.is_empty());
}
