//! Integration tests for batched merging through the service facade.

use pdfops::engine::scripted::ScriptedOp;
use pdfops::engine::{NativeEngine, PdfEngine, ScriptedEngine};
use pdfops::merge::{MergePlan, batch_path};
use pdfops::output::MemorySink;
use pdfops::service::{JobStatus, MergeJob};
use pdfops::{CancelToken, ErrorKind, fixtures};
use rstest::rstest;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use crate::common::{files_containing, marker_file, scripted_service, service_with, test_config};

fn inputs(dir: &Path, count: usize) -> Vec<PathBuf> {
    (0..count)
        .map(|i| marker_file(dir, &format!("in_{i:02}.pdf"), 1))
        .collect()
}

#[rstest]
#[case(1, 3, 1)]
#[case(3, 3, 1)]
#[case(4, 3, 3)]
#[case(10, 3, 5)]
#[case(100, 50, 3)]
#[case(101, 50, 4)]
fn test_engine_call_count(#[case] n: usize, #[case] batch: usize, #[case] calls: usize) {
    let inputs: Vec<PathBuf> = (0..n).map(|i| PathBuf::from(format!("{i}.pdf"))).collect();
    let plan = MergePlan::build(&inputs, Path::new("out.pdf"), batch).unwrap();
    assert_eq!(plan.engine_calls(), calls);
}

#[tokio::test]
async fn test_streaming_merge_hierarchy() {
    let dir = TempDir::new().unwrap();
    let files = inputs(dir.path(), 10);
    let engine = Arc::new(ScriptedEngine::new());
    let mut config = test_config(dir.path());
    config.merge.batch_size = 3;
    let service = service_with(engine.clone(), config).await;
    let sink = MemorySink::new();

    let report = service
        .merge(&files, "out.pdf", Some(&sink), &CancelToken::new())
        .await
        .unwrap();

    let out = dir.path().join("out.pdf");
    assert_eq!(report.output, out);
    assert_eq!(report.batches, 4);
    assert_eq!(report.engine_calls, 5);

    let calls = engine.merge_calls();
    assert_eq!(calls.len(), 5);
    for (i, (chunk, dst)) in calls.iter().take(4).enumerate() {
        assert_eq!(*dst, batch_path(&out, i));
        assert_eq!(chunk.as_slice(), &files[i * 3..(i * 3 + 3).min(10)]);
    }
    let (final_inputs, final_dst) = &calls[4];
    assert_eq!(*final_dst, out);
    assert_eq!(final_inputs, &(0..4).map(|i| batch_path(&out, i)).collect::<Vec<_>>());

    assert!(files_containing(dir.path(), ".batch_").is_empty());
    let merged = std::fs::read_to_string(&out).unwrap();
    assert!(merged.contains("pages=10"));
    assert_eq!(sink.lines().len(), 5);
}

#[tokio::test]
async fn test_failed_batch_leaves_no_intermediates() {
    let dir = TempDir::new().unwrap();
    let files = inputs(dir.path(), 7);
    let engine = Arc::new(ScriptedEngine::new().fail_merge_call(1, ErrorKind::Corrupted));
    let mut config = test_config(dir.path());
    config.merge.batch_size = 3;
    let service = service_with(engine.clone(), config).await;

    let err = service
        .merge(&files, "out.pdf", None, &CancelToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Corrupted);
    assert_eq!(engine.call_count(ScriptedOp::Merge), 2);
    assert!(files_containing(dir.path(), ".batch_").is_empty());
    assert!(!dir.path().join("out.pdf").exists());
}

#[tokio::test]
async fn test_empty_input_list() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(ScriptedEngine::new());
    let service = scripted_service(&engine, dir.path()).await;

    let err = service
        .merge(&[], "out.pdf", None, &CancelToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidFile);
}

#[tokio::test]
async fn test_missing_input_is_invalid_file() {
    let dir = TempDir::new().unwrap();
    let mut files = inputs(dir.path(), 2);
    files.push(dir.path().join("absent.pdf"));
    let engine = Arc::new(ScriptedEngine::new());
    let service = scripted_service(&engine, dir.path()).await;

    let err = service
        .merge(&files, "out.pdf", None, &CancelToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidFile);
    assert_eq!(engine.call_count(ScriptedOp::Merge), 0);
}

#[tokio::test]
async fn test_merge_jobs_record_each_outcome() {
    let dir = TempDir::new().unwrap();
    let good = inputs(dir.path(), 2);
    let engine = Arc::new(ScriptedEngine::new());
    let service = scripted_service(&engine, dir.path()).await;

    let mut jobs = vec![
        MergeJob::new("first", good.clone(), "first.pdf"),
        MergeJob::new("broken", vec![dir.path().join("nope.pdf")], "broken.pdf"),
        MergeJob::new("last", good, "last.pdf"),
    ];
    let completed = service.merge_many(&mut jobs, &CancelToken::new()).await.unwrap();

    assert_eq!(completed, 2);
    assert_eq!(jobs[0].status(), JobStatus::Completed);
    assert_eq!(jobs[1].status(), JobStatus::Failed);
    assert_eq!(jobs[1].error().unwrap().kind(), ErrorKind::InvalidFile);
    assert_eq!(jobs[2].status(), JobStatus::Completed);

    // Finished jobs cannot be run again.
    assert!(service.merge_many(&mut jobs, &CancelToken::new()).await.is_err());
}

#[tokio::test]
async fn test_native_merge_of_synthetic_documents() {
    let dir = TempDir::new().unwrap();
    let files = fixtures::synthetic_set(&dir.path().join("in"), 5, 2).unwrap();
    let engine: Arc<dyn PdfEngine> = Arc::new(NativeEngine::new());
    let mut config = test_config(dir.path());
    config.merge.batch_size = 2;
    let service = service_with(Arc::clone(&engine), config).await;

    let report = service
        .merge(&files, "book.pdf", None, &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(report.engine_calls, 4);
    let info = engine.info(&report.output).await.unwrap();
    assert_eq!(info.page_count(), 10);
    assert!(files_containing(dir.path(), ".batch_").is_empty());
}
