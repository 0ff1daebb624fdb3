//! Integration tests for the A/B harness and its results file.

use pdfops::compare::{AbHarness, Category, ComparisonStats, Winner, load_results, save_results};
use pdfops::engine::scripted::ScriptedOp;
use pdfops::engine::{PdfEngine, ScriptedEngine};
use pdfops::{CancelToken, ErrorKind};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use crate::common::{ZeroProbe, marker_file};

fn harness(a: ScriptedEngine, b: ScriptedEngine) -> AbHarness {
    AbHarness::new(Arc::new(a), Arc::new(b), Arc::new(ZeroProbe))
}

async fn merge_op(engine: Arc<dyn PdfEngine>, inputs: Vec<PathBuf>, dst: PathBuf) -> pdfops::Result<()> {
    engine.merge(&inputs, &dst).await
}

#[tokio::test]
async fn test_faster_engine_wins_and_results_persist() {
    let dir = TempDir::new().unwrap();
    let inputs = vec![
        marker_file(dir.path(), "a.pdf", 1),
        marker_file(dir.path(), "b.pdf", 1),
    ];
    let ab = harness(
        ScriptedEngine::new().named("quick"),
        ScriptedEngine::new()
            .named("slow")
            .with_latency(Duration::from_millis(40)),
    );
    let out = dir.path().join("merged.pdf");

    let cmp = ab
        .run(
            "merge_two",
            |engine| merge_op(engine, inputs.clone(), out.clone()),
            &CancelToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(cmp.category, Category::Merge);
    assert_eq!(cmp.a.engine, "quick");
    assert_eq!(cmp.b.engine, "slow");
    assert!(cmp.a.success && cmp.b.success);
    assert_eq!(cmp.winner, Winner::A);
    assert!(cmp.performance_gain > 0.0);

    let file = dir.path().join("results").join("ab.json");
    save_results(&file, &ab.results()).await.unwrap();
    let loaded = load_results(&file).await.unwrap();
    assert_eq!(loaded, ab.results());

    let stats = ComparisonStats::from_results(&loaded);
    assert_eq!(stats.total, 1);
    assert_eq!(stats.wins_a, 1);
    assert_eq!(stats.categories[&Category::Merge].wins_a, 1);
}

#[tokio::test]
async fn test_failure_is_recorded_not_returned() {
    let dir = TempDir::new().unwrap();
    let file = marker_file(dir.path(), "a.pdf", 1);
    let ab = harness(
        ScriptedEngine::new()
            .with_latency(Duration::from_millis(40))
            .fail_times(ScriptedOp::Validate, ErrorKind::Corrupted, 1),
        ScriptedEngine::new(),
    );

    let cmp = ab
        .run(
            "performance_validate",
            |engine| {
                let file = file.clone();
                async move { engine.validate(&file).await }
            },
            &CancelToken::new(),
        )
        .await
        .unwrap();

    assert!(!cmp.a.success);
    assert!(cmp.a.error.is_some());
    assert!(cmp.b.success);
    assert_eq!(cmp.winner, Winner::B);
}

#[tokio::test]
async fn test_cancelled_harness_runs_nothing() {
    let engine_a = Arc::new(ScriptedEngine::new());
    let ab = AbHarness::new(
        engine_a.clone(),
        Arc::new(ScriptedEngine::new()),
        Arc::new(ZeroProbe),
    );
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = ab
        .run("write_nothing", |engine| async move { engine.version().await.map(|_| ()) }, &cancel)
        .await
        .unwrap_err();

    assert!(err.is_cancellation());
    assert_eq!(engine_a.calls().len(), 0);
    assert!(ab.results().is_empty());
}
