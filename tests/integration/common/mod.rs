//! Shared helpers for integration tests.

#![allow(dead_code)]

use pdfops::config::{Config, EngineKind, RetryConfig};
use pdfops::engine::{Discovery, PdfEngine, ScriptedEngine};
use pdfops::recovery::MemoryProbe;
use pdfops::ResilientService;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Probe that always reads zero, so memory recovery never kicks in.
#[derive(Debug)]
pub struct ZeroProbe;

impl MemoryProbe for ZeroProbe {
    fn allocated_bytes(&self) -> u64 {
        0
    }

    fn reclaim(&self) {}
}

/// Retry settings with millisecond delays.
pub fn fast_retry(max_retries: u32) -> RetryConfig {
    RetryConfig {
        max_retries,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(10),
        backoff_factor: 2.0,
        timeout: Duration::from_secs(10),
    }
}

/// Configuration rooted in `dir` with fast retries and no decrypt delay.
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.retry = fast_retry(2);
    config.decrypt.temp_dir = dir.join("tmp");
    config.decrypt.attempt_delay = Duration::ZERO;
    config.output.base_dir = dir.to_path_buf();
    config
}

/// Service over `engine` with a zero memory probe and no IO pause.
pub async fn service_with(engine: Arc<dyn PdfEngine>, config: Config) -> ResilientService {
    let discovery = Discovery::with_engine(engine, EngineKind::Library).await;
    ResilientService::with_probe(discovery, config, Arc::new(ZeroProbe))
        .with_io_pause(Duration::ZERO)
}

/// Service over a scripted engine, rooted in `dir`.
pub async fn scripted_service(engine: &Arc<ScriptedEngine>, dir: &Path) -> ResilientService {
    service_with(Arc::clone(engine) as Arc<dyn PdfEngine>, test_config(dir)).await
}

/// Write a scripted-engine input file with `pages` pages.
pub fn marker_file(dir: &Path, name: &str, pages: usize) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("%PDF-scripted input\npages={pages}\n")).unwrap();
    path
}

/// Files in `dir` whose name contains `needle`.
pub fn files_containing(dir: &Path, needle: &str) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .is_some_and(|name| name.to_string_lossy().contains(needle))
        })
        .collect();
    found.sort();
    found
}
