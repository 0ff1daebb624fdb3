//! pdfops - Resilient PDF validation, decryption and merging.
//!
//! Thin binary over the `pdfops` library: parses arguments, discovers an
//! engine and drives the service facade.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use pdfops::cli::{Cli, Command, read_dictionary};
use pdfops::compare::{AbHarness, ComparisonStats, load_results, save_results};
use pdfops::engine::{NativeEngine, PdfEngine, discover};
use pdfops::error::PdfOpsError;
use pdfops::output::{
    LineSink, OutputFormatter, ProgressSink, display_error, display_info, display_merge_report,
    display_strength, display_validation,
};
use pdfops::password::store;
use pdfops::recovery::ProcessMemory;
use pdfops::{CancelToken, Config, ResilientService, fixtures};

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let formatter = OutputFormatter::new(cli.quiet, cli.verbose);

    // Run the application and handle errors
    if let Err(err) = run(cli, &formatter).await {
        display_error(&formatter, &err);
        process::exit(err.exit_code());
    }
}

/// Install the log subscriber. `PDFOPS_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("PDFOPS_LOG")
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_interrupt(token: CancelToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling");
            token.cancel();
        }
    });
}

/// Main application logic.
async fn run(cli: Cli, formatter: &OutputFormatter) -> Result<(), PdfOpsError> {
    let config = cli.to_config()?;
    let inputs = cli.inputs()?;

    // Strength needs no engine
    if let Command::Strength { ref password } = cli.command {
        display_strength(formatter, &pdfops::password::strength(password));
        return Ok(());
    }

    let cancel = CancelToken::new();
    cancel_on_interrupt(cancel.clone());

    let discovery = discover(&config.engine).await;
    if let Some(version) = discovery.version() {
        formatter.debug(&format!("Engine: {version}"));
    }
    let service = ResilientService::new(discovery, config.clone());

    let stderr_sink = LineSink::stderr();
    let progress: Option<&dyn ProgressSink> = if formatter.should_print() {
        Some(&stderr_sink)
    } else {
        None
    };

    match cli.command {
        Command::Validate { .. } => {
            let jobs = service.validate_many(&inputs, &cancel).await?;
            display_validation(formatter, &jobs);
            if let Some(err) = jobs.iter().find_map(|job| job.error()) {
                return Err(err.clone());
            }
        }

        Command::Info { ref file } => {
            let info = service.info(file, &cancel).await?;
            display_info(formatter, &info);
        }

        Command::Decrypt {
            ref file,
            ref dictionary,
            ref output,
            ..
        } => {
            if let Some(ref cache) = cli.password_cache {
                service
                    .passwords()
                    .import_cache(store::load_cache(cache).await);
            }

            // Without a dictionary file, passwords that worked before go first.
            let candidates = match dictionary {
                Some(path) => read_dictionary(path).await?,
                None => service.passwords().optimized_list(),
            };

            let outcome = service
                .decrypt(file, output.as_deref(), &candidates, progress, &cancel)
                .await;

            if let Some(ref cache) = cli.password_cache
                && let Err(err) = save_password_cache(&service, cache).await
            {
                formatter.warning(&format!("{err:#}"));
            }

            let outcome = outcome?;
            if outcome.is_original {
                formatter.info(&format!("{} is not encrypted", file.display()));
            } else {
                formatter.success(&format!(
                    "Decrypted {} after {} attempt(s)",
                    file.display(),
                    outcome.attempts
                ));
                formatter.field("Output", &outcome.path.display().to_string());
            }

            // Without an explicit output the temp copy is the result.
            if output.is_some() {
                service.cleanup().await;
            }
        }

        Command::Merge { ref output, .. } => {
            formatter.info(&format!("Merging {} PDF files...", inputs.len()));
            let report = service.merge(&inputs, output, progress, &cancel).await?;
            display_merge_report(formatter, &report);
        }

        Command::Compare {
            count,
            pages,
            ref results,
        } => {
            compare(&service, &config, formatter, count, pages, results.as_deref(), &cancel).await?;
        }

        Command::Strength { .. } => {}
    }

    Ok(())
}

async fn save_password_cache(service: &ResilientService, path: &Path) -> anyhow::Result<()> {
    store::save_cache(path, &service.passwords().export_cache())
        .await
        .with_context(|| format!("failed to save password cache {}", path.display()))
}

/// Run the A/B workloads on synthetic documents.
///
/// Engine A is always the library engine; B is the discovered engine, or a
/// second library engine when discovery found nothing else.
async fn compare(
    service: &ResilientService,
    config: &Config,
    formatter: &OutputFormatter,
    count: usize,
    pages: u32,
    results: Option<&Path>,
    cancel: &CancelToken,
) -> Result<(), PdfOpsError> {
    let scratch = config
        .decrypt
        .temp_dir
        .join(format!("pdfops-compare-{}", process::id()));
    let inputs = {
        let scratch = scratch.clone();
        tokio::task::spawn_blocking(move || fixtures::synthetic_set(&scratch, count, pages))
            .await
            .map_err(|e| PdfOpsError::processing(format!("fixture task failed: {e}")))??
    };

    let engine_a: Arc<dyn PdfEngine> = Arc::new(NativeEngine::new());
    let engine_b: Arc<dyn PdfEngine> = match service.engine() {
        Some(engine) => Arc::clone(engine),
        None => Arc::new(NativeEngine::new()),
    };
    let harness = AbHarness::new(engine_a, engine_b, Arc::new(ProcessMemory));

    if let Some(path) = results {
        harness.extend_results(load_results(path).await?);
    }

    let outcome = run_workloads(&harness, &inputs, &scratch, cancel).await;
    let _ = tokio::fs::remove_dir_all(&scratch).await;
    outcome?;

    let all = harness.results();
    if let Some(path) = results {
        save_results(path, &all).await?;
        formatter.detail("Results", &path.display().to_string());
    }
    formatter.raw(&ComparisonStats::from_results(&all).render());
    Ok(())
}

async fn run_workloads(
    harness: &AbHarness,
    inputs: &[PathBuf],
    scratch: &Path,
    cancel: &CancelToken,
) -> Result<(), PdfOpsError> {
    let mut round = 0usize;
    harness
        .run(
            &format!("merge_{}_docs", inputs.len()),
            |engine| {
                round += 1;
                let dst = scratch.join(format!("merged_{round}.pdf"));
                let inputs = inputs.to_vec();
                async move { engine.merge(&inputs, &dst).await }
            },
            cancel,
        )
        .await?;

    harness
        .run(
            "performance_validate",
            |engine| {
                let inputs = inputs.to_vec();
                async move {
                    for path in &inputs {
                        engine.validate(path).await?;
                    }
                    Ok(())
                }
            },
            cancel,
        )
        .await?;

    harness
        .run(
            "info",
            |engine| {
                let first = inputs.first().cloned();
                async move {
                    match first {
                        Some(path) => engine.info(&path).await.map(|_| ()),
                        None => Ok(()),
                    }
                }
            },
            cancel,
        )
        .await?;

    Ok(())
}
