//! pdfops - Resilient PDF validation, decryption and merging.
//!
//! The actual PDF parsing and rewriting is delegated to an engine: an
//! external command-line binary or the in-process lopdf backend. This
//! library layers the operational machinery around that delegation:
//!
//! - A typed error taxonomy with retry and recovery
//! - A memory-aware executor
//! - Dictionary-driven decryption with a per-file password cache
//! - Output path resolution with auto-increment, timestamps and backups
//! - Rollback of a destination file when a write fails
//! - Batched merging of large input sets
//! - An A/B harness that compares two engines on the same workload
//!
//! # Examples
//!
//! ## Merge through the service facade
//!
//! ```no_run
//! use pdfops::{CancelToken, Config, ResilientService};
//! use pdfops::engine::discover;
//! use std::path::PathBuf;
//!
//! # async fn example() -> pdfops::Result<()> {
//! let config = Config::default();
//! let discovery = discover(&config.engine).await;
//! let service = ResilientService::new(discovery, config);
//!
//! let inputs = vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")];
//! let report = service
//!     .merge(&inputs, "merged.pdf", None, &CancelToken::new())
//!     .await?;
//! println!("Wrote {}", report.output.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Using individual components
//!
//! ```no_run
//! use pdfops::config::RetryConfig;
//! use pdfops::recovery::RetryController;
//! use pdfops::engine::{NativeEngine, PdfEngine};
//! use pdfops::CancelToken;
//! use std::path::Path;
//!
//! # async fn example() -> pdfops::Result<()> {
//! let engine = NativeEngine::new();
//! let retry = RetryController::new(RetryConfig::default());
//! let info = retry
//!     .execute(|| engine.info(Path::new("input.pdf")), &CancelToken::new())
//!     .await?;
//! println!("{}", info.summary());
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

pub mod cancel;
pub mod cli;
pub mod compare;
pub mod config;
pub mod decrypt;
pub mod engine;
pub mod error;
pub mod fixtures;
pub mod info;
pub mod io;
pub mod merge;
pub mod output;
pub mod password;
pub mod recovery;
pub mod service;
pub mod utils;

// Re-export commonly used types
pub use cancel::CancelToken;
pub use config::Config;
pub use error::{CancelReason, ErrorCollector, ErrorKind, PdfOpsError, Result, Severity};
pub use info::PdfInfo;
pub use service::ResilientService;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
