//! CLI argument parsing for pdfops.
//!
//! This module defines the command-line interface structure using `clap`.
//! It handles argument parsing, conversion into a [`Config`], glob expansion
//! of input patterns and loading of password dictionaries.
//!
//! # Examples
//!
//! ```no_run
//! use pdfops::cli::Cli;
//! use clap::Parser;
//!
//! let cli = Cli::parse();
//! let config = cli.to_config().expect("Invalid configuration");
//! ```

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::config::{Config, EngineKind};
use crate::error::{PdfOpsError, Result};
use crate::utils::collect_paths_for_patterns;

/// Validate, inspect, decrypt and merge PDF files through a PDF engine.
///
/// Every engine call runs under retry and recovery. Outputs are resolved
/// against the output directory, never clobber an existing file unless
/// --overwrite is given, and can be backed up before they are replaced.
#[derive(Parser, Debug)]
#[command(name = "pdfops")]
#[command(version)]
#[command(about = "Resilient PDF validation, decryption and merging", long_about = None)]
#[command(author)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbose output - show details and debug logs
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Engine backend to use: cli or library
    ///
    /// Without this flag the CLI engine is probed first and the library
    /// engine is the fallback.
    #[arg(long, global = true, value_name = "KIND", env = "PDFOPS_ENGINE")]
    pub engine: Option<String>,

    /// Binary invoked by the CLI engine
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        env = "PDFOPS_ENGINE_BIN",
        default_value = "pdfcpu"
    )]
    pub engine_bin: PathBuf,

    /// Probe the library engine before the CLI engine
    #[arg(long, global = true)]
    pub prefer_library: bool,

    /// Retries after the first attempt of a failing engine call
    #[arg(long, global = true, value_name = "N", default_value_t = 3)]
    pub retries: u32,

    /// Deadline in seconds for one operation including its retries
    #[arg(long, global = true, value_name = "SECS", default_value_t = 30)]
    pub timeout: u64,

    /// Directory relative output paths are resolved against
    #[arg(long, global = true, value_name = "DIR", env = "PDFOPS_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Append a _YYYYMMDD_HHMMSS suffix to output file names
    #[arg(long, global = true)]
    pub timestamp: bool,

    /// Write over an existing output instead of picking a new name
    #[arg(long, global = true)]
    pub overwrite: bool,

    /// Back up an existing output before writing over it
    ///
    /// The backup is restored if the write fails and removed otherwise.
    #[arg(long, global = true, requires = "overwrite")]
    pub backup: bool,

    /// Directory that receives decrypted copies
    #[arg(long, global = true, value_name = "DIR", env = "PDFOPS_TEMP_DIR")]
    pub temp_dir: Option<PathBuf>,

    /// Password cache file, loaded before and saved after a decrypt
    #[arg(long, global = true, value_name = "FILE", env = "PDFOPS_PASSWORD_CACHE")]
    pub password_cache: Option<PathBuf>,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that each file is a well-formed PDF
    ///
    /// Examples:
    ///   pdfops validate report.pdf
    ///   pdfops validate "scans/*.pdf"
    Validate {
        /// Files or glob patterns
        #[arg(required = true, value_name = "FILE")]
        files: Vec<String>,
    },

    /// Show page count, version, encryption and permissions of a file
    Info {
        /// File to inspect
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Remove the encryption of a file by trying candidate passwords
    ///
    /// Candidates come from --dictionary (one password per line, an empty
    /// line is the empty password) or from the built-in list.
    Decrypt {
        /// Encrypted file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Password dictionary file
        #[arg(short, long, value_name = "FILE")]
        dictionary: Option<PathBuf>,

        /// Where to write the decrypted copy
        #[arg(short, long, value_name = "FILE")]
        output: Option<String>,

        /// Upper bound on candidates tried
        #[arg(long, value_name = "N")]
        max_attempts: Option<usize>,
    },

    /// Merge files, in order, into one document
    ///
    /// Examples:
    ///   pdfops merge a.pdf b.pdf -o merged.pdf
    ///   pdfops merge "chapters/*.pdf" -o book.pdf --batch-size 20
    Merge {
        /// Files or glob patterns, merged in the order given
        #[arg(required = true, value_name = "FILE")]
        files: Vec<String>,

        /// Output PDF file path
        #[arg(short, long, value_name = "FILE")]
        output: String,

        /// Maximum inputs per engine merge call
        #[arg(long, value_name = "N")]
        batch_size: Option<usize>,
    },

    /// Score the strength of a password
    Strength {
        /// Password to score
        password: String,
    },

    /// Compare the library engine against the discovered engine
    ///
    /// Runs merge, info and validation workloads on synthetic documents
    /// against both engines and prints per-category statistics.
    Compare {
        /// Number of synthetic documents
        #[arg(long, value_name = "N", default_value_t = 5)]
        count: usize,

        /// Pages per synthetic document
        #[arg(long, value_name = "N", default_value_t = 3)]
        pages: u32,

        /// Results file; new comparisons are added to what it holds
        #[arg(long, value_name = "FILE")]
        results: Option<PathBuf>,
    },
}

impl Cli {
    /// Convert CLI arguments into a validated Config.
    ///
    /// # Errors
    ///
    /// Returns an InvalidInput error if the engine name is unknown or the
    /// resulting configuration fails validation.
    pub fn to_config(&self) -> Result<Config> {
        let mut config = Config {
            quiet: self.quiet,
            verbose: self.verbose,
            ..Config::default()
        };

        // Engine selection
        config.engine.cli_path = self.engine_bin.clone();
        config.engine.prefer_library = self.prefer_library;
        if let Some(ref engine) = self.engine {
            config.engine.discovery_order = vec![EngineKind::from_str(engine)?];
        }

        // Retry
        config.retry.max_retries = self.retries;
        config.retry.timeout = Duration::from_secs(self.timeout);

        // Output naming
        if let Some(ref dir) = self.output_dir {
            config.output.base_dir = dir.clone();
        }
        config.output.timestamp = self.timestamp;
        config.output.auto_increment = !self.overwrite;
        config.output.backup_existing = self.backup;

        // Subcommand specific settings
        if let Some(ref dir) = self.temp_dir {
            config.decrypt.temp_dir = dir.clone();
        }
        match self.command {
            Command::Decrypt {
                max_attempts: Some(n),
                ..
            } => config.decrypt.max_attempts = n,
            Command::Merge {
                batch_size: Some(n),
                ..
            } => config.merge.batch_size = n,
            _ => {}
        }

        config.validate().map_err(|e| {
            PdfOpsError::invalid_input(format!("Configuration validation failed: {}", e.message()))
        })?;

        Ok(config)
    }

    /// Input paths of the subcommand with glob patterns expanded.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern is invalid, or InvalidFile if the
    /// patterns matched nothing.
    pub fn inputs(&self) -> Result<Vec<PathBuf>> {
        let paths = match &self.command {
            Command::Validate { files } | Command::Merge { files, .. } => {
                collect_paths_for_patterns(files)?
            }
            Command::Info { file } | Command::Decrypt { file, .. } => vec![file.clone()],
            Command::Strength { .. } | Command::Compare { .. } => return Ok(Vec::new()),
        };

        if paths.is_empty() {
            return Err(PdfOpsError::invalid_file("no input files matched"));
        }
        Ok(paths)
    }
}

/// Read a password dictionary: one candidate per line, in file order.
///
/// An empty line is the empty password. Repeated candidates are kept once,
/// at their first position.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub async fn read_dictionary(path: &Path) -> Result<Vec<String>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| PdfOpsError::from(e).with_path(path))?;

    let mut seen = std::collections::HashSet::new();
    Ok(text
        .lines()
        .map(|line| line.trim_end_matches('\r').to_string())
        .filter(|line| seen.insert(line.clone()))
        .collect())
}
