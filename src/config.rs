//! Configuration module for pdfops.
//!
//! This module holds the validated, normalized settings that drive every
//! component of the resilient operation core. It handles:
//! - Defaults for each component
//! - Validation of value ranges
//! - Parsing of the engine selection from strings
//!
//! The binary builds a [`Config`] from command-line arguments; library users
//! usually start from [`Config::default`] and override single fields.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{PdfOpsError, Result};

/// Settings for the retry controller.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt. Zero means exactly one attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each retry.
    pub backoff_factor: f64,
    /// Deadline for the whole retry loop.
    pub timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_factor: 2.0,
            timeout: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Validate the retry settings.
    ///
    /// # Errors
    ///
    /// Returns an InvalidInput error if the backoff factor is below 1, or the
    /// initial delay exceeds the maximum delay, or the timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(PdfOpsError::invalid_input(format!(
                "Backoff factor must be at least 1.0, got {}",
                self.backoff_factor
            )));
        }

        if self.initial_delay > self.max_delay {
            return Err(PdfOpsError::invalid_input(
                "Initial retry delay cannot exceed the maximum delay",
            ));
        }

        if self.timeout.is_zero() {
            return Err(PdfOpsError::invalid_input("Retry timeout must be positive"));
        }

        Ok(())
    }
}

/// Settings for the memory monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryConfig {
    /// Hard limit in bytes.
    pub max_bytes: u64,
    /// Fraction of `max_bytes` above which a reclaim is forced.
    pub gc_threshold: f64,
    /// Pause between a forced reclaim and the re-check.
    pub recovery_pause: Duration,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_bytes: 1024 * 1024 * 1024,
            gc_threshold: 0.5,
            recovery_pause: Duration::from_millis(100),
        }
    }
}

impl MemoryConfig {
    /// Byte level at which a reclaim is forced.
    pub fn gc_threshold_bytes(&self) -> u64 {
        (self.max_bytes as f64 * self.gc_threshold) as u64
    }

    /// Validate the memory settings.
    pub fn validate(&self) -> Result<()> {
        if self.max_bytes == 0 {
            return Err(PdfOpsError::invalid_input("Memory limit must be positive"));
        }

        if !(0.0..=1.0).contains(&self.gc_threshold) || self.gc_threshold == 0.0 {
            return Err(PdfOpsError::invalid_input(format!(
                "Reclaim threshold must be in (0, 1], got {}",
                self.gc_threshold
            )));
        }

        Ok(())
    }
}

/// Settings for the password-driven decryptor.
#[derive(Debug, Clone, PartialEq)]
pub struct DecryptConfig {
    /// Directory that receives `decrypted_<name>` files.
    pub temp_dir: PathBuf,
    /// Upper bound on candidates tried per file.
    pub max_attempts: usize,
    /// Pause between two candidates.
    pub attempt_delay: Duration,
}

impl Default for DecryptConfig {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir(),
            max_attempts: 1000,
            attempt_delay: Duration::from_millis(100),
        }
    }
}

impl DecryptConfig {
    /// Validate the decryptor settings.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(PdfOpsError::invalid_input(
                "Maximum password attempts must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Settings for output path resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    /// Directory relative outputs are resolved against.
    pub base_dir: PathBuf,
    /// File name used when the caller gives no output path.
    pub default_file_name: String,
    /// Append a `_YYYYMMDD_HHMMSS` suffix before the extension.
    pub timestamp: bool,
    /// Pick `stem_N.pdf` instead of clobbering an existing file.
    pub auto_increment: bool,
    /// Back up an existing destination before writing over it.
    pub backup_existing: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            default_file_name: "output.pdf".to_string(),
            timestamp: false,
            auto_increment: true,
            backup_existing: false,
        }
    }
}

/// Settings for the streaming merger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeConfig {
    /// Maximum inputs handed to the engine in one merge call.
    pub batch_size: usize,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self { batch_size: 50 }
    }
}

impl MergeConfig {
    /// Validate the merge settings.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size < 2 {
            return Err(PdfOpsError::invalid_input(
                "Merge batch size must be at least 2",
            ));
        }
        Ok(())
    }
}

/// Which engine backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    /// External command-line binary.
    Cli,
    /// In-process library.
    Library,
}

impl FromStr for EngineKind {
    type Err = PdfOpsError;

    /// Parse an engine kind: "cli" or "library" (also "lib", "native").
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "cli" => Ok(Self::Cli),
            "library" | "lib" | "native" => Ok(Self::Library),
            _ => Err(PdfOpsError::invalid_input(format!(
                "Invalid engine: {s}. Must be one of: cli, library"
            ))),
        }
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => f.write_str("CLI"),
            Self::Library => f.write_str("library"),
        }
    }
}

/// Settings for engine discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Binary invoked by the CLI engine.
    pub cli_path: PathBuf,
    /// Probe the library before the CLI.
    pub prefer_library: bool,
    /// Probe order. Backends missing from the list are never used.
    pub discovery_order: Vec<EngineKind>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cli_path: PathBuf::from("pdfcpu"),
            prefer_library: false,
            discovery_order: vec![EngineKind::Cli, EngineKind::Library],
        }
    }
}

impl EngineConfig {
    /// Probe order after applying `prefer_library`.
    pub fn effective_order(&self) -> Vec<EngineKind> {
        let mut order = self.discovery_order.clone();
        if self.prefer_library
            && let Some(pos) = order.iter().position(|k| *k == EngineKind::Library)
        {
            let lib = order.remove(pos);
            order.insert(0, lib);
        }
        order
    }
}

/// Complete configuration for the resilient operation core.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Retry controller settings.
    pub retry: RetryConfig,
    /// Memory monitor settings.
    pub memory: MemoryConfig,
    /// Decryptor settings.
    pub decrypt: DecryptConfig,
    /// Output resolver settings.
    pub output: OutputConfig,
    /// Streaming merger settings.
    pub merge: MergeConfig,
    /// Engine discovery settings.
    pub engine: EngineConfig,
    /// Quiet mode - suppress non-error output.
    pub quiet: bool,
    /// Verbose output mode.
    pub verbose: bool,
}

impl Config {
    /// Validate the whole configuration.
    ///
    /// # Errors
    ///
    /// Returns the first failing section's error, or an error if verbose and
    /// quiet are both enabled.
    pub fn validate(&self) -> Result<()> {
        if self.verbose && self.quiet {
            return Err(PdfOpsError::invalid_input(
                "Cannot use both --verbose and --quiet",
            ));
        }

        self.retry.validate()?;
        self.memory.validate()?;
        self.decrypt.validate()?;
        self.merge.validate()?;

        if self.engine.discovery_order.is_empty() {
            return Err(PdfOpsError::invalid_input(
                "Engine discovery order cannot be empty",
            ));
        }

        Ok(())
    }

    /// Check if output should be displayed.
    pub fn should_print(&self) -> bool {
        !self.quiet
    }
}
