//! Process memory polling.
//!
//! The monitor compares a [`MemoryProbe`] reading against two levels: above
//! the soft threshold (`gc_threshold` of `max_bytes`) it asks the probe to
//! reclaim, and if usage is still above `max_bytes` afterwards it reports a
//! Memory error.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::MemoryConfig;
use crate::error::{PdfOpsError, Result};
use crate::utils::format_file_size;

/// Source of allocated-bytes readings.
pub trait MemoryProbe: Send + Sync + fmt::Debug {
    /// Bytes currently allocated by the process.
    fn allocated_bytes(&self) -> u64;

    /// Ask the process to give memory back.
    fn reclaim(&self);
}

/// Reads the resident set size of the current process.
///
/// Uses the `VmRSS` line of `/proc/self/status`, which the kernel reports in
/// kB whatever the page size; reports 0 where that file does not exist.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessMemory;

impl MemoryProbe for ProcessMemory {
    fn allocated_bytes(&self) -> u64 {
        std::fs::read_to_string("/proc/self/status")
            .ok()
            .and_then(|status| parse_status_rss(&status))
            .unwrap_or(0)
    }

    fn reclaim(&self) {
        // Freed memory goes straight back to the allocator; nothing to run.
        debug!("reclaim requested");
    }
}

/// Resident bytes from a `/proc/<pid>/status` document.
fn parse_status_rss(status: &str) -> Option<u64> {
    let line = status.lines().find(|line| line.starts_with("VmRSS:"))?;
    let mut fields = line["VmRSS:".len()..].split_whitespace();
    let value: u64 = fields.next()?.parse().ok()?;
    match fields.next() {
        Some(unit) if unit.eq_ignore_ascii_case("kb") => Some(value * 1024),
        Some(unit) if unit.eq_ignore_ascii_case("mb") => Some(value * 1024 * 1024),
        Some(_) => None,
        None => Some(value),
    }
}

/// Snapshot of memory usage against the configured limit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryUsage {
    /// Bytes allocated.
    pub allocated: u64,
    /// Configured hard limit.
    pub max: u64,
}

impl MemoryUsage {
    /// Fraction of the limit in use.
    pub fn ratio(&self) -> f64 {
        if self.max == 0 {
            0.0
        } else {
            self.allocated as f64 / self.max as f64
        }
    }
}

impl fmt::Display for MemoryUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} ({:.1}%)",
            format_file_size(self.allocated),
            format_file_size(self.max),
            self.ratio() * 100.0
        )
    }
}

/// Checks memory usage against a [`MemoryConfig`].
#[derive(Debug, Clone)]
pub struct MemoryMonitor {
    config: MemoryConfig,
    probe: Arc<dyn MemoryProbe>,
}

impl MemoryMonitor {
    /// Monitor reading from `probe`.
    pub fn new(config: MemoryConfig, probe: Arc<dyn MemoryProbe>) -> Self {
        Self { config, probe }
    }

    /// Monitor reading the current process.
    pub fn for_process(config: MemoryConfig) -> Self {
        Self::new(config, Arc::new(ProcessMemory))
    }

    /// Settings in use.
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Probe in use.
    pub fn probe(&self) -> Arc<dyn MemoryProbe> {
        Arc::clone(&self.probe)
    }

    /// Current usage.
    pub fn usage(&self) -> MemoryUsage {
        MemoryUsage {
            allocated: self.probe.allocated_bytes(),
            max: self.config.max_bytes,
        }
    }

    /// Ask the probe to reclaim and return the usage afterwards.
    pub fn force_reclaim(&self) -> MemoryUsage {
        self.probe.reclaim();
        self.usage()
    }

    /// Check usage, reclaiming above the soft threshold.
    ///
    /// # Errors
    ///
    /// Returns a Memory error when usage is above the hard limit after the
    /// reclaim.
    pub fn check(&self) -> Result<()> {
        let mut usage = self.usage();
        if usage.allocated >= self.config.gc_threshold_bytes() {
            debug!(%usage, "above reclaim threshold");
            usage = self.force_reclaim();
        }

        if usage.allocated > self.config.max_bytes {
            warn!(%usage, "memory limit exceeded");
            return Err(PdfOpsError::memory(format!("memory limit exceeded: {usage}")));
        }
        Ok(())
    }
}
