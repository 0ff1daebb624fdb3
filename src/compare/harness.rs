//! A/B comparison of two engines on the same operation.
//!
//! The harness runs the operation against engine A, then engine B, in the
//! same process. Around each run it forces a reclaim and samples allocated
//! bytes, so the recorded `delta_alloc` is a coarse proxy for what the run
//! allocated, not a peak.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

use crate::cancel::CancelToken;
use crate::engine::PdfEngine;
use crate::error::Result;
use crate::recovery::MemoryProbe;

/// Test grouping derived from the test name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Merge,
    Decrypt,
    Write,
    Performance,
    Other,
}

impl Category {
    /// Categories matched by name, in matching order.
    pub const MATCHED: [Category; 4] = [Self::Merge, Self::Decrypt, Self::Write, Self::Performance];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Decrypt => "decrypt",
            Self::Write => "write",
            Self::Performance => "performance",
            Self::Other => "other",
        }
    }

    /// First category whose name occurs in `test_name`, ignoring case.
    pub fn classify(test_name: &str) -> Self {
        let lower = test_name.to_lowercase();
        Self::MATCHED
            .into_iter()
            .find(|c| lower.contains(c.as_str()))
            .unwrap_or(Self::Other)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which engine a comparison favours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    A,
    B,
    Tie,
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::A => "A",
            Self::B => "B",
            Self::Tie => "tie",
        })
    }
}

/// Measurements of one engine run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Engine name.
    pub engine: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Wall-clock time of the operation.
    pub duration: Duration,
    /// Allocated bytes after minus before, floored at zero.
    pub delta_alloc: u64,
    pub success: bool,
    pub error: Option<String>,
}

/// Both runs of one test and their verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub test_name: String,
    pub category: Category,
    pub a: RunResult,
    pub b: RunResult,
    /// `(t_B - t_A) / t_B * 100`; positive when A is faster.
    pub performance_gain: f64,
    /// `(m_B - m_A) / m_B * 100`; positive when A allocates less.
    pub memory_reduction: f64,
    pub score_a: f64,
    pub score_b: f64,
    pub winner: Winner,
}

impl Comparison {
    /// Build the verdict for two runs.
    pub fn new(test_name: impl Into<String>, a: RunResult, b: RunResult) -> Self {
        let test_name = test_name.into();
        let performance_gain = percent_less(a.duration.as_secs_f64(), b.duration.as_secs_f64());
        let memory_reduction = percent_less(a.delta_alloc as f64, b.delta_alloc as f64);
        let (score_a, score_b, winner) = score(&a, &b, performance_gain, memory_reduction);

        Self {
            category: Category::classify(&test_name),
            test_name,
            a,
            b,
            performance_gain,
            memory_reduction,
            score_a,
            score_b,
            winner,
        }
    }

    /// When the comparison was recorded.
    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.b.finished_at.max(self.a.finished_at)
    }
}

fn percent_less(a: f64, b: f64) -> f64 {
    if b > 0.0 { (b - a) / b * 100.0 } else { 0.0 }
}

/// Score two runs: 10 for success, up to 20 for being faster, up to 10 for
/// allocating less. Returns `(score_a, score_b, winner)`.
pub fn score(a: &RunResult, b: &RunResult, performance_gain: f64, memory_reduction: f64) -> (f64, f64, Winner) {
    let mut score_a = 0.0;
    let mut score_b = 0.0;

    if a.success {
        score_a += 10.0;
    }
    if b.success {
        score_b += 10.0;
    }

    let speed = performance_gain.abs().min(20.0);
    if a.duration < b.duration {
        score_a += speed;
    } else if b.duration < a.duration {
        score_b += speed;
    }

    let lean = (memory_reduction.abs() / 10.0).min(10.0);
    if a.delta_alloc < b.delta_alloc {
        score_a += lean;
    } else if b.delta_alloc < a.delta_alloc {
        score_b += lean;
    }

    let winner = if score_a > score_b {
        Winner::A
    } else if score_b > score_a {
        Winner::B
    } else {
        Winner::Tie
    };
    (score_a, score_b, winner)
}

/// Runs operations against two engines and keeps the comparisons.
pub struct AbHarness {
    engine_a: Arc<dyn PdfEngine>,
    engine_b: Arc<dyn PdfEngine>,
    probe: Arc<dyn MemoryProbe>,
    results: Mutex<BTreeMap<String, Comparison>>,
}

impl AbHarness {
    pub fn new(engine_a: Arc<dyn PdfEngine>, engine_b: Arc<dyn PdfEngine>, probe: Arc<dyn MemoryProbe>) -> Self {
        Self {
            engine_a,
            engine_b,
            probe,
            results: Mutex::new(BTreeMap::new()),
        }
    }

    /// Run `op` against A and then B and record the comparison under
    /// `test_name`, replacing an earlier one of the same name.
    ///
    /// # Errors
    ///
    /// Only cancellation, checked before A and between the two runs. A
    /// failing operation is recorded in the comparison, not returned.
    #[instrument(skip(self, op, cancel))]
    pub async fn run<F, Fut>(&self, test_name: &str, mut op: F, cancel: &CancelToken) -> Result<Comparison>
    where
        F: FnMut(Arc<dyn PdfEngine>) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        cancel.check()?;
        let a = self.measure(Arc::clone(&self.engine_a), &mut op).await;
        cancel.check()?;
        let b = self.measure(Arc::clone(&self.engine_b), &mut op).await;

        let comparison = Comparison::new(test_name, a, b);
        info!(
            winner = %comparison.winner,
            gain = comparison.performance_gain,
            "comparison recorded"
        );
        self.results
            .lock()
            .insert(test_name.to_string(), comparison.clone());
        Ok(comparison)
    }

    async fn measure<F, Fut>(&self, engine: Arc<dyn PdfEngine>, op: &mut F) -> RunResult
    where
        F: FnMut(Arc<dyn PdfEngine>) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let name = engine.name().to_string();

        self.probe.reclaim();
        let before = self.probe.allocated_bytes();
        let started_at = Utc::now();
        let clock = Instant::now();

        let outcome = op(engine).await;

        let duration = clock.elapsed();
        let finished_at = Utc::now();
        self.probe.reclaim();
        let after = self.probe.allocated_bytes();

        debug!(engine = %name, ?duration, before, after, "run measured");
        RunResult {
            engine: name,
            started_at,
            finished_at,
            duration,
            delta_alloc: after.saturating_sub(before),
            success: outcome.is_ok(),
            error: outcome.err().map(|e| e.to_string()),
        }
    }

    /// Every comparison recorded so far, keyed by test name.
    pub fn results(&self) -> BTreeMap<String, Comparison> {
        self.results.lock().clone()
    }

    /// Add comparisons recorded earlier, e.g. loaded from a results file.
    pub fn extend_results(&self, results: BTreeMap<String, Comparison>) {
        self.results.lock().extend(results);
    }
}
