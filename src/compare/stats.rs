//! Aggregates over recorded comparisons.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;

use super::harness::{Category, Comparison, Winner};

/// Wins and average gains of one category.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryStats {
    pub total: usize,
    pub wins_a: usize,
    pub wins_b: usize,
    pub ties: usize,
    pub avg_performance_gain: f64,
    pub avg_memory_reduction: f64,
}

/// Summary of a result set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComparisonStats {
    pub total: usize,
    pub wins_a: usize,
    pub wins_b: usize,
    pub ties: usize,
    pub successes_a: usize,
    pub successes_b: usize,
    pub avg_performance_gain: f64,
    pub avg_memory_reduction: f64,
    pub categories: BTreeMap<Category, CategoryStats>,
    /// Earliest recorded comparison.
    pub first: Option<DateTime<Utc>>,
    /// Latest recorded comparison.
    pub last: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Tally {
    total: usize,
    wins_a: usize,
    wins_b: usize,
    ties: usize,
    gain_sum: f64,
    reduction_sum: f64,
}

impl Tally {
    fn add(&mut self, cmp: &Comparison) {
        self.total += 1;
        match cmp.winner {
            Winner::A => self.wins_a += 1,
            Winner::B => self.wins_b += 1,
            Winner::Tie => self.ties += 1,
        }
        self.gain_sum += cmp.performance_gain;
        self.reduction_sum += cmp.memory_reduction;
    }

    fn average(sum: f64, n: usize) -> f64 {
        if n == 0 { 0.0 } else { sum / n as f64 }
    }

    fn into_category(self) -> CategoryStats {
        CategoryStats {
            avg_performance_gain: Self::average(self.gain_sum, self.total),
            avg_memory_reduction: Self::average(self.reduction_sum, self.total),
            total: self.total,
            wins_a: self.wins_a,
            wins_b: self.wins_b,
            ties: self.ties,
        }
    }
}

impl ComparisonStats {
    /// Aggregate `results`.
    pub fn from_results(results: &BTreeMap<String, Comparison>) -> Self {
        let mut overall = Tally::default();
        let mut per_category: BTreeMap<Category, Tally> = BTreeMap::new();
        let mut stats = Self::default();

        for cmp in results.values() {
            overall.add(cmp);
            per_category.entry(cmp.category).or_default().add(cmp);

            stats.successes_a += usize::from(cmp.a.success);
            stats.successes_b += usize::from(cmp.b.success);

            let at = cmp.recorded_at();
            stats.first = Some(stats.first.map_or(at, |t| t.min(at)));
            stats.last = Some(stats.last.map_or(at, |t| t.max(at)));
        }

        let categories = per_category
            .into_iter()
            .map(|(category, tally)| (category, tally.into_category()))
            .collect();
        let summary = overall.into_category();

        Self {
            total: summary.total,
            wins_a: summary.wins_a,
            wins_b: summary.wins_b,
            ties: summary.ties,
            avg_performance_gain: summary.avg_performance_gain,
            avg_memory_reduction: summary.avg_memory_reduction,
            categories,
            ..stats
        }
    }

    /// Human-readable table.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Comparisons: {}", self.total);
        let _ = writeln!(
            out,
            "Wins: A {}  B {}  tie {}",
            self.wins_a, self.wins_b, self.ties
        );
        let _ = writeln!(
            out,
            "Successes: A {}/{}  B {}/{}",
            self.successes_a, self.total, self.successes_b, self.total
        );
        let _ = writeln!(
            out,
            "Average gain: {:.1}% time, {:.1}% memory",
            self.avg_performance_gain, self.avg_memory_reduction
        );
        if let (Some(first), Some(last)) = (self.first, self.last) {
            let _ = writeln!(
                out,
                "Period: {} .. {}",
                first.format("%Y-%m-%d %H:%M:%S"),
                last.format("%Y-%m-%d %H:%M:%S")
            );
        }

        if !self.categories.is_empty() {
            let _ = writeln!(
                out,
                "\n{:<12} {:>5} {:>5} {:>5} {:>5} {:>9} {:>9}",
                "category", "runs", "A", "B", "tie", "time %", "mem %"
            );
            for (category, stats) in &self.categories {
                let _ = writeln!(
                    out,
                    "{:<12} {:>5} {:>5} {:>5} {:>5} {:>9.1} {:>9.1}",
                    category.as_str(),
                    stats.total,
                    stats.wins_a,
                    stats.wins_b,
                    stats.ties,
                    stats.avg_performance_gain,
                    stats.avg_memory_reduction
                );
            }
        }
        out
    }
}
