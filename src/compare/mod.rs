//! Side-by-side comparison of two engines.

pub mod harness;
pub mod report;
pub mod stats;

pub use harness::{AbHarness, Category, Comparison, RunResult, Winner, score};
pub use report::{load_results, save_results};
pub use stats::{CategoryStats, ComparisonStats};
