//! Merging of arbitrarily long input lists through bounded engine calls.

pub mod plan;
pub mod streaming;

pub use plan::{BatchStep, MergePlan, batch_path};
pub use streaming::{MergeReport, StreamingMerger};
