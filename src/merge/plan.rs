//! Merge planning.
//!
//! A plan is the tree of engine merge calls needed for `n` inputs at batch
//! size `B`: one direct call when `n <= B`, otherwise `ceil(n / B)` batch
//! calls followed by one final call over the batch files. Inputs are never
//! reordered.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::{PdfOpsError, Result};

/// One intermediate merge of a batched plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchStep {
    /// Zero-based chunk index.
    pub index: usize,
    /// Consecutive slice of the inputs.
    pub inputs: Vec<PathBuf>,
    /// Intermediate file, see [`batch_path`].
    pub output: PathBuf,
}

/// Engine calls that turn the inputs into the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergePlan {
    /// Every input fits into one engine call.
    Direct {
        /// Inputs in order.
        inputs: Vec<PathBuf>,
        /// Final output.
        output: PathBuf,
    },
    /// Chunks merged into batch files, then the batch files merged.
    Batched {
        /// Chunk merges in order.
        batches: Vec<BatchStep>,
        /// Batch files fed to the final merge, in chunk order.
        final_inputs: Vec<PathBuf>,
        /// Final output.
        output: PathBuf,
    },
}

impl MergePlan {
    /// Plan the merge of `inputs` into `output`.
    ///
    /// # Errors
    ///
    /// InvalidFile for an empty input list, InvalidInput for a batch size
    /// below 2.
    pub fn build(inputs: &[PathBuf], output: &Path, batch_size: usize) -> Result<Self> {
        if inputs.is_empty() {
            return Err(PdfOpsError::invalid_file("no files to merge"));
        }
        if batch_size < 2 {
            return Err(PdfOpsError::invalid_input(format!(
                "Merge batch size must be at least 2, got {batch_size}"
            )));
        }

        if inputs.len() <= batch_size {
            return Ok(Self::Direct {
                inputs: inputs.to_vec(),
                output: output.to_path_buf(),
            });
        }

        let batches: Vec<BatchStep> = inputs
            .chunks(batch_size)
            .enumerate()
            .map(|(index, chunk)| BatchStep {
                index,
                inputs: chunk.to_vec(),
                output: batch_path(output, index),
            })
            .collect();
        let final_inputs = batches.iter().map(|b| b.output.clone()).collect();

        Ok(Self::Batched {
            batches,
            final_inputs,
            output: output.to_path_buf(),
        })
    }

    /// Number of engine merge calls the plan makes.
    pub fn engine_calls(&self) -> usize {
        match self {
            Self::Direct { .. } => 1,
            Self::Batched { batches, .. } => batches.len() + 1,
        }
    }

    /// Number of intermediate batch files.
    pub fn batch_count(&self) -> usize {
        match self {
            Self::Direct { .. } => 0,
            Self::Batched { batches, .. } => batches.len(),
        }
    }

    /// Final output.
    pub fn output(&self) -> &Path {
        match self {
            Self::Direct { output, .. } | Self::Batched { output, .. } => output,
        }
    }
}

/// Intermediate file for chunk `index`: `<output>.batch_<index>.pdf`.
pub fn batch_path(output: &Path, index: usize) -> PathBuf {
    let mut name = OsString::from(output.as_os_str());
    name.push(format!(".batch_{index}.pdf"));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn inputs(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("in_{i}.pdf"))).collect()
    }

    #[rstest(
        n, batch, calls,
        case(1, 2, 1),
        case(3, 3, 1),
        case(4, 3, 3),
        case(10, 3, 5),
        case(100, 50, 3),
        case(101, 50, 4)
    )]
    fn test_engine_call_count(n: usize, batch: usize, calls: usize) {
        let plan = MergePlan::build(&inputs(n), Path::new("out.pdf"), batch).unwrap();
        assert_eq!(plan.engine_calls(), calls);
    }

    #[test]
    fn test_batched_plan_keeps_order() {
        let all = inputs(10);
        let plan = MergePlan::build(&all, Path::new("/tmp/out.pdf"), 3).unwrap();

        let MergePlan::Batched { batches, final_inputs, .. } = &plan else {
            panic!("expected a batched plan");
        };
        let flattened: Vec<PathBuf> = batches.iter().flat_map(|b| b.inputs.clone()).collect();
        assert_eq!(flattened, all);
        assert_eq!(batches.last().unwrap().inputs.len(), 1);
        assert_eq!(
            final_inputs,
            &vec![
                PathBuf::from("/tmp/out.pdf.batch_0.pdf"),
                PathBuf::from("/tmp/out.pdf.batch_1.pdf"),
                PathBuf::from("/tmp/out.pdf.batch_2.pdf"),
                PathBuf::from("/tmp/out.pdf.batch_3.pdf"),
            ]
        );
    }

    #[test]
    fn test_empty_inputs() {
        let err = MergePlan::build(&[], Path::new("out.pdf"), 3).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidFile);
        assert_eq!(err.message(), "no files to merge");
    }

    #[test]
    fn test_batch_size_too_small() {
        let err = MergePlan::build(&inputs(3), Path::new("out.pdf"), 1).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidInput);
    }
}
