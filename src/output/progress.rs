//! Progress reporting for long-running operations.
//!
//! Operations emit [`ProgressEvent`]s into a [`ProgressSink`]. Text sinks
//! receive one human-readable line per event, for example:
//!
//! ```text
//! attempting <empty> (1/20)
//! attempting letmein (2/20)
//! merging batch 1/4 into out.pdf.batch_0.pdf
//! ```

use parking_lot::Mutex;
use std::fmt;
use std::io::Write;
use std::path::Path;

/// Something worth telling the user while an operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent<'a> {
    /// A candidate password is about to be tried. `current` is 1-based.
    PasswordAttempt {
        /// Position of this candidate.
        current: usize,
        /// Candidates that will be tried at most.
        total: usize,
        /// The candidate.
        candidate: &'a str,
    },
    /// A chunk of inputs is about to be merged into a batch file.
    /// `index` is 0-based.
    MergeBatch {
        /// Chunk index.
        index: usize,
        /// Number of chunks.
        total: usize,
        /// Batch file being written.
        output: &'a Path,
    },
    /// The final merge is about to run.
    FinalMerge {
        /// Files handed to the engine.
        inputs: usize,
        /// Output being written.
        output: &'a Path,
    },
}

impl fmt::Display for ProgressEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PasswordAttempt {
                current,
                total,
                candidate,
            } => {
                let shown = if candidate.is_empty() { "<empty>" } else { candidate };
                write!(f, "attempting {shown} ({current}/{total})")
            }
            Self::MergeBatch {
                index,
                total,
                output,
            } => write!(
                f,
                "merging batch {}/{total} into {}",
                index + 1,
                output.display()
            ),
            Self::FinalMerge { inputs, output } => {
                write!(f, "merging {inputs} file(s) into {}", output.display())
            }
        }
    }
}

/// Receiver of progress events.
pub trait ProgressSink: Send + Sync {
    /// Handle one event.
    fn report(&self, event: &ProgressEvent<'_>);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent<'_>) + Send + Sync,
{
    fn report(&self, event: &ProgressEvent<'_>) {
        self(event)
    }
}

/// Writes each event as a line of text.
#[derive(Debug)]
pub struct LineSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> LineSink<W> {
    /// Sink writing into `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl LineSink<std::io::Stderr> {
    /// Sink writing to standard error.
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write + Send> ProgressSink for LineSink<W> {
    fn report(&self, event: &ProgressEvent<'_>) {
        let mut writer = self.writer.lock();
        // Progress output is best-effort.
        let _ = writeln!(writer, "{event}");
        let _ = writer.flush();
    }
}

/// Keeps every line in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines received so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl ProgressSink for MemorySink {
    fn report(&self, event: &ProgressEvent<'_>) {
        self.lines.lock().push(event.to_string());
    }
}
