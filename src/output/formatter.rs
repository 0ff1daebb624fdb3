//! Message formatting and display.
//!
//! [`OutputFormatter`] is the only place the binary writes user-facing text.
//! It honours quiet and verbose modes and colours the prefix when writing to
//! a terminal.
//!
//! ```
//! use pdfops::output::OutputFormatter;
//!
//! let formatter = OutputFormatter::new(false, false);
//! formatter.info("Merging 3 files");
//! formatter.success("Wrote merged.pdf");
//! ```

use parking_lot::Mutex;
use std::io::{self, Write};

use crate::config::Config;

/// Level of output message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    /// Informational message.
    Info,
    /// Success message.
    Success,
    /// Warning message.
    Warning,
    /// Error message.
    Error,
    /// Debug/verbose message.
    Debug,
}

impl MessageLevel {
    fn prefix(self) -> &'static str {
        match self {
            Self::Info => "",
            Self::Success => "✓ ",
            Self::Warning => "⚠ ",
            Self::Error => "✗ ",
            Self::Debug => "→ ",
        }
    }

    fn color(self) -> Option<&'static str> {
        match self {
            Self::Info => None,
            Self::Success => Some("\x1b[32m"),
            Self::Warning => Some("\x1b[33m"),
            Self::Error => Some("\x1b[31m"),
            Self::Debug => Some("\x1b[36m"),
        }
    }
}

/// Output formatter with configurable verbosity.
pub struct OutputFormatter {
    quiet: bool,
    verbose: bool,
    colored: bool,
    out: Mutex<Box<dyn Write + Send>>,
}

impl OutputFormatter {
    /// Formatter writing to standard output.
    pub fn new(quiet: bool, verbose: bool) -> Self {
        Self {
            quiet,
            verbose,
            colored: Self::should_use_color(),
            out: Mutex::new(Box::new(io::stdout())),
        }
    }

    /// Formatter writing uncoloured text into `writer`.
    pub fn to_writer(quiet: bool, verbose: bool, writer: impl Write + Send + 'static) -> Self {
        Self {
            quiet,
            verbose,
            colored: false,
            out: Mutex::new(Box::new(writer)),
        }
    }

    /// Create a formatter from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.quiet, config.verbose)
    }

    /// Returns true if stdout is a TTY and TERM is set.
    fn should_use_color() -> bool {
        use std::io::IsTerminal;
        io::stdout().is_terminal() && std::env::var("TERM").is_ok()
    }

    /// Print an informational message. Suppressed in quiet mode.
    pub fn info(&self, message: &str) {
        if !self.quiet {
            self.print_message(MessageLevel::Info, message);
        }
    }

    /// Print a success message. Suppressed in quiet mode.
    pub fn success(&self, message: &str) {
        if !self.quiet {
            self.print_message(MessageLevel::Success, message);
        }
    }

    /// Print a warning message. Always displayed.
    pub fn warning(&self, message: &str) {
        self.print_message(MessageLevel::Warning, message);
    }

    /// Print an error message. Always displayed.
    pub fn error(&self, message: &str) {
        self.print_message(MessageLevel::Error, message);
    }

    /// Print a debug message. Only displayed in verbose mode.
    pub fn debug(&self, message: &str) {
        if self.verbose {
            self.print_message(MessageLevel::Debug, message);
        }
    }

    fn print_message(&self, level: MessageLevel, message: &str) {
        let prefix = level.prefix();
        match level.color() {
            Some(color) if self.colored => self.write_line(&format!("{color}{prefix}{message}\x1b[0m")),
            _ => self.write_line(&format!("{prefix}{message}")),
        }
    }

    /// Print a section header. Suppressed in quiet mode.
    pub fn section(&self, title: &str) {
        if !self.quiet {
            self.write_line(&format!("\n{title}"));
        }
    }

    /// Print a `label: value` line. Suppressed in quiet mode.
    pub fn field(&self, label: &str, value: &str) {
        if !self.quiet {
            self.write_line(&format!("  {label}: {value}"));
        }
    }

    /// Print a `label: value` line. Only displayed in verbose mode.
    pub fn detail(&self, label: &str, value: &str) {
        if self.verbose {
            self.write_line(&format!("  {label}: {value}"));
        }
    }

    /// Print a numbered list item. Suppressed in quiet mode.
    pub fn list_item(&self, index: usize, message: &str) {
        if !self.quiet {
            self.write_line(&format!("  {index}. {message}"));
        }
    }

    /// Print pre-formatted text verbatim. Suppressed in quiet mode.
    pub fn raw(&self, text: &str) {
        if !self.quiet {
            self.write_line(text.trim_end_matches('\n'));
        }
    }

    fn write_line(&self, line: &str) {
        let mut out = self.out.lock();
        // Console output is best-effort; a closed pipe must not abort work.
        let _ = writeln!(out, "{line}");
        let _ = out.flush();
    }

    /// Check if non-error output is shown.
    pub fn should_print(&self) -> bool {
        !self.quiet
    }

    /// Check if verbose output is shown.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Check if quiet mode is enabled.
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }
}

impl Default for OutputFormatter {
    fn default() -> Self {
        Self::new(false, false)
    }
}

impl std::fmt::Debug for OutputFormatter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputFormatter")
            .field("quiet", &self.quiet)
            .field("verbose", &self.verbose)
            .field("colored", &self.colored)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Arc;

    /// Shared in-memory writer for capturing formatter output.
    #[derive(Clone, Default)]
    pub(crate) struct Capture(pub(crate) Arc<Mutex<Vec<u8>>>);

    impl Capture {
        pub(crate) fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_normal_mode() {
        let capture = Capture::default();
        let formatter = OutputFormatter::to_writer(false, false, capture.clone());
        formatter.info("plain");
        formatter.success("done");
        formatter.debug("hidden");

        assert_eq!(capture.text(), "plain\n✓ done\n");
        assert!(formatter.should_print());
    }

    #[test]
    fn test_quiet_mode_keeps_warnings_and_errors() {
        let capture = Capture::default();
        let formatter = OutputFormatter::to_writer(true, false, capture.clone());
        formatter.info("suppressed");
        formatter.field("Pages", "3");
        formatter.warning("careful");
        formatter.error("broken");

        assert_eq!(capture.text(), "⚠ careful\n✗ broken\n");
        assert!(formatter.is_quiet());
    }

    #[test]
    fn test_verbose_mode_shows_details() {
        let capture = Capture::default();
        let formatter = OutputFormatter::to_writer(false, true, capture.clone());
        formatter.detail("Engine", "lopdf 0.38 (library)");
        formatter.debug("probing");
        formatter.list_item(2, "b.pdf");

        assert_eq!(
            capture.text(),
            "  Engine: lopdf 0.38 (library)\n→ probing\n  2. b.pdf\n"
        );
    }
}
