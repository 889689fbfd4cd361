//! Shared colored output for CLI commands.
//!
//! Respects `NO_COLOR` and the `--color` flag.

use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Resolve `ColorChoice` from CLI flag and environment.
///
/// Priority: `NO_COLOR` env > `--color` flag > auto-detect TTY.
pub fn resolve_color_choice(flag: Option<&str>) -> ColorChoice {
    if std::env::var_os("NO_COLOR").is_some() {
        return ColorChoice::Never;
    }
    match flag {
        Some("always") => ColorChoice::Always,
        Some("never") => ColorChoice::Never,
        _ => ColorChoice::Auto,
    }
}

/// Diagnostic rendering format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    Human,
    Json,
}

/// Styled writer for status lines on stderr.
pub struct StyledOutput {
    stderr: StandardStream,
    quiet: bool,
}

impl StyledOutput {
    pub fn new(choice: ColorChoice, quiet: bool) -> Self {
        Self {
            stderr: StandardStream::stderr(choice),
            quiet,
        }
    }

    /// The underlying writer, for codespan rendering.
    pub fn writer(&mut self) -> &mut StandardStream {
        &mut self.stderr
    }

    fn line(&mut self, label: &str, color: Color, text: &str) {
        if self.quiet {
            return;
        }
        let mut spec = ColorSpec::new();
        spec.set_fg(Some(color)).set_bold(true);
        let _ = self.stderr.set_color(&spec);
        let _ = write!(self.stderr, "{:>10}", label);
        let _ = self.stderr.reset();
        let _ = writeln!(self.stderr, " {}", text);
    }

    /// `   Checked models.rxd`
    pub fn status(&mut self, label: &str, text: &str) {
        self.line(label, Color::Green, text);
    }

    pub fn skipped(&mut self, text: &str) {
        self.line("Unchanged", Color::Cyan, text);
    }

    /// Final error/warning tally. Always printed when there are errors.
    pub fn summary(&mut self, errors: usize, warnings: usize) {
        if errors == 0 && warnings == 0 {
            self.status("Finished", "no diagnostics");
            return;
        }
        let text = format!("{} error(s), {} warning(s)", errors, warnings);
        if errors > 0 {
            let quiet = std::mem::replace(&mut self.quiet, false);
            self.line("Failed", Color::Red, &text);
            self.quiet = quiet;
        } else {
            self.line("Finished", Color::Yellow, &text);
        }
    }

    pub fn flush(&mut self) {
        let _ = self.stderr.flush();
    }
}
