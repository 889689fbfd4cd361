//! Subcommand implementations.

pub mod check;
pub mod generate;
pub mod patch;

use crate::output::{Format, StyledOutput};
use crate::pipeline::FileReport;
use anyhow::Context;

/// Options shared by every subcommand
pub struct Session {
    pub out: StyledOutput,
    pub format: Format,
    pub jobs: usize,
}

impl Session {
    /// Print diagnostics for every report in order; returns `(errors, warnings)`.
    pub fn report(&mut self, reports: &[FileReport]) -> anyhow::Result<(usize, usize)> {
        let mut totals = (0, 0);
        for report in reports {
            totals.0 += report.errors;
            totals.1 += report.warnings;
            for diagnostic in &report.diagnostics {
                match self.format {
                    Format::Human => diagnostic
                        .emit_to(self.out.writer(), &report.files)
                        .with_context(|| format!("cannot render diagnostics for {}", report.path.display()))?,
                    Format::Json => println!("{}", diagnostic.to_json(&report.files)?),
                }
            }
        }
        Ok(totals)
    }
}
