//! `rxweave check`: analyze and print diagnostics.

use super::Session;
use crate::pipeline::{process_all, Mode};
use rxweave_syntax::ReactiveConventions;
use std::path::PathBuf;

/// Returns whether any file had errors.
pub fn execute(session: &mut Session, inputs: &[PathBuf], conventions: &ReactiveConventions) -> anyhow::Result<bool> {
    let reports = process_all(inputs, conventions, Mode::Check, session.jobs)?;
    let (errors, warnings) = session.report(&reports)?;
    for report in &reports {
        session.out.status("Checked", &report.path.display().to_string());
    }
    session.out.summary(errors, warnings);
    Ok(errors > 0)
}
