//! `rxweave patch`: write one patch module per reactive class.
//!
//! Every module is applied to the unpatched class before it is written, so
//! a module on disk always fits its declaration.

use super::Session;
use crate::config::Backend;
use crate::pipeline::{process_all, write_artifacts, Mode, WriteStats};
use rxweave_syntax::ReactiveConventions;
use std::path::{Path, PathBuf};

/// Returns whether any file had errors.
pub fn execute(
    session: &mut Session,
    inputs: &[PathBuf],
    conventions: &ReactiveConventions,
    out_dir: &Path,
    skip_unchanged: bool,
    dump: bool,
) -> anyhow::Result<bool> {
    let reports = process_all(inputs, conventions, Mode::Emit(Backend::Patch), session.jobs)?;
    let (errors, warnings) = session.report(&reports)?;

    if dump {
        for artifact in reports.iter().flat_map(|r| &r.artifacts) {
            if let Some(listing) = &artifact.listing {
                print!("{}", listing);
            }
        }
    } else {
        let mut stats = WriteStats::default();
        for report in &reports {
            let written = write_artifacts(out_dir, &report.artifacts, skip_unchanged)?;
            stats.written += written.written;
            stats.unchanged += written.unchanged;
            for artifact in &report.artifacts {
                session.out.status("Patched", &artifact.file_name);
            }
        }
        if stats.unchanged > 0 {
            session.out.skipped(&format!("{} file(s) already up to date", stats.unchanged));
        }
    }
    session.out.summary(errors, warnings);
    Ok(errors > 0)
}
