//! File-level compilation pipeline shared by the subcommands.
//!
//! Each declaration file is parsed, analyzed and (optionally) emitted on its
//! own; files are spread over a scoped worker pool and reported in input
//! order.

use crate::config::Backend;
use anyhow::{bail, Context};
use codespan_reporting::files::SimpleFiles;
use rxweave_checker::{create_files, Analyzer, ClassModel, Diagnostic};
use rxweave_compiler::{compile_patch, compile_source, PatchModule, PrettyPrint};
use rxweave_runtime::patched_image;
use rxweave_syntax::{DeclarationSet, ReactiveConventions, SymbolTable};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Extension of patch module files
pub const PATCH_EXTENSION: &str = "rxpatch";

/// What to produce for each analyzed class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Analysis only
    Check,
    Emit(Backend),
}

/// One generated output file.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Namespace-qualified class name
    pub class: String,
    pub file_name: String,
    pub contents: String,
    /// Instruction listing, for patch modules
    pub listing: Option<String>,
}

/// Outcome of processing one declaration file.
pub struct FileReport {
    pub path: PathBuf,
    pub files: SimpleFiles<String, String>,
    pub diagnostics: Vec<Diagnostic>,
    pub errors: usize,
    pub warnings: usize,
    pub artifacts: Vec<Artifact>,
}

impl FileReport {
    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

/// Files written or left alone by [`write_artifacts`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriteStats {
    pub written: usize,
    pub unchanged: usize,
}

/// Expand glob patterns to declaration files, sorted and deduplicated.
/// A pattern without glob metacharacters must name an existing file.
pub fn discover_inputs(patterns: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for pattern in patterns {
        if !pattern.contains(['*', '?', '[']) {
            let path = PathBuf::from(pattern);
            if !path.is_file() {
                bail!("input '{}' does not exist", pattern);
            }
            paths.push(path);
            continue;
        }
        let matches = glob::glob(pattern).with_context(|| format!("invalid glob pattern '{}'", pattern))?;
        for entry in matches {
            let path = entry.with_context(|| format!("cannot read match of '{}'", pattern))?;
            if path.is_file() {
                paths.push(path);
            }
        }
    }
    paths.sort();
    paths.dedup();
    tracing::debug!(count = paths.len(), "inputs discovered");
    Ok(paths)
}

/// Parse, analyze and emit one file.
pub fn process_file(path: &Path, conventions: &ReactiveConventions, mode: Mode) -> anyhow::Result<FileReport> {
    let source = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let display = path.display().to_string();
    let files = create_files(display.clone(), source.clone());

    let set = match DeclarationSet::parse(display, source) {
        Ok(set) => set.with_conventions(conventions.clone()),
        Err(err) => {
            let diagnostics = Diagnostic::from_syntax_error(&err, 0);
            return Ok(FileReport {
                path: path.to_path_buf(),
                files,
                errors: diagnostics.len(),
                warnings: 0,
                diagnostics,
                artifacts: Vec::new(),
            });
        }
    };

    let analysis = Analyzer::new().analyze(&set);
    let (mut errors, warnings) = analysis.reporter.counts();
    let mut diagnostics = analysis.reporter.diagnostics(0);

    let mut artifacts = Vec::new();
    if let Mode::Emit(backend) = mode {
        for model in &analysis.models {
            let result = match backend {
                Backend::Source => source_artifact(model),
                Backend::Patch => patch_artifact(model, &set),
            };
            match result {
                Ok(artifact) => artifacts.push(artifact),
                Err(err) => {
                    let reason = format!("{:#}", err);
                    tracing::warn!(class = %model.full_name(), %reason, "class skipped");
                    diagnostics.push(Diagnostic::from_emit_failure(&model.full_name(), &reason, model.span, 0));
                    errors += 1;
                }
            }
        }
    }

    Ok(FileReport {
        path: path.to_path_buf(),
        files,
        diagnostics,
        errors,
        warnings,
        artifacts,
    })
}

fn source_artifact(model: &ClassModel) -> anyhow::Result<Artifact> {
    let unit = compile_source(model).with_context(|| format!("failed to generate {}", model.full_name()))?;
    Ok(Artifact {
        class: unit.class,
        file_name: unit.file_name,
        contents: unit.text,
        listing: None,
    })
}

/// Build the patch module and prove it applies to the unpatched class.
fn patch_artifact(model: &ClassModel, set: &DeclarationSet) -> anyhow::Result<Artifact> {
    let module = compile_patch(model).with_context(|| format!("failed to lower {}", model.full_name()))?;
    let class = set
        .class(&model.name)
        .with_context(|| format!("class {} vanished from its declarations", model.name))?;
    patched_image(class, set.conventions(), &module)
        .with_context(|| format!("patch for {} does not apply", model.full_name()))?;

    Ok(Artifact {
        class: model.full_name(),
        file_name: patch_file_name(model),
        contents: module.to_json()?,
        listing: Some(module.pretty_print()),
    })
}

/// `{Namespace.Class}.rxpatch`, generic brackets as braces.
pub fn patch_file_name(model: &ClassModel) -> String {
    let name: String = model
        .full_name()
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            '<' => '{',
            '>' => '}',
            other => other,
        })
        .collect();
    format!("{}.{}", name, PATCH_EXTENSION)
}

/// Read a patch module back from disk.
pub fn read_patch(path: &Path) -> anyhow::Result<PatchModule> {
    let json = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(PatchModule::from_json(&json)?)
}

/// Process every file on a pool of `jobs` workers, keeping input order.
pub fn process_all(
    paths: &[PathBuf],
    conventions: &ReactiveConventions,
    mode: Mode,
    jobs: usize,
) -> anyhow::Result<Vec<FileReport>> {
    let jobs = jobs.clamp(1, paths.len().max(1));
    let next = AtomicUsize::new(0);
    let slots: Vec<Mutex<Option<anyhow::Result<FileReport>>>> = paths.iter().map(|_| Mutex::new(None)).collect();

    crossbeam::scope(|scope| {
        for _ in 0..jobs {
            scope.spawn(|_| loop {
                let index = next.fetch_add(1, Ordering::Relaxed);
                let Some(path) = paths.get(index) else {
                    break;
                };
                let result = process_file(path, conventions, mode);
                if let Ok(mut slot) = slots[index].lock() {
                    *slot = Some(result);
                }
            });
        }
    })
    .map_err(|_| anyhow::anyhow!("a worker thread panicked"))?;

    slots
        .into_iter()
        .zip(paths)
        .map(|(slot, path)| {
            slot.into_inner()
                .map_err(|_| anyhow::anyhow!("result for {} was poisoned", path.display()))?
                .with_context(|| format!("{} was never processed", path.display()))?
        })
        .collect()
}

fn digest(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

/// Write artifacts under `out_dir`, leaving byte-identical files untouched
/// when `skip_unchanged` is set.
pub fn write_artifacts(out_dir: &Path, artifacts: &[Artifact], skip_unchanged: bool) -> anyhow::Result<WriteStats> {
    std::fs::create_dir_all(out_dir).with_context(|| format!("failed to create {}", out_dir.display()))?;
    let mut stats = WriteStats::default();
    for artifact in artifacts {
        let path = out_dir.join(&artifact.file_name);
        if skip_unchanged {
            if let Ok(existing) = std::fs::read(&path) {
                if digest(&existing) == digest(artifact.contents.as_bytes()) {
                    tracing::debug!(file = %path.display(), "unchanged, not rewritten");
                    stats.unchanged += 1;
                    continue;
                }
            }
        }
        std::fs::write(&path, &artifact.contents).with_context(|| format!("failed to write {}", path.display()))?;
        stats.written += 1;
    }
    Ok(stats)
}
