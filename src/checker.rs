//! Run orchestration: two-pass analysis over a file or directory target.
//!
//! Pass 1 collects every callable declaration in the corpus into the
//! repository builder; only once all files are done is the builder sealed,
//! because a call in file A must resolve against a declaration in file B.
//! Pass 2 runs the detector over the corpus against the sealed repository.
//! Within each pass, per-file work is independent and runs on a rayon pool
//! for larger corpora; pass 1 merges per-file builders in a reduce step so
//! the repository write path needs no lock.
//!
//! Per-file read and parse failures are isolated: they are recorded as
//! diagnostics and the run continues. Only an invalid target path is
//! fatal. The final warning list is sorted by file then line, so identical
//! corpora always produce identical output.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::collector;
use crate::detector;
use crate::error::{RefScanError, Result};
use crate::php;
use crate::repository::{DeclarationRepository, RepositoryBuilder};
use crate::scanner::SourceScanner;
use crate::warning::{self, Warning};

/// Minimum corpus size before per-file work moves onto the rayon pool;
/// below this, thread coordination costs more than it saves.
const MIN_FILES_FOR_PARALLEL: usize = 15;

/// Options for a check run.
#[derive(Debug, Clone)]
pub struct CheckOptions {
    /// Bypass gitignore handling and default excludes during discovery.
    pub no_ignore: bool,
    /// Allow parallel per-file work within each pass.
    pub parallel: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            no_ignore: false,
            parallel: true,
        }
    }
}

/// A per-file failure that did not abort the run.
#[derive(Debug, Clone, Serialize)]
pub struct FileDiagnostic {
    /// File that could not be analyzed.
    pub path: PathBuf,
    /// Human-readable reason.
    pub message: String,
}

/// Result of a full two-pass run.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    /// All warnings, sorted by file then line, paths already normalized
    /// for the target mode.
    pub warnings: Vec<Warning>,
    /// Number of files analyzed (including ones that produced
    /// diagnostics).
    pub files_scanned: usize,
    /// Per-file failures; an empty warning list with diagnostics present
    /// is still a successful run.
    pub diagnostics: Vec<FileDiagnostic>,
}

/// How warning paths are presented, fixed by the target kind.
enum TargetMode {
    /// `/` + base name.
    SingleFile,
    /// Paths relative to the scanned root.
    Directory(PathBuf),
}

/// Run the full analysis against a target path.
///
/// # Errors
///
/// Returns `InvalidTarget` when the path is neither a file nor a
/// directory; every other failure is isolated per file.
pub fn check_path(target: &Path, options: &CheckOptions) -> Result<CheckReport> {
    let (files, mode) = if target.is_file() {
        (vec![target.to_path_buf()], TargetMode::SingleFile)
    } else if target.is_dir() {
        let scanner = SourceScanner::new(target)?;
        let files = scanner.scan(options.no_ignore)?;
        (files, TargetMode::Directory(target.to_path_buf()))
    } else {
        return Err(RefScanError::InvalidTarget(target.to_path_buf()));
    };

    info!(files = files.len(), target = %target.display(), "starting analysis");

    let parallel = options.parallel && files.len() >= MIN_FILES_FOR_PARALLEL;

    // Pass 1: collect declarations. Must fully complete before detection,
    // so cross-file calls resolve.
    let per_file: Vec<(RepositoryBuilder, Option<FileDiagnostic>)> = if parallel {
        files.par_iter().map(|f| collect_one(f)).collect()
    } else {
        files.iter().map(|f| collect_one(f)).collect()
    };

    let mut diagnostics = Vec::new();
    let mut builder = RepositoryBuilder::new();
    for (file_builder, diagnostic) in per_file {
        builder = builder.merge(file_builder);
        diagnostics.extend(diagnostic);
    }
    let repository = builder.seal();
    info!(signatures = repository.len(), "declaration pass complete");

    // Pass 2: detect against the sealed, read-only repository.
    let mut warnings: Vec<Warning> = if parallel {
        files
            .par_iter()
            .flat_map_iter(|f| detect_one(f, &repository))
            .collect()
    } else {
        files
            .iter()
            .flat_map(|f| detect_one(f, &repository))
            .collect()
    };

    warnings.sort_by(|a, b| a.file.cmp(&b.file).then(a.line.cmp(&b.line)));
    diagnostics.sort_by(|a, b| a.path.cmp(&b.path));

    let warnings = match &mode {
        TargetMode::SingleFile => warning::basename_paths(warnings),
        TargetMode::Directory(root) => warning::strip_root(warnings, root),
    };

    info!(warnings = warnings.len(), "detection pass complete");

    Ok(CheckReport {
        warnings,
        files_scanned: files.len(),
        diagnostics,
    })
}

/// Pass-1 unit of work: read, parse and collect one file.
fn collect_one(path: &Path) -> (RepositoryBuilder, Option<FileDiagnostic>) {
    match read_and_parse(path) {
        Ok((source, tree)) => (
            collector::collect_file(&tree, source.as_bytes(), path),
            None,
        ),
        Err(e) => (
            RepositoryBuilder::new(),
            Some(FileDiagnostic {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        ),
    }
}

/// Pass-2 unit of work: read, parse and detect one file. Files that
/// already failed in pass 1 fail identically here and are skipped without
/// a second diagnostic.
fn detect_one(path: &Path, repository: &DeclarationRepository) -> Vec<Warning> {
    match read_and_parse(path) {
        Ok((source, tree)) => detector::detect_file(&tree, source.as_bytes(), path, repository),
        Err(e) => {
            debug!(file = %path.display(), "skipping in detection pass: {e}");
            Vec::new()
        }
    }
}

fn read_and_parse(path: &Path) -> Result<(String, tree_sitter::Tree)> {
    let source =
        fs::read_to_string(path).map_err(|e| RefScanError::io_with_path(e, path))?;
    let tree = php::parse(&source, path)?;
    Ok((source, tree))
}
