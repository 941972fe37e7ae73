//! Warning value object and path presentation transforms.
//!
//! A [`Warning`] is immutable once constructed; path normalization derives
//! new warnings instead of mutating, and never touches `line` or
//! `probability`. Normalization runs only after a whole run's warnings are
//! collected, never during detection.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// A suspected by-value assignment from a by-reference call.
///
/// `probability` is a heuristic confidence in [0.0, 1.0], not a measured
/// frequency: purely static inspection cannot prove aliasing intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    /// Source file (absolute at detection time; rewritten by the
    /// presentation transforms below).
    pub file: String,
    /// 1-indexed source line of the assignment.
    pub line: usize,
    /// Confidence that this is a genuine bug, in [0.0, 1.0].
    pub probability: f64,
}

impl Warning {
    /// Create a new warning.
    #[must_use]
    pub fn new(file: impl Into<String>, line: usize, probability: f64) -> Self {
        Self {
            file: file.into(),
            line,
            probability,
        }
    }

    /// Derive a warning with a different file path, keeping line and
    /// probability.
    #[must_use]
    pub fn with_file(&self, file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line: self.line,
            probability: self.probability,
        }
    }
}

/// Single-file mode: replace each path by `/` + its base name.
#[must_use]
pub fn basename_paths(warnings: Vec<Warning>) -> Vec<Warning> {
    warnings
        .into_iter()
        .map(|w| {
            let base = Path::new(&w.file)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| w.file.clone());
            let file = format!("/{base}");
            w.with_file(file)
        })
        .collect()
}

/// Directory mode: strip the scanned root prefix, leaving paths relative
/// to that root. Idempotent: already-relative paths pass through
/// unchanged.
#[must_use]
pub fn strip_root(warnings: Vec<Warning>, root: &Path) -> Vec<Warning> {
    warnings
        .into_iter()
        .map(|w| match Path::new(&w.file).strip_prefix(root) {
            Ok(relative) => {
                let file = relative.display().to_string();
                w.with_file(file)
            }
            Err(_) => w,
        })
        .collect()
}
