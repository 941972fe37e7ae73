//! PHP source file discovery.
//!
//! Walks a directory root with the `ignore` crate: gitignore-aware, hidden
//! files skipped, standard dependency directories excluded. Traversal
//! errors (permission denied, broken symlinks) are logged and skipped so a
//! single bad entry never aborts the scan. Results are sorted for
//! deterministic downstream output.

use std::path::{Path, PathBuf};

use ignore::overrides::{Override, OverrideBuilder};
use ignore::WalkBuilder;
use tracing::{debug, warn};

use crate::error::{RefScanError, Result};

/// Directories excluded from discovery unless `no_ignore` is set.
const DEFAULT_EXCLUDES: &[&str] = &["!**/vendor/**", "!**/node_modules/**", "!**/.git/**"];

/// Scans a directory root for `.php` source files.
pub struct SourceScanner {
    root: PathBuf,
}

impl SourceScanner {
    /// Create a scanner for the given root.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTarget` if the path is not a directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(RefScanError::InvalidTarget(root));
        }
        Ok(Self { root })
    }

    /// The scanned root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Collect all `.php` files under the root, sorted by path.
    ///
    /// With `no_ignore` set, gitignore files and hidden-file filtering are
    /// bypassed and every file is considered.
    pub fn scan(&self, no_ignore: bool) -> Result<Vec<PathBuf>> {
        let mut builder = WalkBuilder::new(&self.root);

        if no_ignore {
            builder
                .hidden(false)
                .parents(false)
                .git_ignore(false)
                .git_global(false)
                .git_exclude(false)
                .ignore(false);
        } else {
            builder
                .hidden(true)
                .parents(true)
                .git_ignore(true)
                .git_global(true)
                .git_exclude(true)
                .require_git(false);

            builder.overrides(build_overrides(&self.root, DEFAULT_EXCLUDES)?);
        }

        let mut files = Vec::new();
        for entry in builder.build() {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if path.is_file() && is_php_file(path) {
                        files.push(path.to_path_buf());
                    }
                }
                Err(e) => {
                    warn!("Failed to scan entry: {e}");
                    debug!("Error details: {e:?}");
                }
            }
        }

        files.sort_unstable();
        Ok(files)
    }
}

/// Compile exclude patterns into an override matcher.
///
/// # Errors
///
/// Returns `Config` when a pattern is not a valid glob.
fn build_overrides(root: &Path, patterns: &[&str]) -> Result<Override> {
    let mut overrides = OverrideBuilder::new(root);
    for pattern in patterns {
        overrides
            .add(pattern)
            .map_err(|e| RefScanError::Config(e.to_string()))?;
    }
    overrides
        .build()
        .map_err(|e| RefScanError::Config(e.to_string()))
}

/// Case-insensitive `.php` extension check.
#[inline]
fn is_php_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("php"))
}
