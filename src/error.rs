//! Central error types for refscan.
//!
//! Uses `thiserror` for ergonomic error definitions with automatic
//! `Display` and `From` implementations.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Process exit codes for the refscan CLI.
///
/// Unix-style convention: 0 is success, higher values indicate
/// increasingly severe problems.
pub mod exit_code {
    /// No warnings found (clean).
    pub const CLEAN: i32 = 0;
    /// Warnings were emitted.
    pub const WARNINGS: i32 = 1;
    /// Fatal error (invalid target path, I/O failure on the target itself).
    pub const FATAL: i32 = 2;
}

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum RefScanError {
    /// IO operation failed (without path context - prefer IoWithPath when path is available)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// IO operation failed with path context for better error messages
    #[error("IO error at {path}: {error}")]
    IoWithPath {
        error: std::io::Error,
        path: PathBuf,
    },

    /// Failed to parse a PHP source file
    #[error("Parse error in {file}: {message}")]
    Parse { file: String, message: String },

    /// Tree-sitter grammar/loading error
    #[error("Tree-sitter error: {0}")]
    TreeSitter(String),

    /// Invalid discovery configuration (exclude patterns).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Target path is neither a file nor a directory.
    ///
    /// This is the only fatal input error: the run aborts before any
    /// analysis (per-file failures are isolated and reported as
    /// diagnostics instead).
    #[error("Target path is neither a file nor a directory: {0}")]
    InvalidTarget(PathBuf),
}

/// Convenience type alias for Results using RefScanError.
pub type Result<T> = std::result::Result<T, RefScanError>;

impl RefScanError {
    /// Create an IO error with path context.
    ///
    /// Use this when reading files to provide actionable error messages
    /// that include the file path that failed.
    #[inline]
    pub fn io_with_path(error: std::io::Error, path: impl AsRef<Path>) -> Self {
        RefScanError::IoWithPath {
            error,
            path: path.as_ref().to_path_buf(),
        }
    }
}
