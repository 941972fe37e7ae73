//! refscan - heuristic detection of by-value assignments from
//! by-reference PHP calls.
//!
//! PHP lets a function hand data back by reference, either through its
//! return (`function &f()`) or through by-reference parameters
//! (`function f(&$x)`). Assigning the result with a plain `=` silently
//! copies instead of aliasing:
//!
//! ```php
//! function &config() { return $GLOBALS['config']; }
//! $cfg = config();    // detached copy - probably a bug
//! $cfg = &config();   // live alias - what the callee intended
//! ```
//!
//! refscan parses a PHP corpus with tree-sitter and runs two passes:
//! pass 1 collects the reference-binding shape of every declared callable
//! into a repository, which is sealed before pass 2 walks every
//! assignment expression and warns when a value-copy assignment takes its
//! value from a repository-known callee with reference semantics.
//!
//! Warnings carry a probability in (0.0, 0.9] rather than a verdict:
//! static inspection cannot prove aliasing intent, so this is a heuristic
//! linter, not a verifier.
//!
//! # Quick start
//!
//! ```no_run
//! use std::path::Path;
//! use refscan::{check_path, CheckOptions};
//!
//! let report = check_path(Path::new("./src"), &CheckOptions::default())?;
//! for warning in &report.warnings {
//!     println!("{}:{} {:.2}", warning.file, warning.line, warning.probability);
//! }
//! # Ok::<(), refscan::RefScanError>(())
//! ```

pub mod checker;
pub mod collector;
pub mod detector;
pub mod error;
pub mod output;
pub mod php;
pub mod repository;
pub mod scanner;
pub mod warning;

pub use checker::{check_path, CheckOptions, CheckReport, FileDiagnostic};
pub use error::{RefScanError, Result};
pub use output::{print_report, OutputFormat};
pub use repository::{CallableSignature, DeclarationRepository, RepositoryBuilder};
pub use warning::Warning;
