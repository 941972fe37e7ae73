//! Output formatting for check reports.
//!
//! Two formats: human-readable text (one `file:line probability` row per
//! warning plus a summary line) and machine-readable JSON of the full
//! report. Filtering by minimum probability happens here, at presentation
//! time, so the analysis itself stays unfiltered and deterministic.

use std::io::{self, Write};

use clap::ValueEnum;

use crate::checker::CheckReport;
use crate::error::Result;

/// Output format for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Machine-readable JSON.
    Json,
}

/// Render a report, dropping warnings below `min_probability`.
pub fn print_report(
    report: &CheckReport,
    format: OutputFormat,
    min_probability: f64,
    out: &mut impl Write,
) -> Result<()> {
    let filtered = CheckReport {
        warnings: report
            .warnings
            .iter()
            .filter(|w| w.probability >= min_probability)
            .cloned()
            .collect(),
        files_scanned: report.files_scanned,
        diagnostics: report.diagnostics.clone(),
    };

    match format {
        OutputFormat::Text => print_text(&filtered, out)?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &filtered)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            writeln!(out)?;
        }
    }
    Ok(())
}

fn print_text(report: &CheckReport, out: &mut impl Write) -> io::Result<()> {
    for warning in &report.warnings {
        writeln!(
            out,
            "{}:{} probability {:.2}",
            warning.file, warning.line, warning.probability
        )?;
    }

    for diagnostic in &report.diagnostics {
        writeln!(out, "skipped {}: {}", diagnostic.path.display(), diagnostic.message)?;
    }

    writeln!(
        out,
        "{} warning(s) in {} file(s)",
        report.warnings.len(),
        report.files_scanned
    )?;
    Ok(())
}
