//! refscan CLI - find by-value assignments from by-reference PHP calls.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use refscan::error::exit_code;
use refscan::{check_path, print_report, CheckOptions, OutputFormat};

/// Heuristic PHP analyzer that flags by-value assignments from
/// by-reference calls.
#[derive(Parser)]
#[command(
    name = "refscan",
    version,
    about = "Find by-value assignments from by-reference PHP calls",
    long_about = r#"
Find by-value assignments from by-reference PHP calls.

Examples:
    refscan src/                        # Scan a directory tree
    refscan legacy.php                  # Scan a single file
    refscan src/ --format json          # Machine-readable output
    refscan src/ --min-probability 0.8  # High-confidence findings only

Each warning carries a probability rather than a verdict: static
inspection cannot prove aliasing intent.
"#
)]
struct Cli {
    /// File or directory to analyze
    target: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Drop warnings below this probability
    #[arg(long, default_value_t = 0.0)]
    min_probability: f64,

    /// Ignore .gitignore patterns (include all files)
    #[arg(long)]
    no_ignore: bool,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("refscan={default_level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<bool> {
    let options = CheckOptions {
        no_ignore: cli.no_ignore,
        ..CheckOptions::default()
    };

    let report = check_path(&cli.target, &options)
        .with_context(|| format!("failed to analyze {}", cli.target.display()))?;

    let mut stdout = io::stdout().lock();
    print_report(&report, cli.format, cli.min_probability, &mut stdout)?;

    let reported = report
        .warnings
        .iter()
        .any(|w| w.probability >= cli.min_probability);
    Ok(reported)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(true) => ExitCode::from(exit_code::WARNINGS as u8),
        Ok(false) => ExitCode::from(exit_code::CLEAN as u8),
        Err(e) => {
            eprintln!("refscan: {e:#}");
            ExitCode::from(exit_code::FATAL as u8)
        }
    }
}
