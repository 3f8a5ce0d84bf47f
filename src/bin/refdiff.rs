//! Binary entry point for the refdiff CLI.
//!
//! ## Usage
//!
//! ```bash
//! # Detect refactorings between two checkouts
//! refdiff diff old/ new/
//!
//! # Custom thresholds, single-line JSON, match evidence
//! refdiff diff old/ new/ --config refdiff.toml --compact --matches
//! ```

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use refdiff::cli::{run_diff, DiffOptions};
use refdiff::error::{OutputErrorCode, RefdiffError};
use refdiff::output::{emit_response, emit_response_compact, ErrorResponse};

// ============================================================================
// CLI Structure
// ============================================================================

/// Refactoring detection between two revisions of a Python code base.
///
/// All output is JSON on stdout; logs go to stderr.
#[derive(Parser, Debug)]
#[command(name = "refdiff", version, about = "Detect refactorings between two revisions")]
struct Cli {
    /// Log level for tracing output.
    #[arg(long, global = true, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// Emit single-line JSON.
    #[arg(long, global = true)]
    compact: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Diff two revision directories.
    Diff {
        /// Root of the before revision.
        before: PathBuf,
        /// Root of the after revision.
        after: PathBuf,
        /// TOML file with a `[diff]` table of thresholds.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Include the accepted entity pairs and their evidence.
        #[arg(long)]
        matches: bool,
    },
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level);
    let compact = cli.compact;

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let error_code = OutputErrorCode::from(&err);
            let response = ErrorResponse::from_error(&err);

            // Errors go to stdout as JSON, like results.
            let mut stdout = io::stdout();
            let _ = if compact {
                emit_response_compact(&response, &mut stdout)
            } else {
                emit_response(&response, &mut stdout)
            };
            let _ = stdout.flush();

            ExitCode::from(error_code.code())
        }
    }
}

/// Initialize tracing subscriber. `RUST_LOG` overrides `--log-level`.
fn init_tracing(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Execute the CLI command.
fn execute(cli: Cli) -> Result<(), RefdiffError> {
    match cli.command {
        Command::Diff {
            before,
            after,
            config,
            matches,
        } => {
            let options = DiffOptions {
                config,
                include_matches: matches,
            };
            let response = run_diff(&before, &after, &options)?;

            let mut stdout = io::stdout();
            if cli.compact {
                emit_response_compact(&response, &mut stdout)
            } else {
                emit_response(&response, &mut stdout)
            }
            .map_err(|e| RefdiffError::internal(e.to_string()))?;
            let _ = stdout.flush();
            Ok(())
        }
    }
}
