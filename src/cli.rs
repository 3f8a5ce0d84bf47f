//! CLI front door.
//!
//! Builds both revisions from directories, diffs them and produces the JSON
//! response. The binary only parses arguments and prints.
//!
//! All functions return `Result<T, RefdiffError>` so the caller can emit an
//! `ErrorResponse` with a stable exit code.

use std::path::{Path, PathBuf};

use tracing::info;

use refdiff_core::config::DiffConfig;
use refdiff_core::error::RefdiffError;
use refdiff_core::output::DiffResponse;
use refdiff_python::build_model_from_dir;

/// Options of the `diff` command.
#[derive(Debug, Clone, Default)]
pub struct DiffOptions {
    /// TOML file with a `[diff]` table of thresholds.
    pub config: Option<PathBuf>,
    /// Include match evidence in the response.
    pub include_matches: bool,
}

/// Diff two revision directories.
pub fn run_diff(
    before: &Path,
    after: &Path,
    options: &DiffOptions,
) -> Result<DiffResponse, RefdiffError> {
    let config = match &options.config {
        Some(path) => DiffConfig::load(path)?,
        None => DiffConfig::default(),
    };

    let before_model = build_model_from_dir(before)?;
    let after_model = build_model_from_dir(after)?;
    let result = refdiff_core::diff_with_config(&before_model, &after_model, &config)?;
    info!(refactorings = result.len(), "diff finished");

    let response = DiffResponse::new(
        before.display().to_string(),
        after.display().to_string(),
        &result,
    );
    Ok(if options.include_matches {
        response.with_matches(&result)
    } else {
        response
    })
}
