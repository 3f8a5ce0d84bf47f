//! Shared helpers for refactoring detection tests.

#![allow(dead_code)]

use refdiff_core::model::Model;
use refdiff_core::DiffResult;
use refdiff_python::build_model;

/// Build a model from `(path, source)` pairs.
pub fn model_from(files: &[(&str, &str)]) -> Model {
    build_model(files.iter().copied()).expect("sources should build")
}

/// Build both revisions and diff them with the default configuration.
pub fn diff_sources(before: &[(&str, &str)], after: &[(&str, &str)]) -> DiffResult {
    refdiff_core::diff(&model_from(before), &model_from(after)).expect("models should be valid")
}

/// Descriptions of every record, in result order.
pub fn descriptions(result: &DiffResult) -> Vec<String> {
    result
        .refactorings()
        .iter()
        .map(|r| r.to_string())
        .collect()
}
