//! Compile-only test to verify public API surface.
//!
//! This test ensures that key types remain accessible from the crate root
//! and its re-exported modules. If this test fails to compile, it indicates
//! a breaking change to the public API.

#![allow(unused_imports)]

// ============================================================================
// Model
// ============================================================================

use refdiff::model::{
    qualify, Field, Model, ModelError, Modifier, Operation, OperationRef, Parameter,
    ParameterKind, TypeDecl, TypeId, TypeKind, Visibility,
};

// Statement and expression nodes
use refdiff::ast::{Block, CollectionKind, ExceptHandler, Expr, LiteralKind, Statement, StmtKind};

// Positions
use refdiff::types::Span;

// Traversal
use refdiff::visitor::{walk_block, walk_expr, walk_stmt, VisitResult, Visitor};

// ============================================================================
// Diff Engine
// ============================================================================

use refdiff::similarity::{
    body_similarity, edit_distance, jaccard, lcs_ratio, parameter_similarity, BodyProfile,
    TokenBag, TypeProfile,
};

use refdiff::matcher::{
    EntityMatcher, ExtractCandidate, InlineCandidate, MatchEvidence, MatchResult, MatchTier,
    OperationMatch, TypeMatch,
};

use refdiff::refactoring::{
    EntityDescriptor, OperationDescriptor, Refactoring, RefactoringKind, TypeDescriptor,
};

use refdiff::result::EntityMatch;
use refdiff::{diff, diff_with_config, DiffResult};

// ============================================================================
// Configuration, Errors, Output
// ============================================================================

use refdiff::config::{Config, ConfigError, DiffConfig};
use refdiff::error::{OutputErrorCode, RefdiffError};
use refdiff::output::{
    emit_response, emit_response_compact, DiffResponse, DiffSummary, ErrorResponse,
    RefactoringOutput, SCHEMA_VERSION,
};

// ============================================================================
// Language Adapters
// ============================================================================

use refdiff::python::{
    build_model, build_model_from_dir, collect_python_files, module_path_for, BuildError,
    FileError, PythonTreeBuilder,
};

// ============================================================================
// Front Door (CLI)
// ============================================================================

use refdiff::cli::{run_diff, DiffOptions};

// ============================================================================
// Test
// ============================================================================

#[test]
fn api_surface_compiles() {
    // This test exists only to verify imports compile.
    // If you're here because this test broke, you may have
    // accidentally removed a public re-export.
    let _ = std::any::type_name::<Model>();
    let _ = std::any::type_name::<TypeDecl>();
    let _ = std::any::type_name::<Refactoring>();
    let _ = std::any::type_name::<DiffResult>();
    let _ = std::any::type_name::<DiffConfig>();
    let _ = std::any::type_name::<RefdiffError>();
    let _ = std::any::type_name::<PythonTreeBuilder>();
    let _ = std::any::type_name::<DiffOptions>();
}

#[test]
fn schema_version_is_stable() {
    // The schema version is part of the public API contract
    assert_eq!(SCHEMA_VERSION, "1");
}
