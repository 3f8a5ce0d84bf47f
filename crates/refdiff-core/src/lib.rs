//! Core infrastructure for refdiff.
//!
//! This crate provides the language-agnostic diff engine:
//! - Declaration-tree model (types, operations, fields, statement bodies)
//! - Visitor over the closed statement/expression node set
//! - Body and structure similarity
//! - Entity matcher and refactoring classifier
//! - Diff result, configuration, error types and JSON output types

pub mod ast;
pub mod classify;
pub mod config;
pub mod diff;
pub mod error;
pub mod matcher;
pub mod model;
pub mod output;
pub mod refactoring;
pub mod result;
pub mod similarity;
pub mod types;
pub mod visitor;

pub use diff::{diff, diff_with_config};
pub use result::DiffResult;
