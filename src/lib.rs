//! refdiff: refactoring detection between two revisions of a Python code base.
//!
//! Builds a declaration-tree model of each revision, pairs entities across
//! the revisions and classifies the differences as typed refactorings.
//!
//! ```ignore
//! use refdiff::python::build_model_from_dir;
//!
//! let before = build_model_from_dir(Path::new("old/"))?;
//! let after = build_model_from_dir(Path::new("new/"))?;
//! for refactoring in refdiff::diff(&before, &after)?.refactorings() {
//!     println!("{refactoring}");
//! }
//! ```

// Core infrastructure - re-exported from refdiff-core
pub use refdiff_core::ast;
pub use refdiff_core::config;
pub use refdiff_core::error;
pub use refdiff_core::matcher;
pub use refdiff_core::model;
pub use refdiff_core::output;
pub use refdiff_core::refactoring;
pub use refdiff_core::result;
pub use refdiff_core::similarity;
pub use refdiff_core::types;
pub use refdiff_core::visitor;
pub use refdiff_core::{diff, diff_with_config, DiffResult};

// Language front end
pub use refdiff_python as python;

// Front door
pub mod cli;
