//! Python front end for refdiff.
//!
//! Turns Python source trees into [`refdiff_core::model::Model`]s:
//! - [`files`]: revision file discovery
//! - [`builder`]: tree-sitter parse tree to declaration-tree model, per file
//! - [`assembler`]: one model per revision, files in path order
//!
//! ```ignore
//! let before = build_model_from_dir(Path::new("old/"))?;
//! let after = build_model_from_dir(Path::new("new/"))?;
//! let result = refdiff_core::diff(&before, &after)?;
//! ```

pub mod assembler;
pub mod builder;
pub mod files;

pub use assembler::{build_model, build_model_from_dir};
pub use builder::{module_path_for, BuildError, BuildResult, PythonTreeBuilder};
pub use files::{collect_python_files, FileError};
