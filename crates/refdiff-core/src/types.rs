//! Source position types shared by the model and the tree builder.

use serde::{Deserialize, Serialize};

/// Source span of a declaration or statement.
///
/// - `start_line` / `end_line`: 1-indexed line numbers
/// - `start_col` / `end_col`: 1-indexed columns, UTF-8 bytes
///
/// `end_*` point one past the last character, as tree-sitter reports them.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Span {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    /// Exclusive.
    pub end_col: u32,
}

impl Span {
    pub fn new(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Span {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }
}
