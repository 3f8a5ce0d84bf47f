//! JSON output types and serialization for CLI responses.
//!
//! ## Design Principles
//!
//! 1. **Status first:** Every response has `status` as first field
//! 2. **Deterministic:** Same input -> same output (field order, array ordering)
//! 3. **Nullable vs absent:** Explicit `null` for "no value"; absent field means "not applicable"
//! 4. **Versioned:** Schema version in response enables forward compatibility

use std::collections::BTreeMap;
use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::error::{OutputErrorCode, RefdiffError};
use crate::refactoring::{OperationDescriptor, Refactoring, RefactoringKind, TypeDescriptor};
use crate::result::{DiffResult, EntityMatch};

/// Current schema version for all responses.
pub const SCHEMA_VERSION: &str = "1";

// ============================================================================
// Diff Response
// ============================================================================

/// A refactoring record with a human-readable description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefactoringOutput {
    /// One-line description, e.g. `Rename Class\tcalc.A -> calc.B`.
    pub description: String,
    #[serde(flatten)]
    pub refactoring: Refactoring,
}

impl From<&Refactoring> for RefactoringOutput {
    fn from(refactoring: &Refactoring) -> Self {
        RefactoringOutput {
            description: refactoring.to_string(),
            refactoring: refactoring.clone(),
        }
    }
}

/// Counts over a diff result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffSummary {
    pub refactorings: usize,
    pub by_kind: BTreeMap<RefactoringKind, usize>,
    pub added_types: usize,
    pub removed_types: usize,
    pub added_operations: usize,
    pub removed_operations: usize,
}

impl DiffSummary {
    pub fn of(result: &DiffResult) -> Self {
        DiffSummary {
            refactorings: result.len(),
            by_kind: result.summary(),
            added_types: result.added_types().len(),
            removed_types: result.removed_types().len(),
            added_operations: result.added_operations().len(),
            removed_operations: result.removed_operations().len(),
        }
    }
}

/// Response for the diff command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffResponse {
    /// Status: "ok".
    pub status: String,
    /// Schema version for compatibility.
    pub schema_version: String,
    /// Root of the before revision, as given.
    pub before: String,
    /// Root of the after revision, as given.
    pub after: String,
    pub summary: DiffSummary,
    pub refactorings: Vec<RefactoringOutput>,
    pub added_types: Vec<TypeDescriptor>,
    pub removed_types: Vec<TypeDescriptor>,
    pub added_operations: Vec<OperationDescriptor>,
    pub removed_operations: Vec<OperationDescriptor>,
    /// Match evidence, present when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matches: Option<Vec<EntityMatch>>,
}

impl DiffResponse {
    /// Create a diff response from a result.
    pub fn new(before: impl Into<String>, after: impl Into<String>, result: &DiffResult) -> Self {
        DiffResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            before: before.into(),
            after: after.into(),
            summary: DiffSummary::of(result),
            refactorings: result.refactorings().iter().map(Into::into).collect(),
            added_types: result.added_types().to_vec(),
            removed_types: result.removed_types().to_vec(),
            added_operations: result.added_operations().to_vec(),
            removed_operations: result.removed_operations().to_vec(),
            matches: None,
        }
    }

    /// Include match evidence.
    pub fn with_matches(mut self, result: &DiffResult) -> Self {
        self.matches = Some(result.matches().to_vec());
        self
    }
}

// ============================================================================
// Error Response
// ============================================================================

/// Error details for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Numeric error code.
    pub code: u8,
    /// Human-readable message.
    pub message: String,
    /// Error-specific structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorInfo {
    /// Create from a RefdiffError.
    pub fn from_error(err: &RefdiffError) -> Self {
        let code = OutputErrorCode::from(err).code();
        let message = err.to_string();
        let details = match err {
            RefdiffError::FileNotFound { path } | RefdiffError::Io { path, .. } => {
                Some(serde_json::json!({ "path": path }))
            }
            _ => None,
        };
        ErrorInfo {
            code,
            message,
            details,
        }
    }
}

/// Error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Status: "error".
    pub status: String,
    /// Schema version for compatibility.
    pub schema_version: String,
    /// Error information.
    pub error: ErrorInfo,
}

impl ErrorResponse {
    /// Create an error response from a RefdiffError.
    pub fn from_error(err: &RefdiffError) -> Self {
        ErrorResponse {
            status: "error".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            error: ErrorInfo::from_error(err),
        }
    }
}

// ============================================================================
// Emission
// ============================================================================

/// Emit a response as pretty-printed JSON to a writer.
pub fn emit_response<T: Serialize>(response: &T, writer: &mut impl Write) -> io::Result<()> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}

/// Emit a response as compact JSON (single line) to a writer.
pub fn emit_response_compact<T: Serialize>(
    response: &T,
    writer: &mut impl Write,
) -> io::Result<()> {
    let json = serde_json::to_string(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}

// ============================================================================
// Tests
// ============================================================================
