//! Error types and error code constants for refdiff.
//!
//! This module provides a unified error type (`RefdiffError`) that bridges
//! domain-specific errors from different subsystems (model validation,
//! configuration, tree building) into a common format suitable for JSON output.
//!
//! ## Error Code Mapping
//!
//! - `2`: Invalid arguments (bad input from caller, bad configuration)
//! - `3`: Resolution errors (directory or file not found, unreadable input)
//! - `10`: Internal errors (invariant violations, parser setup failures)
//!
//! ## Design
//!
//! - **Unified type**: `RefdiffError` is the single error type for CLI output
//! - **Bridging**: `impl From<X> for RefdiffError` bridges domain errors
//! - **Code mapping**: `OutputErrorCode` provides stable integer codes for JSON

use std::fmt;

use thiserror::Error;

use crate::config::ConfigError;
use crate::model::ModelError;

// ============================================================================
// Output Error Codes
// ============================================================================

/// Error codes for JSON output.
///
/// These codes map to CLI exit codes and appear in JSON error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Invalid arguments from caller (bad input, malformed configuration).
    InvalidArguments = 2,
    /// Resolution errors (path not found, unreadable file).
    ResolutionError = 3,
    /// Internal errors (bugs, invariant violations).
    InternalError = 10,
}

impl OutputErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for CLI output.
#[derive(Debug, Error)]
pub enum RefdiffError {
    /// Invalid arguments from caller.
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    /// Configuration file could not be loaded.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Input path does not exist.
    #[error("file not found: {path}")]
    FileNotFound { path: String },

    /// Input could not be read.
    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },

    /// An input model violates an invariant of the diff engine.
    #[error("invalid model: {message}")]
    InvalidModel { message: String },

    /// Internal error (bug or unexpected state).
    #[error("internal error: {message}")]
    InternalError { message: String },
}

// ============================================================================
// Error Code Mapping
// ============================================================================

impl From<&RefdiffError> for OutputErrorCode {
    fn from(err: &RefdiffError) -> Self {
        match err {
            RefdiffError::InvalidArguments { .. } => OutputErrorCode::InvalidArguments,
            RefdiffError::Config { .. } => OutputErrorCode::InvalidArguments,
            RefdiffError::FileNotFound { .. } => OutputErrorCode::ResolutionError,
            RefdiffError::Io { .. } => OutputErrorCode::ResolutionError,
            RefdiffError::InvalidModel { .. } => OutputErrorCode::InternalError,
            RefdiffError::InternalError { .. } => OutputErrorCode::InternalError,
        }
    }
}

impl From<RefdiffError> for OutputErrorCode {
    fn from(err: RefdiffError) -> Self {
        OutputErrorCode::from(&err)
    }
}

// ============================================================================
// Bridges
// ============================================================================

impl From<ModelError> for RefdiffError {
    fn from(err: ModelError) -> Self {
        RefdiffError::InvalidModel {
            message: err.to_string(),
        }
    }
}

impl From<ConfigError> for RefdiffError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Read { path, source } if source.kind() == std::io::ErrorKind::NotFound => {
                RefdiffError::FileNotFound { path }
            }
            other => RefdiffError::Config {
                message: other.to_string(),
            },
        }
    }
}

// ============================================================================
// Convenience Constructors
// ============================================================================

impl RefdiffError {
    /// Create an invalid arguments error.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        RefdiffError::InvalidArguments {
            message: message.into(),
        }
    }

    /// Create a file not found error.
    pub fn file_not_found(path: impl Into<String>) -> Self {
        RefdiffError::FileNotFound { path: path.into() }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        RefdiffError::InternalError {
            message: message.into(),
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> OutputErrorCode {
        OutputErrorCode::from(self)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod error_code_mapping {
        use super::*;

        #[test]
        fn file_not_found_maps_to_resolution_error() {
            let err = RefdiffError::file_not_found("before/");
            assert_eq!(
                OutputErrorCode::from(&err),
                OutputErrorCode::ResolutionError
            );
        }

        #[test]
        fn config_maps_to_invalid_arguments() {
            let err = RefdiffError::Config {
                message: "bad".to_string(),
            };
            assert_eq!(err.error_code(), OutputErrorCode::InvalidArguments);
        }

        #[test]
        fn model_error_maps_to_internal_error() {
            let err: RefdiffError = ModelError::DuplicateFile {
                file: "a.py".to_string(),
            }
            .into();
            assert_eq!(err.error_code(), OutputErrorCode::InternalError);
            assert_eq!(err.to_string(), "invalid model: file listed twice: a.py");
        }

        #[test]
        fn missing_config_file_maps_to_file_not_found() {
            let err: RefdiffError = ConfigError::Read {
                path: "refdiff.toml".to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }
            .into();
            assert!(matches!(err, RefdiffError::FileNotFound { .. }));
        }
    }

    mod output_error_code {
        use super::*;

        #[test]
        fn code_values_are_stable() {
            assert_eq!(OutputErrorCode::InvalidArguments.code(), 2);
            assert_eq!(OutputErrorCode::ResolutionError.code(), 3);
            assert_eq!(OutputErrorCode::InternalError.code(), 10);
        }

        #[test]
        fn display_shows_code() {
            assert_eq!(format!("{}", OutputErrorCode::InvalidArguments), "2");
            assert_eq!(format!("{}", OutputErrorCode::InternalError), "10");
        }
    }
}
