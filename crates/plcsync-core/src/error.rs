//! Error types and error code constants for plcsync.
//!
//! `SyncError` is the single error type surfaced at the CLI and library
//! boundary. Domain errors (declaration parse failures, type-spec errors,
//! I/O) are bridged into it with `From` impls.
//!
//! ## Error Code Mapping
//!
//! - `2`: Invalid arguments (bad input from caller)
//! - `3`: Resolution errors (POU or variable not found)
//! - `4`: Commit rejected by the sink
//! - `5`: Declaration syntax error
//! - `10`: Internal errors (bugs, unexpected state)

use std::fmt;

use thiserror::Error;

use crate::commit::ParseError;
use crate::types::TypeSpecError;

// ============================================================================
// Output Error Codes
// ============================================================================

/// Stable error codes. They double as CLI exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Invalid arguments from caller.
    InvalidArguments = 2,
    /// A POU, variable or file could not be resolved.
    ResolutionError = 3,
    /// The commit sink refused the new variable table.
    CommitRejected = 4,
    /// The declaration text did not parse.
    SyntaxError = 5,
    /// Internal errors (bugs, unexpected state).
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

/// Unified error type for the engine and the CLI.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid arguments from caller.
    #[error("invalid arguments: {message}")]
    InvalidArguments {
        message: String,
        details: Option<serde_json::Value>,
    },

    /// Declaration text failed to parse. The parser message is kept verbatim.
    #[error("syntax error: {message}")]
    Syntax { message: String, line: Option<u32> },

    /// The commit sink returned `ok = false`.
    #[error("commit rejected: {title}")]
    CommitRejected {
        title: String,
        message: Option<String>,
    },

    /// No POU with this name exists.
    #[error("POU not found: {name}")]
    PouNotFound { name: String },

    /// No variable with this name exists in the scope.
    #[error("variable '{name}' not found in {scope}")]
    VariableNotFound { scope: String, name: String },

    /// Configuration could not be loaded.
    #[error("config error: {message}")]
    Config { message: String },

    /// Reading or writing a file failed.
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    /// Internal error (bug or unexpected state).
    #[error("internal error: {message}")]
    InternalError { message: String },
}

// ============================================================================
// Error Code Mapping
// ============================================================================

impl From<&SyncError> for OutputErrorCode {
    fn from(err: &SyncError) -> Self {
        match err {
            SyncError::InvalidArguments { .. } => OutputErrorCode::InvalidArguments,
            SyncError::Config { .. } => OutputErrorCode::InvalidArguments,
            SyncError::Syntax { .. } => OutputErrorCode::SyntaxError,
            SyncError::CommitRejected { .. } => OutputErrorCode::CommitRejected,
            SyncError::PouNotFound { .. } => OutputErrorCode::ResolutionError,
            SyncError::VariableNotFound { .. } => OutputErrorCode::ResolutionError,
            SyncError::Io { .. } => OutputErrorCode::ResolutionError,
            SyncError::InternalError { .. } => OutputErrorCode::InternalError,
        }
    }
}

impl From<SyncError> for OutputErrorCode {
    fn from(err: SyncError) -> Self {
        OutputErrorCode::from(&err)
    }
}

// ============================================================================
// Bridges
// ============================================================================

impl From<ParseError> for SyncError {
    fn from(err: ParseError) -> Self {
        SyncError::Syntax {
            message: err.message,
            line: err.line,
        }
    }
}

impl From<TypeSpecError> for SyncError {
    fn from(err: TypeSpecError) -> Self {
        SyncError::invalid_args(err.to_string())
    }
}

// ============================================================================
// Convenience Constructors
// ============================================================================

impl SyncError {
    pub fn invalid_args(message: impl Into<String>) -> Self {
        SyncError::InvalidArguments {
            message: message.into(),
            details: None,
        }
    }

    pub fn invalid_args_with_details(
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        SyncError::InvalidArguments {
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn pou_not_found(name: impl Into<String>) -> Self {
        SyncError::PouNotFound { name: name.into() }
    }

    pub fn variable_not_found(scope: impl fmt::Display, name: impl Into<String>) -> Self {
        SyncError::VariableNotFound {
            scope: scope.to_string(),
            name: name.into(),
        }
    }

    /// Wrap an I/O failure on `path`.
    pub fn io(path: impl AsRef<std::path::Path>, err: impl fmt::Display) -> Self {
        SyncError::Io {
            path: path.as_ref().display().to_string(),
            message: err.to_string(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        SyncError::InternalError {
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
        fn syntax_maps_to_syntax_error() {
            let err: SyncError = ParseError::new("unexpected token ':='").into();
            assert_eq!(err.error_code(), OutputErrorCode::SyntaxError);
            assert_eq!(err.error_code().code(), 5);
        }

        #[test]
        fn lookups_map_to_resolution_error() {
            assert_eq!(
                SyncError::pou_not_found("Main").error_code().code(),
                3
            );
            assert_eq!(
                SyncError::variable_not_found("global variables", "G")
                    .error_code()
                    .code(),
                3
            );
        }

        #[test]
        fn rejection_maps_to_commit_rejected() {
            let err = SyncError::CommitRejected {
                title: "Variable already exists".to_string(),
                message: None,
            };
            assert_eq!(OutputErrorCode::from(&err), OutputErrorCode::CommitRejected);
            assert_eq!(err.error_code().code(), 4);
        }

        #[test]
        fn config_and_arguments_map_to_invalid_arguments() {
            let err = SyncError::Config {
                message: "bad key".to_string(),
            };
            assert_eq!(err.error_code().code(), 2);
            assert_eq!(SyncError::invalid_args("x").error_code().code(), 2);
        }

        #[test]
        fn internal_maps_to_ten() {
            assert_eq!(SyncError::internal("oops").error_code().code(), 10);
        }
    }

    mod error_display {
        use super::*;

        #[test]
        fn parse_message_is_kept_verbatim() {
            let err: SyncError = ParseError::new("line 3: expected ';'").into();
            assert_eq!(err.to_string(), "syntax error: line 3: expected ';'");
        }

        #[test]
        fn variable_not_found_display() {
            let err = SyncError::variable_not_found("pou 'Main'", "Start");
            assert_eq!(err.to_string(), "variable 'Start' not found in pou 'Main'");
        }

        #[test]
        fn type_spec_errors_become_invalid_arguments() {
            let err: SyncError = "a-b"
                .parse::<crate::types::VariableType>()
                .unwrap_err()
                .into();
            assert!(matches!(err, SyncError::InvalidArguments { .. }));
        }
    }
}
