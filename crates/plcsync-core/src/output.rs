//! JSON output types for CLI responses.
//!
//! Every response has `status` as its first field and carries
//! `schemaVersion`. Errors use [`ErrorResponse`]; successes use one struct
//! per command.

use std::io::{self, Write};

use serde::Serialize;

use crate::commit::CommitOutcome;
use crate::error::{OutputErrorCode, SyncError};
use crate::flow::NodeLocation;
use crate::project::Scope;
use crate::references::ReferenceImpact;
use crate::tree::{VariableForest, VariableTreeNode};
use crate::type_change::{TypeChangeOutcome, TypeChangeReport};

/// Current schema version for all responses.
pub const SCHEMA_VERSION: &str = "1";

// ============================================================================
// Errors
// ============================================================================

/// Error information for error responses.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    /// Numeric error code, also the process exit code.
    pub code: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorInfo {
    pub fn from_error(err: &SyncError) -> Self {
        let code = OutputErrorCode::from(err).code();
        let details = match err {
            SyncError::InvalidArguments { details, .. } => details.clone(),
            SyncError::Syntax {
                line: Some(line), ..
            } => Some(serde_json::json!({ "line": line })),
            SyncError::CommitRejected {
                title,
                message: Some(message),
            } => Some(serde_json::json!({ "title": title, "message": message })),
            SyncError::VariableNotFound { scope, name } => {
                Some(serde_json::json!({ "scope": scope, "name": name }))
            }
            SyncError::Io { path, .. } => Some(serde_json::json!({ "path": path })),
            _ => None,
        };
        ErrorInfo {
            code,
            message: err.to_string(),
            details,
        }
    }
}

/// Error response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Status: "error".
    pub status: String,
    pub schema_version: String,
    pub error: ErrorInfo,
}

impl ErrorResponse {
    pub fn from_error(err: &SyncError) -> Self {
        ErrorResponse {
            status: "error".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            error: ErrorInfo::from_error(err),
        }
    }
}

// ============================================================================
// Command Responses
// ============================================================================

/// Response for `tree`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeResponse {
    pub status: String,
    pub schema_version: String,
    pub max_depth: usize,
    pub roots: Vec<VariableTreeNode>,
    /// Ids left out because another node already carried them.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped_ids: Vec<String>,
}

impl TreeResponse {
    pub fn new(max_depth: usize, forest: VariableForest) -> Self {
        TreeResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            max_depth,
            roots: forest.roots,
            skipped_ids: forest.skipped_ids,
        }
    }
}

/// Response for `sync`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub status: String,
    pub schema_version: String,
    pub nodes_updated: usize,
    pub broken_nodes: Vec<NodeLocation>,
    pub dry_run: bool,
}

impl SyncResponse {
    pub fn new(nodes_updated: usize, broken_nodes: Vec<NodeLocation>, dry_run: bool) -> Self {
        SyncResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            nodes_updated,
            broken_nodes,
            dry_run,
        }
    }
}

/// Response for `commit` and `rename`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResultResponse {
    pub status: String,
    pub schema_version: String,
    #[serde(flatten)]
    pub outcome: CommitOutcome,
    pub dry_run: bool,
}

impl CommitResultResponse {
    pub fn new(outcome: CommitOutcome, dry_run: bool) -> Self {
        CommitResultResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            outcome,
            dry_run,
        }
    }
}

/// Response for `check-type`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeCheckResponse {
    pub status: String,
    pub schema_version: String,
    pub scope: Scope,
    pub variable: String,
    pub old_type: String,
    pub new_type: String,
    pub report: TypeChangeReport,
}

impl TypeCheckResponse {
    pub fn new(
        scope: Scope,
        variable: impl Into<String>,
        old_type: impl Into<String>,
        new_type: impl Into<String>,
        report: TypeChangeReport,
    ) -> Self {
        TypeCheckResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            scope,
            variable: variable.into(),
            old_type: old_type.into(),
            new_type: new_type.into(),
            report,
        }
    }
}

/// Response for `set-type`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeChangeResponse {
    pub status: String,
    pub schema_version: String,
    pub scope: Scope,
    #[serde(flatten)]
    pub outcome: TypeChangeOutcome,
    pub dry_run: bool,
}

impl TypeChangeResponse {
    pub fn new(scope: Scope, outcome: TypeChangeOutcome, dry_run: bool) -> Self {
        TypeChangeResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            scope,
            outcome,
            dry_run,
        }
    }
}

/// Response for `refs`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferencesResponse {
    pub status: String,
    pub schema_version: String,
    pub scope: Scope,
    pub variable: String,
    #[serde(flatten)]
    pub impact: ReferenceImpact,
}

impl ReferencesResponse {
    pub fn new(scope: Scope, variable: impl Into<String>, impact: ReferenceImpact) -> Self {
        ReferencesResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            scope,
            variable: variable.into(),
            impact,
        }
    }
}

// ============================================================================
// Emission
// ============================================================================

/// Emit a response as pretty-printed JSON.
pub fn emit_response<T: Serialize>(response: &T, writer: &mut impl Write) -> io::Result<()> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}

/// Emit a response as compact JSON (single line).
pub fn emit_response_compact<T: Serialize>(
    response: &T,
    writer: &mut impl Write,
) -> io::Result<()> {
    let json = serde_json::to_string(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}

#[cfg(test)]
mod tests {
    use super::*;

    mod error_response {
        use super::*;

        #[test]
        fn status_comes_first() {
            let response = ErrorResponse::from_error(&SyncError::pou_not_found("Main"));
            let json = serde_json::to_string(&response).unwrap();
            assert!(json.starts_with(r#"{"status":"error","schemaVersion":"1""#));
            assert!(json.contains(r#""code":3"#));
        }

        #[test]
        fn syntax_line_lands_in_details() {
            let err = SyncError::Syntax {
                message: "unexpected END_VAR".into(),
                line: Some(4),
            };
            let info = ErrorInfo::from_error(&err);
            assert_eq!(info.code, 5);
            assert_eq!(info.details, Some(serde_json::json!({ "line": 4 })));
        }

        #[test]
        fn rejection_without_message_has_no_details() {
            let err = SyncError::CommitRejected {
                title: "Variable already exists".into(),
                message: None,
            };
            let info = ErrorInfo::from_error(&err);
            assert_eq!(info.code, 4);
            assert!(info.details.is_none());
        }
    }

    mod emission {
        use super::*;

        #[test]
        fn compact_is_single_line() {
            let mut out = Vec::new();
            emit_response_compact(&SyncResponse::new(2, vec![], true), &mut out).unwrap();
            let text = String::from_utf8(out).unwrap();
            assert_eq!(text.lines().count(), 1);
            let value: serde_json::Value = serde_json::from_str(&text).unwrap();
            assert_eq!(value["nodesUpdated"], 2);
            assert_eq!(value["dryRun"], true);
        }

        #[test]
        fn pretty_output_parses() {
            let mut out = Vec::new();
            emit_response(&TreeResponse::new(32, VariableForest::default()), &mut out).unwrap();
            let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
            assert_eq!(value["status"], "ok");
            assert_eq!(value["maxDepth"], 32);
            assert!(value.get("skippedIds").is_none());
        }
    }
}
