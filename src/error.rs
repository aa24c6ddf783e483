//! Error types for floortask
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, unknown task, invalid transition)
//! - 3: Blocked by policy (break in progress, missing permission, duplicate request)
//! - 4: Operation failed (store I/O, lock contention)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the ft CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const POLICY_BLOCKED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for floortask operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Not a floortask workspace (run `ft init`): {0}")]
    NotInitialized(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Document not found: {collection}/{id}")]
    DocumentNotFound { collection: String, id: String },

    #[error("Cannot {action} task {task_id}: {reason}")]
    InvalidTransition {
        task_id: String,
        action: String,
        reason: String,
    },

    // Policy blocks (exit code 3)
    #[error("Break in progress: new tasks are blocked until the break ends")]
    BreakActive,

    #[error("Permission denied: role {role} lacks {permission}")]
    PermissionDenied { role: String, permission: String },

    #[error("Task {task_id} is not in progress by {actor}")]
    NotClaimed { task_id: String, actor: String },

    #[error("Duplicate request: {0}")]
    DuplicateRequest(String),

    #[error("A break scheduler is already running (lock {0})")]
    SchedulerRunning(PathBuf),

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors
            Error::NotInitialized(_)
            | Error::InvalidConfig(_)
            | Error::InvalidArgument(_)
            | Error::TaskNotFound(_)
            | Error::DocumentNotFound { .. }
            | Error::InvalidTransition { .. } => exit_codes::USER_ERROR,

            // Policy blocks
            Error::BreakActive
            | Error::PermissionDenied { .. }
            | Error::NotClaimed { .. }
            | Error::DuplicateRequest(_)
            | Error::SchedulerRunning(_) => exit_codes::POLICY_BLOCKED,

            // Operation failures
            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::Watch(_)
            | Error::LockFailed(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured details for the JSON error envelope.
    pub fn details(&self) -> Option<serde_json::Value> {
        use serde_json::json;

        match self {
            Error::NotInitialized(path)
            | Error::LockFailed(path)
            | Error::SchedulerRunning(path) => {
                Some(json!({ "path": path.to_string_lossy() }))
            }
            Error::InvalidConfig(message)
            | Error::InvalidArgument(message)
            | Error::DuplicateRequest(message)
            | Error::OperationFailed(message) => Some(json!({ "message": message })),
            Error::TaskNotFound(id) => Some(json!({ "task_id": id })),
            Error::DocumentNotFound { collection, id } => {
                Some(json!({ "collection": collection, "id": id }))
            }
            Error::InvalidTransition {
                task_id,
                action,
                reason,
            } => Some(json!({ "task_id": task_id, "action": action, "reason": reason })),
            Error::PermissionDenied { role, permission } => {
                Some(json!({ "role": role, "permission": permission }))
            }
            Error::NotClaimed { task_id, actor } => {
                Some(json!({ "task_id": task_id, "actor": actor }))
            }
            Error::BreakActive
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::Watch(_) => None,
        }
    }

    pub(crate) fn invalid_transition(
        task_id: &str,
        action: &str,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidTransition {
            task_id: task_id.to_string(),
            action: action.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for floortask operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            details: err.details(),
        }
    }
}
