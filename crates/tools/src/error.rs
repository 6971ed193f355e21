use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Approval required for {operation_key}: {reason}")]
    ApprovalRequired { operation_key: String, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    #[error("Execution cancelled")]
    Cancelled,
}

impl From<std::io::Error> for ToolError {
    fn from(err: std::io::Error) -> Self {
        ToolError::Execution(err.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OverflowError {
    #[error("Stored result not found: {0}")]
    UnknownStoredResult(String),
}
