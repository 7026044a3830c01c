//! Error taxonomy for hdlcheck.

/// Errors produced while servicing a check request.
///
/// Diagnostics reported by the toolchain are never errors; they travel in a
/// successful report with a nonzero return code.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("No code provided.")]
    EmptySubmission,

    #[error("No module declaration found in the provided code.")]
    MissingModuleDeclaration,

    #[error("{tool} not found; check the toolchain installation")]
    ToolUnavailable { tool: String },

    #[error("{tool} timed out after {limit_ms}ms")]
    ToolTimeout { tool: String, limit_ms: u64 },

    #[error("failed to run {tool}: {reason}")]
    Invocation { tool: String, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CheckError {
    /// Whether the caller is at fault (as opposed to the service or its host).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CheckError::EmptySubmission | CheckError::MissingModuleDeclaration
        )
    }

    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            CheckError::EmptySubmission | CheckError::MissingModuleDeclaration => "client_input",
            CheckError::ToolUnavailable { .. } => "tool_unavailable",
            CheckError::ToolTimeout { .. } => "tool_timeout",
            CheckError::Invocation { .. } => "invocation",
            CheckError::InvalidConfig(_) => "invalid_config",
            CheckError::Serialization(_) | CheckError::Io(_) => "internal",
        }
    }
}

/// Result type for hdlcheck operations.
pub type CheckResult<T> = std::result::Result<T, CheckError>;
