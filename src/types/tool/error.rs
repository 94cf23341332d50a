//! Tool error types.

use thiserror::Error;

/// Failure raised by a tool invocation.
///
/// The loop never propagates these; the retry interceptor and the loop itself
/// turn them into observations the model can react to.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    #[error("execution failed: {message}")]
    Execution { message: String },

    #[error("timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("unknown tool: {name}")]
    UnknownTool { name: String },
}

impl ToolError {
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            message: message.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }

    pub fn timeout(timeout_ms: u64) -> Self {
        Self::Timeout { timeout_ms }
    }

    pub fn unknown_tool(name: impl Into<String>) -> Self {
        Self::UnknownTool { name: name.into() }
    }

    /// Schema/validation class: the same call will fail the same way.
    pub fn is_argument_error(&self) -> bool {
        matches!(self, Self::InvalidArguments { .. })
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Execution { .. } | Self::Timeout { .. })
    }

    pub fn contains(&self, pattern: &str) -> bool {
        self.to_string().contains(pattern)
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_arguments(err.to_string())
    }
}
