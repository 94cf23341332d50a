//! Core types shared by the loop, the interceptors and the team orchestrator.

mod message;
mod tool;

pub use message::{Message, Role, ToolCall, unanswered_tool_calls};
pub use tool::{ToolDefinition, ToolError, ToolOutput};
