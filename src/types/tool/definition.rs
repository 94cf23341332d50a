//! Tool definition types.

use serde::{Deserialize, Serialize};

/// What the model collaborator is told about a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    /// One-line rendering used by the text protocol prompt.
    pub fn summary_line(&self) -> String {
        format!("- {}: {} (input: {})", self.name, self.description, self.input_schema)
    }
}
