//! Tool registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::Tool;
use crate::types::{ToolDefinition, ToolError, ToolOutput};

/// Registry of the tools one agent may call.
///
/// Ordered by name so the definitions sent to the model are stable across runs.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.register(Arc::new(tool));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub async fn invoke(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolOutput, ToolError> {
        match self.tools.get(name) {
            Some(tool) => tool.invoke(arguments).await,
            None => Err(ToolError::unknown_tool(name)),
        }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FnTool;

    #[tokio::test]
    async fn test_register_and_invoke() {
        let registry = ToolRegistry::new().with_tool(FnTool::new("echo", |args| {
            Ok(ToolOutput::text(args.to_string()))
        }));

        assert!(registry.contains("echo"));
        let out = registry
            .invoke("echo", serde_json::json!({"x": 1}))
            .await
            .unwrap();
        assert_eq!(out.as_text(), r#"{"x":1}"#);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let registry = ToolRegistry::new();
        let err = registry
            .invoke("missing", serde_json::Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool { .. }));
    }

    #[test]
    fn test_definitions_sorted() {
        let registry = ToolRegistry::new()
            .with_tool(FnTool::new("b", |_| Ok(ToolOutput::Empty)))
            .with_tool(FnTool::new("a", |_| Ok(ToolOutput::Empty)));
        let names: Vec<_> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
