//! Tool output types.

/// Raw result of a tool invocation, before sanitization.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Text(String),
    Json(serde_json::Value),
    Empty,
}

impl ToolOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }

    pub fn empty() -> Self {
        Self::Empty
    }

    /// True for `Empty`, empty text and JSON `null`.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::Json(v) => v.is_null(),
            Self::Empty => true,
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Json(serde_json::Value::String(s)) => s.clone(),
            Self::Json(v) if v.is_null() => String::new(),
            Self::Json(v) => v.to_string(),
            Self::Empty => String::new(),
        }
    }
}

impl From<String> for ToolOutput {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for ToolOutput {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<serde_json::Value> for ToolOutput {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

impl From<Option<String>> for ToolOutput {
    fn from(s: Option<String>) -> Self {
        s.map(Self::Text).unwrap_or(Self::Empty)
    }
}
