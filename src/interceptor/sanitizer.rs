//! Normalization of raw tool results.

use std::sync::Arc;

use async_trait::async_trait;

use super::{Interceptor, ToolInvocation, ToolNext};
use crate::config::SanitizerConfig;
use crate::types::{ToolError, ToolOutput};

pub const EMPTY_OUTPUT_PLACEHOLDER: &str = "[No output from tool]";
pub const TRUNCATION_MARKER: &str = "\n...[output truncated]";

type CustomSanitizer = Arc<dyn Fn(String) -> String + Send + Sync>;

/// Replaces empty results with a placeholder, applies an optional custom
/// transform (redaction), then caps the length in characters.
#[derive(Clone)]
pub struct ToolSanitizer {
    max_length: usize,
    custom: Option<CustomSanitizer>,
}

impl Default for ToolSanitizer {
    fn default() -> Self {
        Self::from_config(&SanitizerConfig::default())
    }
}

impl ToolSanitizer {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            custom: None,
        }
    }

    pub fn from_config(config: &SanitizerConfig) -> Self {
        Self::new(config.max_length)
    }

    pub fn with_custom<F>(mut self, sanitizer: F) -> Self
    where
        F: Fn(String) -> String + Send + Sync + 'static,
    {
        self.custom = Some(Arc::new(sanitizer));
        self
    }

    pub fn sanitize(&self, output: ToolOutput) -> String {
        if output.is_empty() {
            return EMPTY_OUTPUT_PLACEHOLDER.to_string();
        }

        let mut text = output.as_text();
        if let Some(custom) = &self.custom {
            text = custom(text);
        }

        match text.char_indices().nth(self.max_length) {
            Some((cut, _)) => {
                text.truncate(cut);
                text.push_str(TRUNCATION_MARKER);
                text
            }
            None => text,
        }
    }
}

impl std::fmt::Debug for ToolSanitizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSanitizer")
            .field("max_length", &self.max_length)
            .field("custom", &self.custom.is_some())
            .finish()
    }
}

#[async_trait]
impl Interceptor for ToolSanitizer {
    fn name(&self) -> &str {
        "tool-sanitizer"
    }

    async fn intercept_tool(
        &self,
        invocation: &ToolInvocation,
        next: ToolNext<'_>,
    ) -> Result<ToolOutput, ToolError> {
        let output = next.run(invocation).await?;
        Ok(ToolOutput::Text(self.sanitize(output)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_empty_results() {
        let sanitizer = ToolSanitizer::new(10);
        assert_eq!(sanitizer.sanitize(ToolOutput::Empty), "[No output from tool]");
        assert_eq!(sanitizer.sanitize(ToolOutput::text("")), "[No output from tool]");
        assert_eq!(
            sanitizer.sanitize(ToolOutput::Json(Value::Null)),
            "[No output from tool]"
        );
    }

    #[test]
    fn test_custom_runs_before_truncation() {
        let sanitizer =
            ToolSanitizer::new(12).with_custom(|s| s.replace("sk-123456", "sk-******"));
        let out = sanitizer.sanitize(ToolOutput::text("key=sk-123456789"));
        assert!(out.starts_with("key=sk-*****"));
        assert!(!out.contains("123456"));
        assert!(out.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_truncation() {
        let sanitizer = ToolSanitizer::new(10);
        let raw = "abcdefghijklmno";
        let out = sanitizer.sanitize(ToolOutput::text(raw));
        assert_eq!(out, format!("abcdefghij{}", TRUNCATION_MARKER));
        assert!(out.len() < raw.len() + TRUNCATION_MARKER.len());
    }

    #[test]
    fn test_truncation_counts_chars() {
        let sanitizer = ToolSanitizer::new(2);
        let out = sanitizer.sanitize(ToolOutput::text("héllo"));
        assert!(out.starts_with("hé"));
    }

    #[test]
    fn test_short_output_untouched() {
        let sanitizer = ToolSanitizer::new(100);
        assert_eq!(sanitizer.sanitize(ToolOutput::text("fine")), "fine");
        assert_eq!(
            sanitizer.sanitize(ToolOutput::Json(serde_json::json!({"a": 1}))),
            r#"{"a":1}"#
        );
    }
}
