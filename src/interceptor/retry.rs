//! Retry policy for tool calls.

use std::time::Duration;

use async_trait::async_trait;

use super::{Interceptor, ToolInvocation, ToolNext};
use crate::config::RetryConfig;
use crate::types::{ToolError, ToolOutput};

/// Retries transient tool failures with a fixed delay and turns every failure
/// into an observation the model can act on.
///
/// `max_retries` is the total number of attempts. Argument errors are never
/// retried.
#[derive(Debug, Clone)]
pub struct ToolRetry {
    max_retries: u32,
    delay: Duration,
}

impl Default for ToolRetry {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl ToolRetry {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_retries, Duration::from_millis(config.delay_ms))
    }

    fn invalid_arguments(tool: &str, error: &ToolError) -> ToolOutput {
        ToolOutput::text(format!(
            "Invalid arguments for tool [{}]: {}. Check the parameter names and types \
             against the tool's input schema and call it again with corrected arguments.",
            tool, error
        ))
    }

    fn execution_error(tool: &str, error: &ToolError) -> ToolOutput {
        ToolOutput::text(format!("Execution error in tool [{}]: {}", tool, error))
    }
}

#[async_trait]
impl Interceptor for ToolRetry {
    fn name(&self) -> &str {
        "tool-retry"
    }

    async fn intercept_tool(
        &self,
        invocation: &ToolInvocation,
        next: ToolNext<'_>,
    ) -> Result<ToolOutput, ToolError> {
        let tool = invocation.tool_name();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let error = match next.run(invocation).await {
                Ok(output) => return Ok(output),
                Err(e) => e,
            };

            if error.is_argument_error() {
                tracing::debug!(tool, error = %error, "Tool rejected its arguments");
                return Ok(Self::invalid_arguments(tool, &error));
            }

            if !error.is_retryable() || attempt >= self.max_retries {
                tracing::warn!(tool, attempt, error = %error, "Tool failed");
                return Ok(Self::execution_error(tool, &error));
            }

            tracing::debug!(
                tool,
                attempt,
                max_retries = self.max_retries,
                delay_ms = self.delay.as_millis() as u64,
                error = %error,
                "Retrying tool"
            );
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::InterceptorChain;
    use crate::testing::FnTool;
    use crate::tools::ToolRegistry;
    use crate::types::ToolCall;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn run(tool: FnTool) -> (ToolOutput, usize) {
        let calls = tool.call_counter();
        let tools = ToolRegistry::new().with_tool(tool);
        let chain = InterceptorChain::new().with(ToolRetry::new(3, Duration::ZERO));
        let invocation = ToolInvocation::new(
            "s",
            "a",
            ToolCall::new("1", "flaky", serde_json::json!({"q": 1})),
        );
        let output = chain.invoke_tool(&invocation, &tools).await.unwrap();
        (output, calls.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let (out, calls) = run(FnTool::new("flaky", |_| Ok(ToolOutput::text("42")))).await;
        assert_eq!(calls, 1);
        assert_eq!(out, ToolOutput::text("42"));
    }

    #[tokio::test]
    async fn test_argument_error_not_retried() {
        let (out, calls) = run(FnTool::new("flaky", |_| {
            Err(ToolError::invalid_arguments("missing field `city`"))
        }))
        .await;
        assert_eq!(calls, 1);
        let text = out.as_text();
        assert!(text.contains("Invalid arguments"));
        assert!(text.contains("corrected arguments"));
    }

    #[tokio::test]
    async fn test_transient_then_success() {
        let failures = Arc::new(AtomicUsize::new(1));
        let (out, calls) = run(FnTool::new("flaky", move |_| {
            if failures.fetch_sub(1, Ordering::SeqCst) > 0 {
                Err(ToolError::execution("connection reset"))
            } else {
                Ok(ToolOutput::text("ok"))
            }
        }))
        .await;
        assert_eq!(calls, 2);
        assert_eq!(out.as_text(), "ok");
    }

    #[tokio::test]
    async fn test_all_attempts_fail() {
        let (out, calls) = run(FnTool::new("flaky", |_| {
            Err(ToolError::execution("service unavailable"))
        }))
        .await;
        assert_eq!(calls, 3);
        let text = out.as_text();
        assert!(text.contains("Execution error in tool [flaky]"));
        assert!(text.contains("service unavailable"));
    }

    #[tokio::test]
    async fn test_unknown_tool_not_retried() {
        let tools = ToolRegistry::new();
        let chain = InterceptorChain::new().with(ToolRetry::new(3, Duration::ZERO));
        let invocation =
            ToolInvocation::new("s", "a", ToolCall::new("1", "ghost", serde_json::json!({})));
        let out = chain.invoke_tool(&invocation, &tools).await.unwrap();
        assert!(out.as_text().contains("unknown tool: ghost"));
    }
}
