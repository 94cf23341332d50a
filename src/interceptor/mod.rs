//! Interceptor pipeline around the reason/act/observe transitions.
//!
//! Interceptors run in registration order. Each one sees every phase through a
//! fixed method set, and all methods default to no-ops:
//!
//! | Phase | Method | Typical use |
//! |-------|--------|-------------|
//! | after THINKING | [`Interceptor::on_reason`] | [`LoopGuard`] |
//! | ACTING | [`Interceptor::intercept_tool`] | [`ToolRetry`], [`ToolSanitizer`] |
//! | after OBSERVING | [`Interceptor::on_observation`] | [`ContextCompactor`] |
//!
//! Tool interception is a chain of responsibility: an interceptor decides
//! whether and how often to call [`ToolNext::run`], which continues with the
//! next interceptor and finally invokes the tool itself. The approval gate runs
//! before the chain, so a gated call never reaches it.

pub mod compactor;
mod loop_guard;
mod retry;
mod sanitizer;

pub use compactor::{
    ArchivalSummary, CompositeSummary, ContextCompactor, KeyFactExtraction, LlmSummary,
    RollingSummary, SummarizationStrategy,
};
pub use loop_guard::{LoopGuard, fingerprint};
pub use retry::ToolRetry;
pub use sanitizer::{ToolSanitizer, TRUNCATION_MARKER, EMPTY_OUTPUT_PLACEHOLDER};

use std::sync::Arc;

use async_trait::async_trait;

use crate::tools::ToolRegistry;
use crate::trace::Trace;
use crate::types::{Message, ToolCall, ToolError, ToolOutput};

/// One tool call on its way through the chain.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub session_id: String,
    pub agent_name: String,
    pub call: ToolCall,
}

impl ToolInvocation {
    pub fn new(
        session_id: impl Into<String>,
        agent_name: impl Into<String>,
        call: ToolCall,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            agent_name: agent_name.into(),
            call,
        }
    }

    pub fn tool_name(&self) -> &str {
        &self.call.name
    }

    pub fn arguments(&self) -> &serde_json::Value {
        &self.call.arguments
    }
}

/// Continuation of the tool chain.
#[derive(Clone, Copy)]
pub struct ToolNext<'a> {
    rest: &'a [Arc<dyn Interceptor>],
    tools: &'a ToolRegistry,
}

impl<'a> ToolNext<'a> {
    pub fn new(rest: &'a [Arc<dyn Interceptor>], tools: &'a ToolRegistry) -> Self {
        Self { rest, tools }
    }

    pub async fn run(self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError> {
        match self.rest.split_first() {
            Some((head, rest)) => {
                head.intercept_tool(invocation, ToolNext::new(rest, self.tools))
                    .await
            }
            None => {
                self.tools
                    .invoke(invocation.tool_name(), invocation.arguments().clone())
                    .await
            }
        }
    }
}

#[async_trait]
pub trait Interceptor: Send + Sync {
    fn name(&self) -> &str;

    /// Called with each new assistant message, after it was appended to memory.
    /// Setting the trace to pending suspends the run before ACTING.
    async fn on_reason(&self, _trace: &mut Trace, _message: &Message) -> crate::Result<()> {
        Ok(())
    }

    async fn intercept_tool(
        &self,
        invocation: &ToolInvocation,
        next: ToolNext<'_>,
    ) -> Result<ToolOutput, ToolError> {
        next.run(invocation).await
    }

    /// Called after the observations of one batch were appended.
    async fn on_observation(&self, _trace: &mut Trace) -> crate::Result<()> {
        Ok(())
    }
}

/// Ordered interceptor list. Failures of one interceptor are logged and never
/// stop the others.
#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, interceptor: Arc<dyn Interceptor>) {
        self.interceptors.push(interceptor);
    }

    pub fn with(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.push(Arc::new(interceptor));
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.interceptors.iter().map(|i| i.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    pub async fn on_reason(&self, trace: &mut Trace, message: &Message) {
        for interceptor in &self.interceptors {
            if let Err(e) = interceptor.on_reason(trace, message).await {
                tracing::warn!(
                    interceptor = interceptor.name(),
                    error = %e,
                    "on_reason failed"
                );
            }
        }
    }

    pub async fn invoke_tool(
        &self,
        invocation: &ToolInvocation,
        tools: &ToolRegistry,
    ) -> Result<ToolOutput, ToolError> {
        ToolNext::new(&self.interceptors, tools).run(invocation).await
    }

    pub async fn on_observation(&self, trace: &mut Trace) {
        for interceptor in &self.interceptors {
            if let Err(e) = interceptor.on_observation(trace).await {
                tracing::warn!(
                    interceptor = interceptor.name(),
                    error = %e,
                    "on_observation failed"
                );
            }
        }
    }
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("interceptors", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FnTool;
    use std::sync::Mutex;

    struct Tagger {
        tag: &'static str,
        seen: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Interceptor for Tagger {
        fn name(&self) -> &str {
            self.tag
        }

        async fn intercept_tool(
            &self,
            invocation: &ToolInvocation,
            next: ToolNext<'_>,
        ) -> Result<ToolOutput, ToolError> {
            self.seen.lock().unwrap().push(self.tag);
            let out = next.run(invocation).await?;
            Ok(ToolOutput::text(format!("{}({})", self.tag, out.as_text())))
        }
    }

    struct Failing;

    #[async_trait]
    impl Interceptor for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn on_observation(&self, _trace: &mut Trace) -> crate::Result<()> {
            Err(crate::Error::Model("boom".into()))
        }
    }

    #[tokio::test]
    async fn test_chain_runs_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let chain = InterceptorChain::new()
            .with(Tagger {
                tag: "outer",
                seen: seen.clone(),
            })
            .with(Tagger {
                tag: "inner",
                seen: seen.clone(),
            });
        let tools = ToolRegistry::new().with_tool(FnTool::new("echo", |_| Ok("raw".into())));

        let invocation = ToolInvocation::new("s", "a", ToolCall::new("1", "echo", serde_json::json!({})));
        let out = chain.invoke_tool(&invocation, &tools).await.unwrap();

        assert_eq!(out.as_text(), "outer(inner(raw))");
        assert_eq!(*seen.lock().unwrap(), vec!["outer", "inner"]);
        assert_eq!(chain.names(), vec!["outer", "inner"]);
    }

    #[tokio::test]
    async fn test_unknown_tool_reaches_caller() {
        let chain = InterceptorChain::new();
        let invocation = ToolInvocation::new("s", "a", ToolCall::new("1", "nope", serde_json::json!({})));
        let err = chain
            .invoke_tool(&invocation, &ToolRegistry::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool { .. }));
    }

    #[tokio::test]
    async fn test_failing_interceptor_is_isolated() {
        let chain = InterceptorChain::new().with(Failing);
        let mut trace = Trace::new("a");
        chain.on_observation(&mut trace).await;
        assert!(!trace.is_pending());
    }
}
