//! Summarization strategy contract and the fan-out composite.

use std::sync::Arc;

use async_trait::async_trait;

use crate::trace::Trace;
use crate::types::Message;

/// Condenses the messages a compaction pass drops into one message.
///
/// Strategies may keep private state in [`Trace::extras`]. Returning `None`
/// contributes nothing; returning an error is logged by the caller and treated
/// the same way.
#[async_trait]
pub trait SummarizationStrategy: Send + Sync {
    fn name(&self) -> &str;

    async fn summarize(
        &self,
        trace: &mut Trace,
        dropped: &[Message],
    ) -> crate::Result<Option<Message>>;
}

/// Runs strategies in order and joins their non-empty outputs into one
/// system message. A failing strategy is skipped.
#[derive(Clone, Default)]
pub struct CompositeSummary {
    strategies: Vec<Arc<dyn SummarizationStrategy>>,
}

impl CompositeSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, strategy: impl SummarizationStrategy + 'static) -> Self {
        self.strategies.push(Arc::new(strategy));
        self
    }

    pub fn with_arc(mut self, strategy: Arc<dyn SummarizationStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

#[async_trait]
impl SummarizationStrategy for CompositeSummary {
    fn name(&self) -> &str {
        "composite"
    }

    async fn summarize(
        &self,
        trace: &mut Trace,
        dropped: &[Message],
    ) -> crate::Result<Option<Message>> {
        let mut parts = Vec::new();
        for strategy in &self.strategies {
            match strategy.summarize(trace, dropped).await {
                Ok(Some(message)) if !message.content.trim().is_empty() => {
                    parts.push(message.content)
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(
                        strategy = strategy.name(),
                        error = %e,
                        "Summarization strategy failed, skipping"
                    );
                }
            }
        }

        if parts.is_empty() {
            return Ok(None);
        }
        Ok(Some(Message::system(parts.join("\n\n"))))
    }
}

impl std::fmt::Debug for CompositeSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.strategies.iter().map(|s| s.name()).collect();
        f.debug_struct("CompositeSummary")
            .field("strategies", &names)
            .finish()
    }
}
