//! Plain model-written summary.

use std::sync::Arc;

use async_trait::async_trait;

use super::{SummarizationStrategy, render_messages};
use crate::model::{ModelCaller, ModelRequest};
use crate::trace::Trace;
use crate::types::Message;

const DEFAULT_INSTRUCTION: &str = "Summarize the following conversation excerpt. Keep decisions, \
tool results and open questions; drop pleasantries. Answer with the summary only.";

pub struct LlmSummary {
    model: Arc<dyn ModelCaller>,
    instruction: String,
}

impl LlmSummary {
    pub fn new(model: Arc<dyn ModelCaller>) -> Self {
        Self {
            model,
            instruction: DEFAULT_INSTRUCTION.to_string(),
        }
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }
}

#[async_trait]
impl SummarizationStrategy for LlmSummary {
    fn name(&self) -> &str {
        "llm-summary"
    }

    async fn summarize(
        &self,
        _trace: &mut Trace,
        dropped: &[Message],
    ) -> crate::Result<Option<Message>> {
        if dropped.is_empty() {
            return Ok(None);
        }
        let messages = [
            Message::system(self.instruction.as_str()),
            Message::user(render_messages(dropped)),
        ];
        let reply = self.model.call(ModelRequest::without_tools(&messages)).await?;
        let summary = reply.content.trim();
        if summary.is_empty() {
            return Ok(None);
        }
        Ok(Some(Message::system(format!(
            "Summary of earlier conversation:\n{}",
            summary
        ))))
    }
}
