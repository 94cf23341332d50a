//! Hierarchical rolling summary.

use std::sync::Arc;

use async_trait::async_trait;

use super::{SummarizationStrategy, render_messages};
use crate::model::{ModelCaller, ModelRequest};
use crate::trace::Trace;
use crate::types::Message;

const SUMMARY_KEY: &str = "compactor.rolling_summary";
pub const SUMMARY_TRUNCATION_MARKER: &str = "...[summary truncated]";

/// Merges the previous summary (kept in the trace extras) with each newly
/// dropped excerpt into one updated summary capped at `max_chars`.
pub struct RollingSummary {
    model: Arc<dyn ModelCaller>,
    max_chars: usize,
}

impl RollingSummary {
    pub fn new(model: Arc<dyn ModelCaller>) -> Self {
        Self {
            model,
            max_chars: 4000,
        }
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    pub fn current(trace: &Trace) -> Option<String> {
        trace.extra(SUMMARY_KEY)
    }

    fn cap(&self, summary: &str) -> String {
        match summary.char_indices().nth(self.max_chars) {
            Some((cut, _)) => format!("{}{}", &summary[..cut], SUMMARY_TRUNCATION_MARKER),
            None => summary.to_string(),
        }
    }
}

#[async_trait]
impl SummarizationStrategy for RollingSummary {
    fn name(&self) -> &str {
        "rolling-summary"
    }

    async fn summarize(
        &self,
        trace: &mut Trace,
        dropped: &[Message],
    ) -> crate::Result<Option<Message>> {
        let previous = Self::current(trace);
        // Earlier summaries are already folded into `previous`.
        let fresh: Vec<Message> = dropped.iter().filter(|m| !m.is_system()).cloned().collect();
        if fresh.is_empty() && previous.is_none() {
            return Ok(None);
        }

        let prompt = match &previous {
            Some(previous) => format!(
                "Current summary:\n{}\n\nNew messages:\n{}\n\nRewrite the summary so it covers both. \
                 Keep it under {} characters.",
                previous,
                render_messages(&fresh),
                self.max_chars
            ),
            None => format!(
                "Summarize these messages in under {} characters:\n{}",
                self.max_chars,
                render_messages(&fresh)
            ),
        };

        let messages = [Message::user(prompt)];
        let reply = self.model.call(ModelRequest::without_tools(&messages)).await?;
        let merged = self.cap(reply.content.trim());
        if merged.is_empty() {
            return Ok(previous.map(|p| Message::system(format!("Running summary:\n{}", p))));
        }

        trace.set_extra(SUMMARY_KEY, &merged);
        Ok(Some(Message::system(format!("Running summary:\n{}", merged))))
    }
}
