//! Context compaction.
//!
//! Once working memory outgrows `max_messages + 2`, the compactor keeps the
//! leading system messages, the original task and the most recent tail, and
//! replaces everything in between with one summary message produced by a
//! [`SummarizationStrategy`]. The resulting layout is:
//!
//! ```text
//! [leading system...] [original task] [summary] [plan] [recent tail...]
//! ```
//!
//! Summary and plan messages from an earlier pass sit between the task and the
//! tail, so the next pass drops (and re-summarizes) them instead of stacking.

mod archival;
mod key_facts;
mod llm;
mod rolling;
mod strategy;

pub use archival::ArchivalSummary;
pub use key_facts::KeyFactExtraction;
pub use llm::LlmSummary;
pub use rolling::RollingSummary;
pub use strategy::{CompositeSummary, SummarizationStrategy};

use std::sync::Arc;

use async_trait::async_trait;

use super::Interceptor;
use crate::trace::Trace;
use crate::types::{Message, Role};

pub struct ContextCompactor {
    max_messages: usize,
    strategy: Arc<dyn SummarizationStrategy>,
}

impl ContextCompactor {
    /// Compactor using [`KeyFactExtraction`], which needs no model.
    pub fn new(max_messages: usize) -> Self {
        Self::with_strategy(max_messages, Arc::new(KeyFactExtraction::default()))
    }

    pub fn with_strategy(max_messages: usize, strategy: Arc<dyn SummarizationStrategy>) -> Self {
        Self {
            max_messages: max_messages.max(1),
            strategy,
        }
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    pub fn needs_compaction(&self, trace: &Trace) -> bool {
        trace.working_memory.len() > self.max_messages + 2
    }

    /// Compact `trace` in place. Returns whether anything was dropped.
    pub async fn compact(&self, trace: &mut Trace) -> bool {
        if !self.needs_compaction(trace) {
            return false;
        }

        let memory = &trace.working_memory;
        let len = memory.len();
        let system_end = memory.iter().take_while(|m| m.is_system()).count();
        let task_index = memory[system_end..]
            .iter()
            .position(|m| m.role == Role::User)
            .map(|i| i + system_end);

        let head_len = system_end + usize::from(task_index.is_some());
        let keep_from = task_index.map_or(system_end, |i| i + 1);
        let tail_len = self.max_messages.saturating_sub(head_len).max(1);
        let cut = pair_safe_cut(memory, len.saturating_sub(tail_len).max(keep_from), keep_from);

        let dropped: Vec<Message> = memory[system_end..cut]
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(i + system_end) != task_index)
            .map(|(_, m)| m.clone())
            .collect();
        if dropped.is_empty() {
            return false;
        }

        let head: Vec<Message> = memory[..system_end].to_vec();
        let task = task_index.map(|i| memory[i].clone());
        let tail: Vec<Message> = memory[cut..].to_vec();

        let summary = match self.strategy.summarize(trace, &dropped).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(
                    strategy = self.strategy.name(),
                    error = %e,
                    "Summarization failed, compacting without summary"
                );
                None
            }
        };

        let mut compacted = head;
        compacted.extend(task);
        compacted.extend(summary);
        if trace.has_plans() {
            compacted.push(plan_message(&trace.plans));
        }
        compacted.extend(tail);

        tracing::debug!(
            agent = %trace.agent_name,
            before = len,
            after = compacted.len(),
            dropped = dropped.len(),
            "Working memory compacted"
        );
        trace.working_memory = compacted;
        true
    }
}

/// Moves `cut` so that no tool response is separated from its assistant call.
/// Prefers extending the kept tail backward; never crosses `floor`.
fn pair_safe_cut(memory: &[Message], cut: usize, floor: usize) -> usize {
    let mut back = cut;
    while back > floor && back < memory.len() && memory[back].role == Role::Tool {
        back -= 1;
    }
    if back < memory.len() && memory[back].role != Role::Tool {
        return back;
    }

    let mut forward = cut;
    while forward < memory.len() && memory[forward].role == Role::Tool {
        forward += 1;
    }
    forward
}

pub(crate) fn plan_message(plans: &[String]) -> Message {
    let lines: Vec<String> = plans
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{}. {}", i + 1, p))
        .collect();
    Message::system(format!("Active plan:\n{}", lines.join("\n")))
}

/// Renders messages as `role: content` lines for summarization prompts.
pub(crate) fn render_messages(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| {
            let mut line = format!("{}: {}", m.role, m.content);
            for call in &m.tool_calls {
                line.push_str(&format!("\n  -> {}({})", call.name, call.arguments));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Interceptor for ContextCompactor {
    fn name(&self) -> &str {
        "context-compactor"
    }

    async fn on_observation(&self, trace: &mut Trace) -> crate::Result<()> {
        self.compact(trace).await;
        Ok(())
    }
}

impl std::fmt::Debug for ContextCompactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextCompactor")
            .field("max_messages", &self.max_messages)
            .field("strategy", &self.strategy.name())
            .finish()
    }
}
