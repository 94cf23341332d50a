//! Run outcome and streamed events.

use crate::hitl::PendingTask;
use crate::model::ModelChunk;
use crate::trace::TraceStatus;
use crate::types::{Message, ToolCall};

/// Events emitted while a run advances.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// Partial model output, in arrival order, before the reply is complete.
    Delta(ModelChunk),
    /// One assistant reply from THINKING.
    Reasoning(Message),
    ToolCall(ToolCall),
    Observation {
        call_id: String,
        tool_name: String,
        content: String,
    },
    Suspended(PendingTask),
    Finished(Box<AgentOutcome>),
    Failed(String),
}

/// Where a run stopped.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub agent_name: String,
    pub status: TraceStatus,
    pub answer: Option<String>,
    /// THINKING steps of the current task.
    pub iterations: usize,
    /// Tool calls executed during this invocation.
    pub tool_calls: usize,
    pub pending: Option<PendingTask>,
}

impl AgentOutcome {
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.status == TraceStatus::Finished
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == TraceStatus::PendingApproval
    }

    #[must_use]
    pub fn text(&self) -> &str {
        self.answer.as_deref().unwrap_or_default()
    }

    /// The answer as an assistant message, for callers that speak messages.
    pub fn message(&self) -> Message {
        Message::assistant(self.text())
    }
}
