//! Why a run is paused and what it is waiting for.

use serde::{Deserialize, Serialize};

use crate::hitl::Decision;
use crate::types::ToolCall;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowPhase {
    Start,
    End,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SuspensionKind {
    /// A gated tool call waits for approval.
    ToolApproval { call: ToolCall },
    /// The loop guard saw the same action repeat.
    LoopDetected {
        tool_name: String,
        fingerprint: String,
    },
    /// A team member suspended; the decision belongs to the member's trace.
    Member { name: String },
    /// A flow interceptor paused the team at a member boundary.
    Flow { node: String, phase: FlowPhase },
}

impl SuspensionKind {
    /// Name under which the pending task is registered and decisions are submitted.
    pub fn subject(&self) -> &str {
        match self {
            Self::ToolApproval { call } => &call.name,
            Self::LoopDetected { tool_name, .. } => tool_name,
            Self::Member { name } => name,
            Self::Flow { node, .. } => node,
        }
    }

    pub fn arguments(&self) -> serde_json::Value {
        match self {
            Self::ToolApproval { call } => call.arguments.clone(),
            _ => serde_json::Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suspension {
    pub kind: SuspensionKind,
    pub reason: String,
    /// Recorded by the HITL API before the run is resumed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
}

impl Suspension {
    pub fn new(kind: SuspensionKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
            decision: None,
        }
    }

    /// Whether a decision submitted for `subject` applies to this suspension.
    /// Member suspensions are decided on the member's own trace.
    pub fn accepts(&self, subject: &str) -> bool {
        !matches!(self.kind, SuspensionKind::Member { .. }) && self.kind.subject() == subject
    }
}
