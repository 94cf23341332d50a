//! The mutable run record of one agent (or team) within one session.

mod record;
mod suspension;

pub use record::{SUPERVISOR, TeamRecord};
pub use suspension::{FlowPhase, Suspension, SuspensionKind};

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::hitl::PendingTask;
use crate::types::{Message, Role};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStatus {
    #[default]
    Running,
    PendingApproval,
    Finished,
}

impl TraceStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

/// Full state of one agent's run: memory, status, counters and strategy scratch space.
///
/// Stored in the session snapshot under `"__" + agent_name` and mutated only by
/// the loop (and its interceptors) or the team that owns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub agent_name: String,
    #[serde(default)]
    pub status: TraceStatus,
    #[serde(default)]
    pub working_memory: Vec<Message>,
    #[serde(default)]
    pub plans: Vec<String>,
    #[serde(default)]
    pub iteration_count: usize,
    /// Strategy-private scratch state (rolling summary, loop-guard history, ...).
    #[serde(default)]
    pub extras: BTreeMap<String, serde_json::Value>,
    /// Current node of a team run; `None` means the supervisor decides next.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<TeamRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspension: Option<Suspension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_answer: Option<String>,
}

impl Trace {
    pub fn new(agent_name: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            status: TraceStatus::Running,
            working_memory: Vec::new(),
            plans: Vec::new(),
            iteration_count: 0,
            extras: BTreeMap::new(),
            route: None,
            records: Vec::new(),
            suspension: None,
            final_answer: None,
        }
    }

    /// Snapshot key for an agent's trace.
    pub fn key_for(agent_name: &str) -> String {
        format!("__{}", agent_name)
    }

    pub fn key(&self) -> String {
        Self::key_for(&self.agent_name)
    }

    /// Start a new task on this trace, keeping memory and extras from earlier tasks.
    pub fn begin_task(&mut self, prompt: impl Into<String>) {
        self.status = TraceStatus::Running;
        self.iteration_count = 0;
        self.suspension = None;
        self.final_answer = None;
        self.route = None;
        self.working_memory.push(Message::user(prompt));
    }

    pub fn push(&mut self, message: Message) {
        self.working_memory.push(message);
    }

    pub fn is_pending(&self) -> bool {
        self.status == TraceStatus::PendingApproval
    }

    pub fn is_finished(&self) -> bool {
        self.status == TraceStatus::Finished
    }

    pub fn has_plans(&self) -> bool {
        !self.plans.is_empty()
    }

    pub fn set_plans(&mut self, plans: Vec<String>) {
        self.plans = plans;
    }

    pub fn extra<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.extras
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn set_extra<T: Serialize>(&mut self, key: impl Into<String>, value: T) {
        match serde_json::to_value(value) {
            Ok(v) => {
                self.extras.insert(key.into(), v);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to store trace extra");
            }
        }
    }

    pub fn remove_extra(&mut self, key: &str) -> Option<serde_json::Value> {
        self.extras.remove(key)
    }

    pub fn suspend(&mut self, suspension: Suspension) {
        self.status = TraceStatus::PendingApproval;
        self.suspension = Some(suspension);
    }

    /// Take the suspension once resumed; the status goes back to running.
    pub fn take_suspension(&mut self) -> Option<Suspension> {
        if self.status == TraceStatus::PendingApproval {
            self.status = TraceStatus::Running;
        }
        self.suspension.take()
    }

    /// The task a reviewer must decide on, derived from the open suspension.
    ///
    /// `None` when nothing is pending, when a decision was already recorded,
    /// or for member suspensions (the member's own trace carries the task).
    pub fn pending_task(&self, session_id: &str) -> Option<PendingTask> {
        let suspension = self
            .suspension
            .as_ref()
            .filter(|s| self.is_pending() && s.decision.is_none())?;
        let arguments = match &suspension.kind {
            SuspensionKind::Member { .. } => return None,
            SuspensionKind::LoopDetected { .. } => self
                .last_assistant()
                .and_then(|m| m.tool_calls.first())
                .map(|c| c.arguments.clone())
                .unwrap_or_default(),
            kind => kind.arguments(),
        };
        Some(PendingTask::new(
            session_id,
            suspension.kind.subject(),
            arguments,
            suspension.reason.as_str(),
        ))
    }

    pub fn finish(&mut self, answer: impl Into<String>) {
        self.status = TraceStatus::Finished;
        self.final_answer = Some(answer.into());
        self.suspension = None;
    }

    pub fn last_assistant(&self) -> Option<&Message> {
        self.working_memory
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
    }

    /// The task this trace was started with (first user message).
    pub fn original_task(&self) -> Option<&str> {
        self.working_memory
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }

    /// The task of the most recent `begin_task`.
    pub fn current_task(&self) -> Option<&str> {
        self.working_memory
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }

    pub fn record(&mut self, record: TeamRecord) {
        self.records.push(record);
    }

    /// Human-readable rendering of the team records.
    pub fn transcript(&self) -> String {
        self.records
            .iter()
            .map(|r| format!("[{}] {}", r.source, r.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
