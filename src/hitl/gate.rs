//! Per-tool approval gate.

use std::collections::HashMap;
use std::sync::Arc;

use super::{PendingTask, PendingTaskStore};
use crate::types::ToolCall;

/// Returns a reason when the call must wait for a human.
pub type Validator = Arc<dyn Fn(&serde_json::Value) -> Option<String> + Send + Sync>;

/// Checks tool calls against registered validators before they execute.
#[derive(Clone)]
pub struct HitlGate {
    validators: HashMap<String, Validator>,
    store: Arc<dyn PendingTaskStore>,
}

impl HitlGate {
    pub fn new(store: Arc<dyn PendingTaskStore>) -> Self {
        Self {
            validators: HashMap::new(),
            store,
        }
    }

    /// Gate `tool_name` with a validator over its arguments.
    pub fn require<F>(mut self, tool_name: impl Into<String>, validator: F) -> Self
    where
        F: Fn(&serde_json::Value) -> Option<String> + Send + Sync + 'static,
    {
        self.validators.insert(tool_name.into(), Arc::new(validator));
        self
    }

    /// Gate every call to `tool_name`.
    pub fn always(self, tool_name: impl Into<String>, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        self.require(tool_name, move |_| Some(reason.clone()))
    }

    pub fn guards(&self, tool_name: &str) -> bool {
        self.validators.contains_key(tool_name)
    }

    pub fn store(&self) -> &Arc<dyn PendingTaskStore> {
        &self.store
    }

    /// Run the validator for `call`; a returned reason is recorded as a
    /// [`PendingTask`] for (session, tool).
    pub fn check(&self, session_id: &str, call: &ToolCall) -> Option<PendingTask> {
        let validator = self.validators.get(&call.name)?;
        let reason = validator(&call.arguments)?;

        let task = PendingTask::new(session_id, &call.name, call.arguments.clone(), reason);
        tracing::info!(
            session_id,
            tool = %call.name,
            reason = %task.reason,
            "Tool call requires approval"
        );
        self.store.put(task.clone());
        Some(task)
    }
}

impl std::fmt::Debug for HitlGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tools: Vec<_> = self.validators.keys().collect();
        tools.sort();
        f.debug_struct("HitlGate").field("tools", &tools).finish()
    }
}
