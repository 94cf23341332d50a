//! Caller-facing decision API.

use std::sync::Arc;

use super::{Decision, PendingTask, PendingTaskStore};
use crate::session::AgentSession;
use crate::trace::SuspensionKind;
use crate::{Error, Result};

/// Lists outstanding tasks and records decisions for them.
///
/// A decision is written into the suspended trace inside the session snapshot,
/// so it survives serialization and is applied by the next `call(None, ..)`.
#[derive(Clone)]
pub struct Hitl {
    store: Arc<dyn PendingTaskStore>,
}

impl Hitl {
    pub fn new(store: Arc<dyn PendingTaskStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn PendingTaskStore> {
        &self.store
    }

    pub fn pending_task(&self, session_id: &str) -> Option<PendingTask> {
        self.store.get(session_id)
    }

    pub fn pending_tasks(&self, session_id: &str) -> Vec<PendingTask> {
        self.store.list(session_id)
    }

    /// Re-register the outstanding tasks of a restored session.
    ///
    /// The store is process memory while suspensions travel with the snapshot;
    /// call this after loading a snapshot into a fresh process. Returns the
    /// number of tasks registered.
    pub async fn restore(&self, session: &dyn AgentSession) -> usize {
        let session_id = session.session_id();
        let tasks: Vec<PendingTask> = session
            .snapshot()
            .await
            .traces()
            .filter_map(|t| t.pending_task(session_id))
            .collect();

        let count = tasks.len();
        for task in tasks {
            tracing::debug!(session_id, tool = %task.tool_name, "Pending task restored");
            self.store.put(task);
        }
        count
    }

    /// Record `decision` for the suspension waiting on `tool_name`.
    ///
    /// The store entry is claimed first, so of two concurrent submits for the
    /// same task exactly one succeeds.
    pub async fn submit(
        &self,
        session: &dyn AgentSession,
        tool_name: &str,
        decision: Decision,
    ) -> Result<()> {
        let session_id = session.session_id().to_string();
        let no_task = || Error::NoPendingTask {
            session_id: session_id.clone(),
            tool_name: tool_name.to_string(),
        };

        let claimed = self.store.remove(&session_id, tool_name).ok_or_else(no_task)?;

        let mut snapshot = session.snapshot().await;
        let Some(trace) = snapshot.traces_mut().find(|t| {
            t.is_pending()
                && t.suspension
                    .as_ref()
                    .is_some_and(|s| s.decision.is_none() && s.accepts(tool_name))
        }) else {
            tracing::warn!(
                session_id = %session_id,
                tool = %tool_name,
                "Dropping pending task with no suspended trace"
            );
            return Err(no_task());
        };

        let agent_name = trace.agent_name.clone();
        if let Some(suspension) = trace.suspension.as_mut() {
            if decision.modified_arguments.is_some()
                && !matches!(suspension.kind, SuspensionKind::ToolApproval { .. })
            {
                let reason = suspension.reason.clone();
                self.store.put(claimed);
                return Err(Error::InvalidDecision(format!(
                    "modified arguments only apply to tool approvals, [{}] is waiting on: {}",
                    tool_name, reason
                )));
            }
            suspension.decision = Some(decision.clone());
        }

        if let Err(e) = session.update_snapshot(snapshot).await {
            self.store.put(claimed);
            return Err(e.into());
        }

        tracing::info!(
            session_id = %session_id,
            agent = %agent_name,
            tool = %tool_name,
            action = ?decision.action,
            "Decision recorded"
        );
        Ok(())
    }
}

impl std::fmt::Debug for Hitl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hitl").finish_non_exhaustive()
    }
}
