//! Serializable checkpoint of a run.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use super::{SessionError, SessionResult};
use crate::trace::Trace;
use crate::types::Message;

pub const SNAPSHOT_VERSION: u32 = 1;

/// Routing marker: which node a team run was last executing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
}

/// Every trace of a session keyed by `"__" + agent_name`, the routing
/// position, and the bounded per-agent history.
///
/// Outstanding suspensions (and submitted decisions) live on the traces, so a
/// restored snapshot resumes exactly where the original stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    #[serde(default)]
    traces: BTreeMap<String, Trace>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<Checkpoint>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    history: BTreeMap<String, VecDeque<Message>>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl Snapshot {
    pub fn new() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            traces: BTreeMap::new(),
            checkpoint: None,
            history: BTreeMap::new(),
        }
    }

    pub fn trace(&self, agent_name: &str) -> Option<&Trace> {
        self.traces.get(&Trace::key_for(agent_name))
    }

    pub fn trace_mut(&mut self, agent_name: &str) -> Option<&mut Trace> {
        self.traces.get_mut(&Trace::key_for(agent_name))
    }

    /// Existing trace for `agent_name`, created lazily.
    pub fn trace_or_default(&mut self, agent_name: &str) -> &mut Trace {
        self.traces
            .entry(Trace::key_for(agent_name))
            .or_insert_with(|| Trace::new(agent_name))
    }

    pub fn put_trace(&mut self, trace: Trace) {
        self.traces.insert(trace.key(), trace);
    }

    pub fn remove_trace(&mut self, agent_name: &str) -> Option<Trace> {
        self.traces.remove(&Trace::key_for(agent_name))
    }

    pub fn traces(&self) -> impl Iterator<Item = &Trace> {
        self.traces.values()
    }

    pub fn traces_mut(&mut self) -> impl Iterator<Item = &mut Trace> {
        self.traces.values_mut()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty() && self.history.is_empty()
    }

    /// Append to the history of `agent_name`, keeping at most `max` messages.
    /// System messages are not kept.
    pub fn push_history(&mut self, agent_name: &str, message: Message, max: usize) {
        if message.is_system() {
            return;
        }
        let entries = self.history.entry(agent_name.to_string()).or_default();
        entries.push_back(message);
        while entries.len() > max {
            entries.pop_front();
        }
    }

    /// Up to `limit` most recent history messages of `agent_name`, oldest first.
    pub fn history(&self, agent_name: &str, limit: usize) -> Vec<Message> {
        self.history
            .get(agent_name)
            .map(|entries| {
                let skip = entries.len().saturating_sub(limit);
                entries.iter().skip(skip).cloned().collect()
            })
            .unwrap_or_default()
    }

    /// Opaque (JSON) form for persisting across process boundaries.
    pub fn to_opaque(&self) -> SessionResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Restore from [`Snapshot::to_opaque`] output. Unreadable input is fatal.
    pub fn from_opaque(data: &str) -> SessionResult<Self> {
        let snapshot: Snapshot =
            serde_json::from_str(data).map_err(|e| SessionError::Corrupted {
                message: e.to_string(),
            })?;

        if snapshot.version > SNAPSHOT_VERSION {
            return Err(SessionError::Corrupted {
                message: format!(
                    "unsupported snapshot version {} (max {})",
                    snapshot.version, SNAPSHOT_VERSION
                ),
            });
        }

        if let Some((key, trace)) = snapshot.traces.iter().find(|(k, t)| **k != t.key()) {
            return Err(SessionError::Corrupted {
                message: format!("trace key {} does not match agent {}", key, trace.agent_name),
            });
        }

        Ok(snapshot)
    }
}
