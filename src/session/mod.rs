//! Session storage and checkpoint/resume.
//!
//! A session wraps one [`Snapshot`] (every trace of a run, nested teams
//! included), which also carries a bounded per-agent message history.
//!
//! # Persistence boundary
//!
//! The engine writes a trace back into the session snapshot at every stop point
//! (finished, suspended, iteration budget exhausted) and after each completed
//! act/observe step. Durable persistence is caller-triggered: a caller saves
//! [`AgentSession::snapshot`] with [`FileSnapshotStore::save`] (or its own
//! store) when it chooses. A crash between two explicit saves loses at most the
//! steps taken since the last save; the engine never retries or masks that.

mod archive;
mod file;
mod memory;
mod snapshot;

pub use archive::{ArchiveStore, MemoryArchiveStore};
pub use file::FileSnapshotStore;
pub use memory::InMemorySession;
pub use snapshot::{Checkpoint, SNAPSHOT_VERSION, Snapshot};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::trace::Trace;
use crate::types::Message;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session not found: {id}")]
    NotFound { id: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Snapshot corrupted: {message}")]
    Corrupted { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// History kept per agent in the snapshot; oldest messages are evicted first.
    pub max_history: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { max_history: 100 }
    }
}

impl SessionConfig {
    pub fn with_max_history(mut self, max: usize) -> Self {
        self.max_history = max;
        self
    }
}

/// Session storage consumed by agents and teams.
///
/// Runs of the same session are expected to be driven one at a time; separate
/// sessions run concurrently.
#[async_trait]
pub trait AgentSession: Send + Sync {
    fn session_id(&self) -> &str;

    async fn snapshot(&self) -> Snapshot;

    async fn update_snapshot(&self, snapshot: Snapshot) -> SessionResult<()>;

    /// Append to the history of `agent_name`, stored in the snapshot so it is
    /// persisted and restored with it. System messages are not kept.
    async fn add_history_message(&self, agent_name: &str, message: Message);

    /// Up to `limit` most recent history messages, oldest first.
    async fn history_messages(&self, agent_name: &str, limit: usize) -> Vec<Message>;

    /// Explicit reset: drops every trace and all history.
    async fn reset(&self);

    async fn load_trace(&self, agent_name: &str) -> Option<Trace> {
        self.snapshot().await.trace(agent_name).cloned()
    }

    /// Replace only this trace's entry in the snapshot.
    async fn save_trace(&self, trace: &Trace) -> SessionResult<()> {
        let mut snapshot = self.snapshot().await;
        snapshot.put_trace(trace.clone());
        self.update_snapshot(snapshot).await
    }
}
