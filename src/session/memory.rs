//! In-memory session (tests and single-process deployments).

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{AgentSession, SessionConfig, SessionResult, Snapshot};
use crate::types::Message;

#[derive(Debug)]
pub struct InMemorySession {
    id: String,
    config: SessionConfig,
    snapshot: RwLock<Snapshot>,
}

impl InMemorySession {
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_config(id, SessionConfig::default())
    }

    /// Session with a generated id.
    pub fn generated() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_config(id: impl Into<String>, config: SessionConfig) -> Self {
        Self {
            id: id.into(),
            config,
            snapshot: RwLock::new(Snapshot::new()),
        }
    }

    /// Session restored from a persisted snapshot.
    pub fn from_snapshot(id: impl Into<String>, snapshot: Snapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
            ..Self::new(id)
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

#[async_trait]
impl AgentSession for InMemorySession {
    fn session_id(&self) -> &str {
        &self.id
    }

    async fn snapshot(&self) -> Snapshot {
        self.snapshot.read().await.clone()
    }

    async fn update_snapshot(&self, snapshot: Snapshot) -> SessionResult<()> {
        *self.snapshot.write().await = snapshot;
        Ok(())
    }

    async fn add_history_message(&self, agent_name: &str, message: Message) {
        self.snapshot
            .write()
            .await
            .push_history(agent_name, message, self.config.max_history);
    }

    async fn history_messages(&self, agent_name: &str, limit: usize) -> Vec<Message> {
        self.snapshot.read().await.history(agent_name, limit)
    }

    async fn reset(&self) {
        *self.snapshot.write().await = Snapshot::new();
    }
}
