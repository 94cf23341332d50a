//! External storage for messages evicted by archival compaction.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::SessionResult;
use crate::types::Message;

#[async_trait]
pub trait ArchiveStore: Send + Sync {
    /// Store `messages` and return an id that [`ArchiveStore::fetch`] accepts.
    async fn archive(&self, agent_name: &str, messages: &[Message]) -> SessionResult<String>;

    async fn fetch(&self, archive_id: &str) -> SessionResult<Option<Vec<Message>>>;
}

#[derive(Debug, Default)]
pub struct MemoryArchiveStore {
    entries: RwLock<HashMap<String, Vec<Message>>>,
}

impl MemoryArchiveStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ArchiveStore for MemoryArchiveStore {
    async fn archive(&self, agent_name: &str, messages: &[Message]) -> SessionResult<String> {
        let id = format!("{}-{}", agent_name, uuid::Uuid::new_v4().simple());
        self.entries
            .write()
            .await
            .insert(id.clone(), messages.to_vec());
        Ok(id)
    }

    async fn fetch(&self, archive_id: &str) -> SessionResult<Option<Vec<Message>>> {
        Ok(self.entries.read().await.get(archive_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_archive_and_fetch() {
        let store = MemoryArchiveStore::new();
        let id = store
            .archive("coder", &[Message::user("a"), Message::assistant("b")])
            .await
            .unwrap();

        assert!(id.starts_with("coder-"));
        let fetched = store.fetch(&id).await.unwrap().unwrap();
        assert_eq!(fetched.len(), 2);
        assert!(store.fetch("nope").await.unwrap().is_none());
    }
}
