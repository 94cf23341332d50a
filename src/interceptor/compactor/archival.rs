//! Moves dropped messages to an external store and leaves a pointer behind.

use std::sync::Arc;

use async_trait::async_trait;

use super::SummarizationStrategy;
use crate::session::ArchiveStore;
use crate::trace::Trace;
use crate::types::Message;

const ARCHIVES_KEY: &str = "compactor.archives";

pub struct ArchivalSummary {
    store: Arc<dyn ArchiveStore>,
}

impl ArchivalSummary {
    pub fn new(store: Arc<dyn ArchiveStore>) -> Self {
        Self { store }
    }

    /// Archive ids written for this trace, oldest first.
    pub fn archive_ids(trace: &Trace) -> Vec<String> {
        trace.extra(ARCHIVES_KEY).unwrap_or_default()
    }
}

#[async_trait]
impl SummarizationStrategy for ArchivalSummary {
    fn name(&self) -> &str {
        "archival"
    }

    async fn summarize(
        &self,
        trace: &mut Trace,
        dropped: &[Message],
    ) -> crate::Result<Option<Message>> {
        if dropped.is_empty() {
            return Ok(None);
        }
        let id = self.store.archive(&trace.agent_name, dropped).await?;

        let mut ids = Self::archive_ids(trace);
        ids.push(id.clone());
        trace.set_extra(ARCHIVES_KEY, &ids);

        Ok(Some(Message::system(format!(
            "{} earlier messages were moved to archive [{}]. \
             Ask for that archive id if you need their details.",
            dropped.len(),
            id
        ))))
    }
}
