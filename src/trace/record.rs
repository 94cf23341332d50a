use serde::{Deserialize, Serialize};

/// Source name used for supervisor entries.
pub const SUPERVISOR: &str = "supervisor";

/// Append-only audit entry of a team run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRecord {
    pub source: String,
    pub content: String,
    pub timestamp_ms: i64,
}

impl TeamRecord {
    pub fn new(source: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            content: content.into(),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn supervisor(content: impl Into<String>) -> Self {
        Self::new(SUPERVISOR, content)
    }

    pub fn is_supervisor(&self) -> bool {
        self.source == SUPERVISOR
    }
}
