//! Pending tasks and the decisions that resolve them.

use serde::{Deserialize, Serialize};

/// A suspended action waiting for an external decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingTask {
    pub session_id: String,
    pub tool_name: String,
    pub arguments: serde_json::Value,
    pub reason: String,
}

impl PendingTask {
    pub fn new(
        session_id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: serde_json::Value,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            tool_name: tool_name.into(),
            arguments,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    Approve,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: DecisionAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_arguments: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Decision {
    pub fn approve() -> Self {
        Self {
            action: DecisionAction::Approve,
            modified_arguments: None,
            comment: None,
        }
    }

    /// Approve, replacing the call's arguments.
    pub fn approve_with(arguments: serde_json::Value) -> Self {
        Self {
            modified_arguments: Some(arguments),
            ..Self::approve()
        }
    }

    pub fn reject() -> Self {
        Self {
            action: DecisionAction::Reject,
            modified_arguments: None,
            comment: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn is_approved(&self) -> bool {
        self.action == DecisionAction::Approve
    }

    /// Observation fed back to the model when a call is rejected.
    pub fn rejection_note(&self, subject: &str) -> String {
        match &self.comment {
            Some(comment) => format!(
                "The call to [{}] was rejected by a human reviewer: {}",
                subject, comment
            ),
            None => format!("The call to [{}] was rejected by a human reviewer.", subject),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_builders() {
        let d = Decision::approve_with(serde_json::json!({"path": "/tmp"}));
        assert!(d.is_approved());
        assert!(d.modified_arguments.is_some());

        let d = Decision::reject().with_comment("too risky");
        assert!(!d.is_approved());
        assert!(d.rejection_note("shell").contains("too risky"));
    }

    #[test]
    fn test_decision_serde() {
        let d: Decision = serde_json::from_str(r#"{"action": "reject"}"#).unwrap();
        assert_eq!(d.action, DecisionAction::Reject);
        assert!(d.comment.is_none());
    }
}
