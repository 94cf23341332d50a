//! Repeat-action detection.

use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::Interceptor;
use crate::agent::protocol;
use crate::trace::{Suspension, SuspensionKind, Trace};
use crate::types::{Message, ToolCall};

const HISTORY_KEY: &str = "loop_guard.history";
const TRIPPED_KEY: &str = "loop_guard.tripped";

pub const LOOP_REASON: &str = "possible loop";

/// Suspends the run when one fingerprint shows up `threshold` times within the
/// last `window_size` assistant turns.
///
/// A streak suspends once. The guard re-arms only after a different
/// fingerprint is seen.
#[derive(Debug, Clone)]
pub struct LoopGuard {
    threshold: usize,
    window_size: usize,
}

impl Default for LoopGuard {
    fn default() -> Self {
        Self::new(3, 6)
    }
}

impl LoopGuard {
    pub fn new(threshold: usize, window_size: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            threshold,
            window_size: window_size.max(threshold),
        }
    }

    pub fn from_config(config: &crate::config::LoopGuardConfig) -> Self {
        Self::new(config.threshold, config.window_size)
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Fingerprint of an assistant turn: structured calls first, then the
    /// `Action:` text protocol. Plain answers have none.
    pub fn fingerprint_message(message: &Message) -> Option<String> {
        if message.has_tool_calls() {
            return Some(fingerprint(&message.tool_calls));
        }
        let calls = protocol::parse_actions(&message.content);
        (!calls.is_empty()).then(|| fingerprint(&calls))
    }
}

/// Stable sha256 over `(name, canonical arguments)` of every call, ids excluded.
pub fn fingerprint(calls: &[ToolCall]) -> String {
    let mut hasher = Sha256::new();
    for call in calls {
        hasher.update(call.name.as_bytes());
        hasher.update([0u8]);
        hasher.update(canonical_json(&call.arguments).as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{}:{}", Value::String(k.clone()), canonical_json(&map[k])))
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        other => other.to_string(),
    }
}

#[async_trait]
impl Interceptor for LoopGuard {
    fn name(&self) -> &str {
        "loop-guard"
    }

    async fn on_reason(&self, trace: &mut Trace, message: &Message) -> crate::Result<()> {
        if trace.is_pending() {
            return Ok(());
        }
        let Some(fp) = Self::fingerprint_message(message) else {
            return Ok(());
        };

        let mut history: Vec<String> = trace.extra(HISTORY_KEY).unwrap_or_default();
        history.push(fp.clone());
        if history.len() > self.window_size {
            let excess = history.len() - self.window_size;
            history.drain(..excess);
        }
        let occurrences = history.iter().filter(|h| **h == fp).count();
        trace.set_extra(HISTORY_KEY, &history);

        let tripped: Option<String> = trace.extra(TRIPPED_KEY);
        if tripped.as_deref() != Some(fp.as_str()) {
            trace.remove_extra(TRIPPED_KEY);
        } else {
            return Ok(());
        }

        if occurrences >= self.threshold {
            let tool_name = message
                .tool_calls
                .first()
                .map(|c| c.name.clone())
                .or_else(|| {
                    protocol::parse_actions(&message.content)
                        .into_iter()
                        .next()
                        .map(|c| c.name)
                })
                .unwrap_or_default();

            tracing::warn!(
                agent = %trace.agent_name,
                tool = %tool_name,
                occurrences,
                window = self.window_size,
                "Repeated action detected"
            );
            trace.set_extra(TRIPPED_KEY, &fp);
            trace.suspend(Suspension::new(
                SuspensionKind::LoopDetected {
                    tool_name,
                    fingerprint: fp,
                },
                LOOP_REASON,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, args: Value) -> Message {
        Message::assistant_with_tools("", vec![ToolCall::generated(name, args)])
    }

    async fn feed(guard: &LoopGuard, trace: &mut Trace, message: Message) -> bool {
        trace.push(message.clone());
        guard.on_reason(trace, &message).await.unwrap();
        trace.is_pending()
    }

    #[test]
    fn test_fingerprint_ignores_ids_and_key_order() {
        let a = vec![ToolCall::new("1", "f", json!({"a": 1, "b": {"x": 1, "y": 2}}))];
        let b = vec![ToolCall::new("2", "f", json!({"b": {"y": 2, "x": 1}, "a": 1}))];
        assert_eq!(fingerprint(&a), fingerprint(&b));

        let c = vec![ToolCall::new("1", "g", json!({"a": 1, "b": {"x": 1, "y": 2}}))];
        assert_ne!(fingerprint(&a), fingerprint(&c));
    }

    #[tokio::test]
    async fn test_identical_calls_trigger_once() {
        let guard = LoopGuard::new(3, 6);
        let mut trace = Trace::new("a");
        let weather = || call("get_weather", json!({"city": "Shanghai"}));

        assert!(!feed(&guard, &mut trace, weather()).await);
        assert!(!feed(&guard, &mut trace, weather()).await);
        assert!(feed(&guard, &mut trace, weather()).await);

        let suspension = trace.suspension.clone().unwrap();
        assert_eq!(suspension.reason, "possible loop");
        assert_eq!(suspension.kind.subject(), "get_weather");

        // Human lets it continue; the same streak must not trip again.
        trace.take_suspension();
        assert!(!feed(&guard, &mut trace, weather()).await);
        assert!(!feed(&guard, &mut trace, weather()).await);
    }

    #[tokio::test]
    async fn test_differing_arguments_never_trigger() {
        let guard = LoopGuard::new(3, 6);
        let mut trace = Trace::new("a");
        for q in ["solon", "noear", "solon"] {
            assert!(!feed(&guard, &mut trace, call("search", json!({"q": q}))).await);
        }
    }

    #[tokio::test]
    async fn test_text_protocol() {
        let guard = LoopGuard::new(3, 6);
        let mut trace = Trace::new("a");
        let text = || Message::assistant("Thought: check again\nAction: get_weather{\"city\": \"Shanghai\"}");

        assert!(!feed(&guard, &mut trace, text()).await);
        assert!(!feed(&guard, &mut trace, text()).await);
        assert!(feed(&guard, &mut trace, text()).await);

        let mut trace = Trace::new("b");
        for q in ["solon", "noear", "solon"] {
            let msg = Message::assistant(format!("Action: search{{\"q\": \"{}\"}}", q));
            assert!(!feed(&guard, &mut trace, msg).await);
        }
    }

    #[tokio::test]
    async fn test_plain_answers_have_no_fingerprint() {
        let guard = LoopGuard::new(2, 4);
        let mut trace = Trace::new("a");
        for _ in 0..4 {
            assert!(!feed(&guard, &mut trace, Message::assistant("still thinking")).await);
        }
        assert!(trace.extra::<Vec<String>>("loop_guard.history").is_none());
    }

    #[tokio::test]
    async fn test_new_streak_after_different_call() {
        let guard = LoopGuard::new(2, 6);
        let mut trace = Trace::new("a");
        let same = || call("f", json!({}));

        feed(&guard, &mut trace, same()).await;
        assert!(feed(&guard, &mut trace, same()).await);
        trace.take_suspension();

        assert!(!feed(&guard, &mut trace, call("g", json!({}))).await);
        assert!(feed(&guard, &mut trace, same()).await);
    }

    #[tokio::test]
    async fn test_window_slides() {
        let guard = LoopGuard::new(3, 3);
        let mut trace = Trace::new("a");
        let same = || call("f", json!({}));

        feed(&guard, &mut trace, same()).await;
        feed(&guard, &mut trace, same()).await;
        feed(&guard, &mut trace, call("g", json!({}))).await;
        feed(&guard, &mut trace, call("h", json!({}))).await;
        // window now [g, h, f]
        assert!(!feed(&guard, &mut trace, same()).await);
    }
}
