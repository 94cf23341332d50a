//! When a reply ends the run.

use super::protocol;
use crate::config::LoopConfig;
use crate::types::Message;

/// Decides whether an assistant reply is the final answer.
pub trait TerminalCondition: Send + Sync {
    fn is_terminal(&self, reply: &Message, config: &LoopConfig) -> bool;

    /// The answer to report for a terminal reply.
    fn final_answer(&self, reply: &Message, _config: &LoopConfig) -> String {
        reply.content.trim().to_string()
    }
}

/// Terminal on an explicit finish marker, or, with tool calling disabled, on
/// text that requests no `Action:`. Replies with tool calls never finish.
#[derive(Debug, Clone, Copy, Default)]
pub struct FinishMarker;

impl TerminalCondition for FinishMarker {
    fn is_terminal(&self, reply: &Message, config: &LoopConfig) -> bool {
        if reply.has_tool_calls() {
            return false;
        }
        if reply.content.contains(config.finish_marker.as_str()) {
            return true;
        }
        !config.tool_calling && protocol::parse_actions(&reply.content).is_empty()
    }

    fn final_answer(&self, reply: &Message, config: &LoopConfig) -> String {
        strip_marker(&reply.content, &config.finish_marker)
    }
}

/// Any reply without tool calls is final. Suits providers with native tool
/// calling that never emit a marker.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainReply;

impl TerminalCondition for PlainReply {
    fn is_terminal(&self, reply: &Message, config: &LoopConfig) -> bool {
        !reply.has_tool_calls()
            && (config.tool_calling || protocol::parse_actions(&reply.content).is_empty())
    }

    fn final_answer(&self, reply: &Message, config: &LoopConfig) -> String {
        strip_marker(&reply.content, &config.finish_marker)
    }
}

/// Text after the marker when there is any, else the text before it.
pub fn strip_marker(content: &str, marker: &str) -> String {
    match content.split_once(marker) {
        Some((before, after)) => {
            let after = after.trim();
            if after.is_empty() {
                before.trim().to_string()
            } else {
                after.to_string()
            }
        }
        None => content.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolCall;

    fn config(tool_calling: bool) -> LoopConfig {
        LoopConfig {
            tool_calling,
            ..LoopConfig::default()
        }
    }

    #[test]
    fn test_finish_marker() {
        let cond = FinishMarker;
        let reply = Message::assistant("Thought: done\n[FINISH] It is sunny.");
        assert!(cond.is_terminal(&reply, &config(true)));
        assert_eq!(cond.final_answer(&reply, &config(true)), "It is sunny.");

        assert!(!cond.is_terminal(&Message::assistant("let me think"), &config(true)));
        assert!(cond.is_terminal(&Message::assistant("It is sunny."), &config(false)));
        assert!(!cond.is_terminal(
            &Message::assistant("Action: get_weather{}"),
            &config(false)
        ));
    }

    #[test]
    fn test_tool_calls_never_terminal() {
        let reply = Message::assistant_with_tools(
            "[FINISH]",
            vec![ToolCall::generated("f", serde_json::json!({}))],
        );
        assert!(!FinishMarker.is_terminal(&reply, &config(true)));
        assert!(!PlainReply.is_terminal(&reply, &config(true)));
    }

    #[test]
    fn test_plain_reply() {
        assert!(PlainReply.is_terminal(&Message::assistant("42"), &config(true)));
    }

    #[test]
    fn test_strip_marker() {
        assert_eq!(strip_marker("Answer: 42 [FINISH]", "[FINISH]"), "Answer: 42");
        assert_eq!(strip_marker("no marker ", "[FINISH]"), "no marker");
    }
}
