//! Text protocol for models without structured tool calling.
//!
//! A tool request is a line of the form `Action: name{json}` (or
//! `Action: name` followed by an `Action Input: {json}` line). Plans are
//! numbered or bulleted lines.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::types::{ToolCall, ToolDefinition};

static ACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t>*]*Action:[ \t]*`?([A-Za-z0-9_.\-]+)`?").expect("valid action regex")
});

static ACTION_INPUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*Action Input:\s*").expect("valid action input regex"));

static PLAN_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:\d+[.)]|[-*•])\s+(.+?)\s*$").expect("valid plan item regex")
});

/// Tool calls written with the `Action:` text protocol, in order of appearance.
/// Generated ids are unique per parse.
pub fn parse_actions(text: &str) -> Vec<ToolCall> {
    ACTION
        .captures_iter(text)
        .filter_map(|caps| {
            let name = caps.get(1)?;
            let rest = &text[name.end()..];
            let rest = rest.strip_prefix('`').unwrap_or(rest);
            let arguments = leading_json(rest).or_else(|| {
                let after_line = rest.split_once('\n').map(|(_, r)| r)?;
                let input = ACTION_INPUT.find(after_line)?;
                leading_json(&after_line[input.end()..])
            });
            Some(ToolCall::generated(
                name.as_str(),
                arguments.unwrap_or_else(|| Value::Object(Default::default())),
            ))
        })
        .collect()
}

/// First JSON object at the start of `text` (after spaces), possibly multi-line.
fn leading_json(text: &str) -> Option<Value> {
    let trimmed = text.trim_start_matches([' ', '\t', ':']);
    if !trimmed.starts_with('{') {
        return None;
    }
    serde_json::Deserializer::from_str(trimmed)
        .into_iter::<Value>()
        .next()
        .and_then(|r| r.ok())
        .filter(Value::is_object)
}

/// Numbered or bulleted lines of a planning reply.
pub fn parse_plan(text: &str) -> Vec<String> {
    let items: Vec<String> = text
        .lines()
        .filter_map(|line| PLAN_ITEM.captures(line))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect();
    if !items.is_empty() {
        return items;
    }
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// System prompt section describing the text protocol and the available tools.
pub fn instructions(tools: &[ToolDefinition], finish_marker: &str) -> String {
    let mut out = String::from("You solve tasks step by step.\n");
    if !tools.is_empty() {
        out.push_str("Available tools:\n");
        for tool in tools {
            out.push_str(&tool.summary_line());
            out.push('\n');
        }
        out.push_str(
            "To use a tool, write a line `Action: tool_name{\"arg\": \"value\"}` and stop. \
             The tool result will be sent back to you.\n",
        );
    }
    out.push_str(&format!(
        "When you have the final answer, write {} followed by the answer.",
        finish_marker
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_inline_action() {
        let calls = parse_actions(
            "Thought: I need the weather.\nAction: get_weather{\"city\": \"Shanghai\"}",
        );
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "get_weather");
        assert_eq!(calls[0].arguments, json!({"city": "Shanghai"}));
    }

    #[test]
    fn test_parse_multiline_and_input_line() {
        let calls = parse_actions(
            "Action: search {\n  \"q\": \"rust\"\n}\nAction: lookup\nAction Input: {\"id\": 7}",
        );
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].arguments, json!({"q": "rust"}));
        assert_eq!(calls[1].name, "lookup");
        assert_eq!(calls[1].arguments, json!({"id": 7}));
        assert_ne!(calls[0].id, calls[1].id);
    }

    #[test]
    fn test_action_without_arguments() {
        let calls = parse_actions("Action: list_files");
        assert_eq!(calls[0].arguments, json!({}));
    }

    #[test]
    fn test_no_action() {
        assert!(parse_actions("The answer is 42.").is_empty());
        assert!(parse_actions("No Action: here because it is mid-line").is_empty());
    }

    #[test]
    fn test_parse_plan() {
        let plan = parse_plan("Plan:\n1. Search flights\n2) Book hotel\n- Pack");
        assert_eq!(plan, vec!["Search flights", "Book hotel", "Pack"]);

        let plan = parse_plan("check logs\n\nfix bug");
        assert_eq!(plan, vec!["check logs", "fix bug"]);
    }
}
