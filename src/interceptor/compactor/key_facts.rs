//! Model-free summary that keeps only parameters, results and failures.

use async_trait::async_trait;

use super::SummarizationStrategy;
use crate::trace::Trace;
use crate::types::{Message, Role};

const HEADER: &str = "Key facts from earlier steps:";

/// Extracts tool parameters, results and failed attempts from dropped
/// messages. Facts carried by an earlier key-fact summary are kept, newest
/// `max_facts` win.
#[derive(Debug, Clone)]
pub struct KeyFactExtraction {
    max_facts: usize,
    max_fact_chars: usize,
}

impl Default for KeyFactExtraction {
    fn default() -> Self {
        Self {
            max_facts: 50,
            max_fact_chars: 200,
        }
    }
}

impl KeyFactExtraction {
    pub fn new(max_facts: usize, max_fact_chars: usize) -> Self {
        Self {
            max_facts: max_facts.max(1),
            max_fact_chars: max_fact_chars.max(16),
        }
    }

    fn clip(&self, text: &str) -> String {
        let text = text.replace('\n', " ");
        match text.char_indices().nth(self.max_fact_chars) {
            Some((cut, _)) => format!("{}...", &text[..cut]),
            None => text,
        }
    }

    fn is_failure(content: &str) -> bool {
        let lower = content.to_lowercase();
        lower.contains("error") || lower.contains("invalid arguments") || lower.contains("rejected")
    }

    pub fn extract(&self, dropped: &[Message]) -> Vec<String> {
        let mut facts = Vec::new();
        for message in dropped {
            match message.role {
                Role::System if message.content.starts_with(HEADER) => {
                    facts.extend(
                        message
                            .content
                            .lines()
                            .skip(1)
                            .filter_map(|l| l.strip_prefix("- "))
                            .map(str::to_string),
                    );
                }
                Role::Assistant => {
                    for call in &message.tool_calls {
                        facts.push(format!(
                            "called {} with {}",
                            call.name,
                            self.clip(&call.arguments.to_string())
                        ));
                    }
                }
                Role::Tool => {
                    let tool = message.tool_name.as_deref().unwrap_or("tool");
                    if Self::is_failure(&message.content) {
                        facts.push(format!("failed {}: {}", tool, self.clip(&message.content)));
                    } else {
                        facts.push(format!("{} returned {}", tool, self.clip(&message.content)));
                    }
                }
                _ => {}
            }
        }

        if facts.len() > self.max_facts {
            facts.drain(..facts.len() - self.max_facts);
        }
        facts
    }
}

#[async_trait]
impl SummarizationStrategy for KeyFactExtraction {
    fn name(&self) -> &str {
        "key-facts"
    }

    async fn summarize(
        &self,
        _trace: &mut Trace,
        dropped: &[Message],
    ) -> crate::Result<Option<Message>> {
        let facts = self.extract(dropped);
        if facts.is_empty() {
            return Ok(None);
        }
        let body: Vec<String> = facts.iter().map(|f| format!("- {}", f)).collect();
        Ok(Some(Message::system(format!("{}\n{}", HEADER, body.join("\n")))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolCall;
    use serde_json::json;

    fn dropped() -> Vec<Message> {
        vec![
            Message::assistant("Let me look that up."),
            Message::assistant_with_tools(
                "",
                vec![ToolCall::new("1", "get_weather", json!({"city": "Shanghai"}))],
            ),
            Message::tool("1", "get_weather", "Sunny, 25C"),
            Message::assistant_with_tools(
                "",
                vec![ToolCall::new("2", "book", json!({"date": "tomorrow"}))],
            ),
            Message::tool("2", "book", "Invalid arguments for tool [book]: bad date"),
        ]
    }

    #[test]
    fn test_extracts_only_facts() {
        let facts = KeyFactExtraction::default().extract(&dropped());
        assert_eq!(facts.len(), 4);
        assert!(facts[0].contains("get_weather"));
        assert!(facts[1].contains("Sunny"));
        assert!(facts[3].starts_with("failed book"));
        assert!(!facts.iter().any(|f| f.contains("look that up")));
    }

    #[tokio::test]
    async fn test_carries_previous_summary() {
        let strategy = KeyFactExtraction::new(3, 100);
        let mut trace = Trace::new("a");
        let first = strategy
            .summarize(&mut trace, &dropped())
            .await
            .unwrap()
            .unwrap();
        assert!(first.content.starts_with(HEADER));

        let second = strategy
            .summarize(
                &mut trace,
                &[first, Message::tool("3", "search", "found it")],
            )
            .await
            .unwrap()
            .unwrap();
        let lines: Vec<_> = second.content.lines().skip(1).collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "- search returned found it");
    }

    #[tokio::test]
    async fn test_nothing_to_keep() {
        let strategy = KeyFactExtraction::default();
        let mut trace = Trace::new("a");
        let out = strategy
            .summarize(&mut trace, &[Message::assistant("hmm")])
            .await
            .unwrap();
        assert!(out.is_none());
    }
}
