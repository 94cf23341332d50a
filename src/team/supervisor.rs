//! Supervisor prompt and decision parsing.

use std::sync::LazyLock;

use regex::Regex;

use crate::agent::strip_marker;
use crate::trace::TeamRecord;
use crate::types::Message;

static ROUTE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*(?:next|route|member|agent|delegate to)\s*[:=]\s*`?([A-Za-z0-9_.\-]+)`?")
        .expect("valid route regex")
});

/// What the supervisor chose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorDecision {
    Route(String),
    /// Finish, with the answer written after the marker when there is one.
    Finish(Option<String>),
    /// The reply named no known member and did not finish.
    Unknown(String),
}

/// Parse a supervisor reply against the member names.
///
/// The finish marker wins. Otherwise an explicit `Next: name` line, a reply
/// that is exactly a member name, or the earliest member named as a whole word.
pub fn parse_decision(reply: &str, members: &[&str], finish_marker: &str) -> SupervisorDecision {
    if reply.contains(finish_marker) {
        let answer = strip_marker(reply, finish_marker);
        let after_marker = reply
            .split_once(finish_marker)
            .is_some_and(|(_, after)| !after.trim().is_empty());
        return SupervisorDecision::Finish(after_marker.then_some(answer));
    }

    let find = |candidate: &str| {
        members
            .iter()
            .find(|m| m.eq_ignore_ascii_case(candidate))
            .map(|m| m.to_string())
    };

    if let Some(caps) = ROUTE_LINE.captures(reply)
        && let Some(name) = caps.get(1).and_then(|m| find(m.as_str()))
    {
        return SupervisorDecision::Route(name);
    }

    let trimmed = reply.trim().trim_matches(|c: char| c == '`' || c == '"' || c == '.');
    if let Some(name) = find(trimmed) {
        return SupervisorDecision::Route(name);
    }

    members
        .iter()
        .filter_map(|m| word_position(reply, m).map(|pos| (pos, *m)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, m)| SupervisorDecision::Route(m.to_string()))
        .unwrap_or_else(|| SupervisorDecision::Unknown(reply.trim().to_string()))
}

fn word_position(text: &str, word: &str) -> Option<usize> {
    let is_word = |c: char| c.is_alphanumeric() || c == '_' || c == '-';
    text.match_indices(word).map(|(i, _)| i).find(|&i| {
        let before = text[..i].chars().next_back();
        let after = text[i + word.len()..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}

/// Messages for one supervisor decision.
pub(crate) fn prompt(
    team_description: &str,
    members: &[(&str, &str)],
    task: &str,
    records: &[TeamRecord],
    finish_marker: &str,
) -> Vec<Message> {
    let roster = members
        .iter()
        .map(|(name, description)| {
            if description.is_empty() {
                format!("- {}", name)
            } else {
                format!("- {}: {}", name, description)
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    let mut system = String::from("You coordinate a team of agents.");
    if !team_description.is_empty() {
        system.push(' ');
        system.push_str(team_description);
    }
    system.push_str(&format!(
        "\n\nMembers:\n{}\n\nReply with the name of the member that should act next. \
         When the task is complete, reply with {} followed by the final answer.",
        roster, finish_marker
    ));

    let mut user = format!("Task: {}", task);
    if records.is_empty() {
        user.push_str("\n\nNo member has acted yet.");
    } else {
        user.push_str("\n\nTranscript:\n");
        user.push_str(&render(records));
    }

    vec![Message::system(system), Message::user(user)]
}

/// The task handed to a member: the team task plus what happened so far.
pub(crate) fn member_task(task: &str, records: &[TeamRecord]) -> String {
    let progress: Vec<&TeamRecord> = records.iter().filter(|r| !r.is_supervisor()).collect();
    if progress.is_empty() {
        return task.to_string();
    }
    let lines = progress
        .iter()
        .map(|r| format!("[{}] {}", r.source, r.content))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{}\n\nProgress so far:\n{}", task, lines)
}

fn render(records: &[TeamRecord]) -> String {
    records
        .iter()
        .map(|r| format!("[{}] {}", r.source, r.content))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMBERS: &[&str] = &["researcher", "writer", "code-reviewer"];

    #[test]
    fn test_finish_with_answer() {
        assert_eq!(
            parse_decision("[FINISH] Shanghai is sunny.", MEMBERS, "[FINISH]"),
            SupervisorDecision::Finish(Some("Shanghai is sunny.".into()))
        );
        assert_eq!(
            parse_decision("All done. [FINISH]", MEMBERS, "[FINISH]"),
            SupervisorDecision::Finish(None)
        );
    }

    #[test]
    fn test_route_variants() {
        assert_eq!(
            parse_decision("writer", MEMBERS, "[FINISH]"),
            SupervisorDecision::Route("writer".into())
        );
        assert_eq!(
            parse_decision("Next: Researcher", MEMBERS, "[FINISH]"),
            SupervisorDecision::Route("researcher".into())
        );
        assert_eq!(
            parse_decision(
                "The draft exists, so the code-reviewer should check it before the writer polishes.",
                MEMBERS,
                "[FINISH]"
            ),
            SupervisorDecision::Route("code-reviewer".into())
        );
    }

    #[test]
    fn test_partial_word_is_not_a_member() {
        assert!(matches!(
            parse_decision("ask the copywriters", MEMBERS, "[FINISH]"),
            SupervisorDecision::Unknown(_)
        ));
    }

    #[test]
    fn test_member_task_includes_progress() {
        let records = vec![
            TeamRecord::supervisor("Route to researcher"),
            TeamRecord::new("researcher", "found 3 sources"),
        ];
        let task = member_task("Write a report", &records);
        assert!(task.starts_with("Write a report"));
        assert!(task.contains("[researcher] found 3 sources"));
        assert!(!task.contains("Route to"));
        assert_eq!(member_task("Write a report", &[]), "Write a report");
    }

    #[test]
    fn test_prompt_lists_members() {
        let messages = prompt(
            "",
            &[("researcher", "finds facts"), ("writer", "")],
            "Write a report",
            &[],
            "[FINISH]",
        );
        assert!(messages[0].content.contains("- researcher: finds facts"));
        assert!(messages[0].content.contains("- writer"));
        assert!(messages[1].content.contains("No member has acted yet"));
    }
}
