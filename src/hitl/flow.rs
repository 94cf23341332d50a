//! Flow-level interceptors run at team member boundaries.

use std::collections::HashSet;

use crate::trace::Trace;

/// Forces a team to suspend at a member boundary independent of any model decision.
pub trait FlowInterceptor: Send + Sync {
    fn name(&self) -> &str;

    /// Called before `node` runs; a returned reason suspends the team.
    fn on_node_start(&self, _team: &Trace, _node: &str) -> Option<String> {
        None
    }

    /// Called after `node` produced `output`; a returned reason suspends the team.
    fn on_node_end(&self, _team: &Trace, _node: &str, _output: &str) -> Option<String> {
        None
    }
}

/// Always pause after the named members finish.
#[derive(Debug, Clone, Default)]
pub struct PauseAfter {
    members: HashSet<String>,
}

impl PauseAfter {
    pub fn new<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            members: members.into_iter().map(Into::into).collect(),
        }
    }
}

impl FlowInterceptor for PauseAfter {
    fn name(&self) -> &str {
        "pause-after"
    }

    fn on_node_end(&self, _team: &Trace, node: &str, _output: &str) -> Option<String> {
        self.members
            .contains(node)
            .then(|| format!("Review the output of [{}] before the team continues", node))
    }
}

/// Always pause before the named members start.
#[derive(Debug, Clone, Default)]
pub struct PauseBefore {
    members: HashSet<String>,
}

impl PauseBefore {
    pub fn new<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            members: members.into_iter().map(Into::into).collect(),
        }
    }
}

impl FlowInterceptor for PauseBefore {
    fn name(&self) -> &str {
        "pause-before"
    }

    fn on_node_start(&self, _team: &Trace, node: &str) -> Option<String> {
        self.members
            .contains(node)
            .then(|| format!("Approve running [{}]", node))
    }
}
