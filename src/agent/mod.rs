//! Reasoning loop.
//!
//! A [`ReActAgent`] drives one agent through THINKING, ACTING and OBSERVING
//! until a reply passes its [`TerminalCondition`], a tool call needs approval,
//! the loop guard trips, or the iteration budget runs out. All state lives in
//! the agent's [`Trace`](crate::trace::Trace) inside the session snapshot;
//! the agent itself is stateless and can serve many sessions at once.

mod builder;
mod events;
pub mod protocol;
mod react;
mod streaming;
mod terminal;

pub use builder::ReActAgentBuilder;
pub use events::{AgentEvent, AgentOutcome};
pub use react::ReActAgent;
pub use terminal::{FinishMarker, PlainReply, TerminalCondition, strip_marker};

use async_trait::async_trait;

use crate::session::AgentSession;

/// Anything a team can route to: a single agent or another team.
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// `Some(prompt)` starts a new task; `None` resumes the stored trace.
    async fn call(
        &self,
        prompt: Option<&str>,
        session: &dyn AgentSession,
    ) -> crate::Result<AgentOutcome>;

    /// Names of every agent reachable below this one, used to reject cycles.
    fn member_names(&self) -> Vec<String> {
        Vec::new()
    }
}
