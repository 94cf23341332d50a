//! Supervisor/worker orchestration.
//!
//! A [`Team`] alternates between a supervisor decision and one member run
//! until the supervisor finishes or `max_total_iterations` decisions are spent.
//! Members are any [`Agent`], including other teams. Every trace in the tree
//! lives in the same session snapshot under its own name, so a restored parent
//! finds finished children and resumes suspended ones instead of re-running
//! them.

mod builder;
mod supervisor;

pub use builder::TeamBuilder;
pub use supervisor::{SupervisorDecision, parse_decision};

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::agent::{Agent, AgentOutcome};
use crate::config::TeamConfig;
use crate::hitl::{FlowInterceptor, PendingTask, PendingTaskStore};
use crate::model::{ModelCaller, ModelRequest};
use crate::session::{AgentSession, Checkpoint};
use crate::trace::{FlowPhase, Suspension, SuspensionKind, TeamRecord, Trace};
use crate::types::Message;

/// Records index where the current task starts.
const TASK_START_KEY: &str = "team.task_start";
/// Task waiting to be handed to the routed member.
const DISPATCH_KEY: &str = "team.dispatch";

pub struct Team {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) supervisor: Arc<dyn ModelCaller>,
    pub(crate) members: Vec<Arc<dyn Agent>>,
    pub(crate) flows: Vec<Arc<dyn FlowInterceptor>>,
    pub(crate) store: Arc<dyn PendingTaskStore>,
    pub(crate) config: TeamConfig,
}

#[derive(Debug, Default)]
struct RunState {
    tool_calls: usize,
    /// Pending task reported by a suspended member.
    pending: Option<PendingTask>,
}

impl Team {
    #[must_use]
    pub fn builder(name: impl Into<String>) -> TeamBuilder {
        TeamBuilder::new(name)
    }

    pub fn config(&self) -> &TeamConfig {
        &self.config
    }

    pub fn members(&self) -> &[Arc<dyn Agent>] {
        &self.members
    }

    pub fn member(&self, name: &str) -> Option<&Arc<dyn Agent>> {
        self.members.iter().find(|m| m.name() == name)
    }

    pub fn pending_store(&self) -> &Arc<dyn PendingTaskStore> {
        &self.store
    }

    /// Every record of this team in `session`, one `[source] content` line each.
    pub async fn transcript(&self, session: &dyn AgentSession) -> String {
        session
            .load_trace(&self.name)
            .await
            .map(|t| t.transcript())
            .unwrap_or_default()
    }

    /// The supervisor's explicit answer, else the last member output of the
    /// current task.
    pub async fn final_answer(&self, session: &dyn AgentSession) -> Option<String> {
        let trace = session.load_trace(&self.name).await?;
        trace
            .final_answer
            .clone()
            .filter(|a| !a.is_empty())
            .or_else(|| last_output(&trace))
    }

    async fn run(
        &self,
        prompt: Option<&str>,
        session: &dyn AgentSession,
    ) -> crate::Result<AgentOutcome> {
        let session_id = session.session_id().to_string();
        let mut trace = session
            .load_trace(&self.name)
            .await
            .unwrap_or_else(|| Trace::new(self.name.as_str()));

        if prompt.is_none() && trace.is_finished() {
            debug!(team = %self.name, "Team trace already finished, nothing to resume");
            return Ok(self.outcome(&trace, &session_id, &RunState::default()));
        }

        if let Some(prompt) = prompt {
            if let Some(Suspension {
                kind: SuspensionKind::Member { name },
                ..
            }) = &trace.suspension
            {
                self.abandon_member(session, &session_id, name).await?;
            }
            self.start_task(&mut trace, &session_id, prompt);
            session
                .add_history_message(&self.name, Message::user(prompt))
                .await;
            self.save(session, &trace).await?;
        }

        info!(
            team = %self.name,
            session_id = %session_id,
            resumed = prompt.is_none(),
            route = ?trace.route,
            "Team run started"
        );

        let mut state = RunState::default();
        let result = self.drive(&mut trace, session, &mut state).await;
        self.save(session, &trace).await?;
        result?;

        let outcome = self.outcome(&trace, &session_id, &state);
        if outcome.is_finished() {
            session
                .add_history_message(&self.name, outcome.message())
                .await;
        }

        info!(
            team = %self.name,
            status = ?outcome.status,
            decisions = outcome.iterations,
            records = trace.records.len(),
            "Team run stopped"
        );
        Ok(outcome)
    }

    async fn drive(
        &self,
        trace: &mut Trace,
        session: &dyn AgentSession,
        state: &mut RunState,
    ) -> crate::Result<()> {
        loop {
            if trace.is_finished() {
                return Ok(());
            }

            if trace.is_pending() {
                if !self.resume(trace) {
                    return Ok(());
                }
                self.save(session, trace).await?;
                continue;
            }

            if let Some(node) = trace.route.clone() {
                if !self.execute(trace, &node, session, state).await? {
                    return Ok(());
                }
            } else {
                self.decide(trace, session.session_id()).await?;
            }
            self.save(session, trace).await?;
        }
    }

    /// SUPERVISOR_DECIDING: pick the next member or finish.
    async fn decide(&self, trace: &mut Trace, session_id: &str) -> crate::Result<()> {
        trace.iteration_count += 1;
        if trace.iteration_count > self.config.max_total_iterations {
            self.stop_at_budget(trace);
            return Ok(());
        }

        let names: Vec<&str> = self.members.iter().map(|m| m.name()).collect();
        let messages = {
            let roster: Vec<(&str, &str)> = self
                .members
                .iter()
                .map(|m| (m.name(), m.description()))
                .collect();
            supervisor::prompt(
                &self.description,
                &roster,
                trace.current_task().unwrap_or_default(),
                task_records(trace),
                &self.config.finish_marker,
            )
        };
        let reply = self
            .supervisor
            .call(ModelRequest::without_tools(&messages))
            .await?;

        let decision = parse_decision(&reply.content, &names, &self.config.finish_marker);
        debug!(team = %self.name, decision = ?decision, iteration = trace.iteration_count, "Supervisor decided");

        match decision {
            SupervisorDecision::Finish(answer) => {
                let answer = answer
                    .or_else(|| last_output(trace))
                    .unwrap_or_default();
                trace.record(TeamRecord::supervisor(format!("Finished: {}", answer)));
                trace.finish(answer);
            }
            SupervisorDecision::Route(node) => {
                trace.record(TeamRecord::supervisor(format!("Route to {}", node)));
                trace.route = Some(node.clone());
                let hold = self
                    .flows
                    .iter()
                    .find_map(|f| f.on_node_start(trace, &node));
                match hold {
                    Some(reason) => {
                        self.suspend_flow(trace, session_id, node, FlowPhase::Start, reason)
                    }
                    None => self.dispatch(trace),
                }
            }
            SupervisorDecision::Unknown(text) => {
                warn!(team = %self.name, reply = %text, "Supervisor named no member");
                trace.record(TeamRecord::supervisor(format!(
                    "No member matches \"{}\". Choose one of: {}",
                    text,
                    names.join(", ")
                )));
            }
        }
        Ok(())
    }

    /// Queue the team task for the routed member.
    fn dispatch(&self, trace: &mut Trace) {
        let task = supervisor::member_task(
            trace.current_task().unwrap_or_default(),
            task_records(trace),
        );
        trace.set_extra(DISPATCH_KEY, task);
    }

    /// AGENT_EXECUTING: run (or resume) `node`. Returns false when the run stops.
    async fn execute(
        &self,
        trace: &mut Trace,
        node: &str,
        session: &dyn AgentSession,
        state: &mut RunState,
    ) -> crate::Result<bool> {
        let Some(member) = self.member(node).cloned() else {
            warn!(team = %self.name, node, "Route points to an unknown member");
            trace.record(TeamRecord::supervisor(format!("Unknown member [{}] skipped", node)));
            trace.route = None;
            return Ok(true);
        };

        let task: Option<String> = trace.extra(DISPATCH_KEY);
        trace.remove_extra(DISPATCH_KEY);
        self.save(session, trace).await?;

        debug!(team = %self.name, member = node, fresh = task.is_some(), "Running member");
        let outcome = member.call(task.as_deref(), session).await?;
        state.tool_calls += outcome.tool_calls;

        if outcome.is_pending() {
            let reason = outcome
                .pending
                .as_ref()
                .map(|p| p.reason.clone())
                .unwrap_or_else(|| format!("member [{}] is waiting", node));
            trace.suspend(Suspension::new(
                SuspensionKind::Member {
                    name: node.to_string(),
                },
                reason,
            ));
            state.pending = outcome.pending;
            return Ok(false);
        }

        let output = outcome.text().to_string();
        trace.record(TeamRecord::new(node, output.as_str()));

        let hold = self
            .flows
            .iter()
            .find_map(|f| f.on_node_end(trace, node, &output));
        if let Some(reason) = hold {
            self.suspend_flow(trace, session.session_id(), node.to_string(), FlowPhase::End, reason);
            return Ok(false);
        }
        trace.route = None;
        Ok(true)
    }

    /// Apply what unblocks the team. Returns false while still waiting.
    fn resume(&self, trace: &mut Trace) -> bool {
        let Some(suspension) = trace.suspension.clone() else {
            trace.take_suspension();
            return true;
        };

        match suspension.kind {
            // The member holds the decision; running it again resumes it.
            SuspensionKind::Member { .. } => {
                trace.take_suspension();
            }
            SuspensionKind::Flow { node, phase } => {
                let Some(decision) = suspension.decision else {
                    return false;
                };
                trace.take_suspension();
                info!(
                    team = %self.name,
                    node = %node,
                    phase = ?phase,
                    approved = decision.is_approved(),
                    "Resuming flow suspension"
                );
                match (phase, decision.is_approved()) {
                    (FlowPhase::Start, true) => self.dispatch(trace),
                    (FlowPhase::End, true) => trace.route = None,
                    (_, false) => {
                        trace.record(TeamRecord::supervisor(decision.rejection_note(&node)));
                        trace.route = None;
                    }
                }
            }
            kind => {
                warn!(team = %self.name, subject = %kind.subject(), "Unexpected suspension on team trace");
                trace.take_suspension();
            }
        }
        true
    }

    fn suspend_flow(
        &self,
        trace: &mut Trace,
        session_id: &str,
        node: String,
        phase: FlowPhase,
        reason: String,
    ) {
        info!(team = %self.name, node = %node, phase = ?phase, reason = %reason, "Flow suspended");
        self.store.put(PendingTask::new(
            session_id,
            node.as_str(),
            serde_json::Value::Null,
            reason.as_str(),
        ));
        trace.suspend(Suspension::new(SuspensionKind::Flow { node, phase }, reason));
    }

    fn stop_at_budget(&self, trace: &mut Trace) {
        warn!(
            team = %self.name,
            max_total_iterations = self.config.max_total_iterations,
            "Supervisor budget exhausted"
        );
        let note = format!(
            "Stopped after {} supervisor decisions without finishing.",
            self.config.max_total_iterations
        );
        trace.record(TeamRecord::supervisor(note.as_str()));
        let answer = last_output(trace).unwrap_or(note);
        trace.finish(answer);
    }

    fn start_task(&self, trace: &mut Trace, session_id: &str, prompt: &str) {
        if let Some(suspension) = trace.take_suspension()
            && let SuspensionKind::Flow { node, .. } = &suspension.kind
        {
            self.store.remove(session_id, node);
        }
        trace.remove_extra(DISPATCH_KEY);
        trace.begin_task(prompt);
        let start = trace.records.len();
        trace.set_extra(TASK_START_KEY, start);
    }

    /// Clear the suspension chain below a member the new task will not resume,
    /// down to the trace that owns the pending task.
    async fn abandon_member(
        &self,
        session: &dyn AgentSession,
        session_id: &str,
        member: &str,
    ) -> crate::Result<()> {
        let mut snapshot = session.snapshot().await;
        let mut next = Some(member.to_string());
        while let Some(name) = next.take() {
            let Some(suspension) = snapshot
                .trace_mut(&name)
                .and_then(Trace::take_suspension)
            else {
                break;
            };
            match suspension.kind {
                SuspensionKind::Member { name: child } => next = Some(child),
                kind => {
                    self.store.remove(session_id, kind.subject());
                }
            }
            debug!(team = %self.name, member = %name, "Suspended member abandoned");
        }
        session.update_snapshot(snapshot).await?;
        Ok(())
    }

    /// Write the team trace and routing position into the session snapshot,
    /// keeping whatever members wrote meanwhile.
    async fn save(&self, session: &dyn AgentSession, trace: &Trace) -> crate::Result<()> {
        let mut snapshot = session.snapshot().await;
        snapshot.put_trace(trace.clone());
        snapshot.checkpoint = Some(Checkpoint {
            agent: self.name.clone(),
            node: trace.route.clone(),
        });
        session.update_snapshot(snapshot).await?;
        Ok(())
    }

    fn outcome(&self, trace: &Trace, session_id: &str, state: &RunState) -> AgentOutcome {
        let pending = trace
            .suspension
            .as_ref()
            .filter(|_| trace.is_pending())
            .and_then(|s| match &s.kind {
                SuspensionKind::Member { .. } => state.pending.clone(),
                kind => Some(PendingTask::new(
                    session_id,
                    kind.subject(),
                    kind.arguments(),
                    s.reason.as_str(),
                )),
            });
        AgentOutcome {
            agent_name: self.name.clone(),
            status: trace.status,
            answer: trace.final_answer.clone(),
            iterations: trace.iteration_count,
            tool_calls: state.tool_calls,
            pending,
        }
    }
}

fn task_records(trace: &Trace) -> &[TeamRecord] {
    let start = trace
        .extra::<usize>(TASK_START_KEY)
        .unwrap_or(0)
        .min(trace.records.len());
    &trace.records[start..]
}

fn last_output(trace: &Trace) -> Option<String> {
    task_records(trace)
        .iter()
        .rev()
        .find(|r| !r.is_supervisor())
        .map(|r| r.content.clone())
}

#[async_trait]
impl Agent for Team {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    #[instrument(skip(self, prompt, session), fields(agent = %self.name, session_id = %session.session_id()))]
    async fn call(
        &self,
        prompt: Option<&str>,
        session: &dyn AgentSession,
    ) -> crate::Result<AgentOutcome> {
        self.run(prompt, session).await
    }

    fn member_names(&self) -> Vec<String> {
        self.members
            .iter()
            .flat_map(|m| std::iter::once(m.name().to_string()).chain(m.member_names()))
            .collect()
    }
}

impl std::fmt::Debug for Team {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Team")
            .field("name", &self.name)
            .field("members", &self.members.iter().map(|m| m.name()).collect::<Vec<_>>())
            .field("flows", &self.flows.iter().map(|f| f.name()).collect::<Vec<_>>())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
