//! The think/act/observe loop.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use super::builder::ReActAgentBuilder;
use super::events::{AgentEvent, AgentOutcome};
use super::terminal::TerminalCondition;
use super::{Agent, protocol};
use crate::config::LoopConfig;
use crate::hitl::{HitlGate, PendingTaskStore};
use crate::interceptor::compactor::plan_message;
use crate::interceptor::{InterceptorChain, ToolInvocation};
use crate::model::{MessageAccumulator, ModelCaller, ModelRequest};
use crate::session::AgentSession;
use crate::tools::ToolRegistry;
use crate::trace::{Suspension, SuspensionKind, Trace};
use crate::types::{Message, ToolCall, ToolDefinition, unanswered_tool_calls};

const PLANNING_PROMPT: &str =
    "Break the user's task into a short numbered list of steps. Reply with the list only.";

pub struct ReActAgent {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) model: Arc<dyn ModelCaller>,
    pub(crate) tools: ToolRegistry,
    pub(crate) definitions: Vec<ToolDefinition>,
    pub(crate) interceptors: InterceptorChain,
    pub(crate) gate: Option<HitlGate>,
    pub(crate) pending_store: Arc<dyn PendingTaskStore>,
    pub(crate) terminal: Arc<dyn TerminalCondition>,
    pub(crate) config: LoopConfig,
}

/// Event sink of one run. Events are dropped once the receiver is gone.
#[derive(Clone, Default)]
pub(crate) struct Emitter {
    tx: Option<mpsc::Sender<AgentEvent>>,
}

impl Emitter {
    pub(crate) fn new(tx: mpsc::Sender<AgentEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub(crate) fn is_streaming(&self) -> bool {
        self.tx.is_some()
    }

    pub(crate) async fn emit(&self, event: AgentEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event).await;
        }
    }
}

#[derive(Debug, Default)]
struct RunStats {
    tool_calls: usize,
}

impl ReActAgent {
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ReActAgentBuilder {
        ReActAgentBuilder::new(name)
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn interceptors(&self) -> &InterceptorChain {
        &self.interceptors
    }

    pub fn pending_store(&self) -> &Arc<dyn PendingTaskStore> {
        &self.pending_store
    }

    pub(crate) async fn run(
        &self,
        prompt: Option<&str>,
        session: &dyn AgentSession,
        events: &Emitter,
    ) -> crate::Result<AgentOutcome> {
        let session_id = session.session_id().to_string();
        let mut trace = session
            .load_trace(&self.name)
            .await
            .unwrap_or_else(|| Trace::new(self.name.as_str()));

        if prompt.is_none() && trace.is_finished() {
            debug!(agent = %self.name, "Trace already finished, nothing to resume");
            return Ok(self.outcome(&trace, &session_id, &RunStats::default()));
        }

        if let Some(prompt) = prompt {
            self.start_task(&mut trace, &session_id, prompt);
            session
                .add_history_message(&self.name, Message::user(prompt))
                .await;
        }

        info!(
            agent = %self.name,
            session_id = %session_id,
            resumed = prompt.is_none(),
            memory = trace.working_memory.len(),
            "Run started"
        );

        let mut stats = RunStats::default();
        let result = self
            .drive(&mut trace, &session_id, session, events, &mut stats, prompt.is_some())
            .await;
        session.save_trace(&trace).await?;
        result?;

        let outcome = self.outcome(&trace, &session_id, &stats);
        if outcome.is_finished() {
            session
                .add_history_message(&self.name, outcome.message())
                .await;
        }

        info!(
            agent = %self.name,
            status = ?outcome.status,
            iterations = outcome.iterations,
            tool_calls = outcome.tool_calls,
            "Run stopped"
        );
        Ok(outcome)
    }

    async fn drive(
        &self,
        trace: &mut Trace,
        session_id: &str,
        session: &dyn AgentSession,
        events: &Emitter,
        stats: &mut RunStats,
        fresh_task: bool,
    ) -> crate::Result<()> {
        if fresh_task && self.config.planning {
            self.plan(trace).await?;
        }

        loop {
            if trace.is_finished() {
                return Ok(());
            }

            if trace.is_pending() {
                if !self.resume(trace, session_id, events, stats).await {
                    return Ok(());
                }
                session.save_trace(trace).await?;
            }

            let calls = unanswered_tool_calls(&trace.working_memory);
            if !calls.is_empty() {
                if !self
                    .act(trace, session_id, session, events, stats, calls)
                    .await?
                {
                    return Ok(());
                }
                self.interceptors.on_observation(trace).await;
                session.save_trace(trace).await?;
                continue;
            }

            self.think(trace, session_id, events).await?;
            if trace.is_pending() {
                return Ok(());
            }
        }
    }

    /// THINKING: one model call, then finish, nudge, or hand tool calls to ACTING.
    async fn think(
        &self,
        trace: &mut Trace,
        session_id: &str,
        events: &Emitter,
    ) -> crate::Result<()> {
        trace.iteration_count += 1;
        if trace.iteration_count > self.config.max_iterations {
            self.stop_at_budget(trace);
            return Ok(());
        }

        let tools: &[ToolDefinition] = if self.config.tool_calling {
            &self.definitions
        } else {
            &[]
        };
        let request = ModelRequest::new(&trace.working_memory, tools);
        let mut reply = if events.is_streaming() {
            self.stream_reply(request, events).await?
        } else {
            self.model.call(request).await?
        };

        debug!(
            agent = %self.name,
            iteration = trace.iteration_count,
            tool_calls = reply.tool_calls.len(),
            "Model replied"
        );
        events.emit(AgentEvent::Reasoning(reply.clone())).await;

        if self.terminal.is_terminal(&reply, &self.config) {
            let answer = self.terminal.final_answer(&reply, &self.config);
            trace.push(reply);
            trace.finish(answer);
            return Ok(());
        }

        if !self.config.tool_calling && !reply.has_tool_calls() {
            reply.tool_calls = protocol::parse_actions(&reply.content);
        }
        trace.push(reply.clone());
        self.interceptors.on_reason(trace, &reply).await;

        if trace.is_pending() {
            if let Some(task) = trace.pending_task(session_id) {
                self.pending_store.put(task.clone());
                events.emit(AgentEvent::Suspended(task)).await;
            }
            return Ok(());
        }

        if !reply.has_tool_calls() {
            trace.push(Message::user(format!(
                "Continue. Call a tool if you need more information, or write {} followed by your final answer.",
                self.config.finish_marker
            )));
        }
        Ok(())
    }

    /// One model reply over [`ModelCaller::stream`], emitting each chunk as it arrives.
    async fn stream_reply(
        &self,
        request: ModelRequest<'_>,
        events: &Emitter,
    ) -> crate::Result<Message> {
        let mut chunks = self.model.stream(request).await?;
        let mut reply = MessageAccumulator::default();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            reply.push(&chunk);
            events.emit(AgentEvent::Delta(chunk)).await;
        }
        Ok(reply.finish())
    }

    /// ACTING + OBSERVING for `calls`. Returns false when the gate suspended the run.
    async fn act(
        &self,
        trace: &mut Trace,
        session_id: &str,
        session: &dyn AgentSession,
        events: &Emitter,
        stats: &mut RunStats,
        calls: Vec<ToolCall>,
    ) -> crate::Result<bool> {
        for call in calls {
            if let Some(gate) = &self.gate
                && let Some(task) = gate.check(session_id, &call)
            {
                let reason = task.reason.clone();
                trace.suspend(Suspension::new(SuspensionKind::ToolApproval { call }, reason));
                events.emit(AgentEvent::Suspended(task)).await;
                return Ok(false);
            }

            events.emit(AgentEvent::ToolCall(call.clone())).await;
            let content = self.execute(session_id, &call).await;
            self.observe(trace, &call, content, events).await;
            stats.tool_calls += 1;
            session.save_trace(trace).await?;
        }
        Ok(true)
    }

    /// Apply a recorded decision. Returns false when the trace is still waiting.
    async fn resume(
        &self,
        trace: &mut Trace,
        session_id: &str,
        events: &Emitter,
        stats: &mut RunStats,
    ) -> bool {
        let decision = match &trace.suspension {
            Some(suspension) => match &suspension.decision {
                Some(decision) => decision.clone(),
                None => return false,
            },
            None => {
                warn!(agent = %self.name, "Pending trace without suspension, continuing");
                trace.take_suspension();
                return true;
            }
        };
        let Some(suspension) = trace.take_suspension() else {
            return true;
        };

        info!(
            agent = %self.name,
            subject = %suspension.kind.subject(),
            approved = decision.is_approved(),
            "Resuming with decision"
        );

        match suspension.kind {
            SuspensionKind::ToolApproval { mut call } => {
                if decision.is_approved() {
                    if let Some(arguments) = decision.modified_arguments {
                        call.arguments = arguments;
                    }
                    events.emit(AgentEvent::ToolCall(call.clone())).await;
                    let content = self.execute(session_id, &call).await;
                    self.observe(trace, &call, content, events).await;
                    stats.tool_calls += 1;
                } else {
                    let note = decision.rejection_note(&call.name);
                    self.observe(trace, &call, note, events).await;
                }
            }
            SuspensionKind::LoopDetected { .. } => {
                if !decision.is_approved() {
                    for call in unanswered_tool_calls(&trace.working_memory) {
                        let note = decision.rejection_note(&call.name);
                        self.observe(trace, &call, note, events).await;
                    }
                }
            }
            SuspensionKind::Member { .. } | SuspensionKind::Flow { .. } => {}
        }
        true
    }

    /// Run one call through the interceptor chain. Residual failures become text.
    async fn execute(&self, session_id: &str, call: &ToolCall) -> String {
        let invocation = ToolInvocation::new(session_id, self.name.as_str(), call.clone());
        match self.interceptors.invoke_tool(&invocation, &self.tools).await {
            Ok(output) => output.as_text(),
            Err(e) => {
                warn!(agent = %self.name, tool = %call.name, error = %e, "Tool failed");
                format!("Tool [{}] failed: {}", call.name, e)
            }
        }
    }

    async fn observe(&self, trace: &mut Trace, call: &ToolCall, content: String, events: &Emitter) {
        events
            .emit(AgentEvent::Observation {
                call_id: call.id.clone(),
                tool_name: call.name.clone(),
                content: content.clone(),
            })
            .await;
        trace.push(Message::tool(call.id.as_str(), call.name.as_str(), content));
    }

    fn stop_at_budget(&self, trace: &mut Trace) {
        warn!(
            agent = %self.name,
            max_iterations = self.config.max_iterations,
            "Iteration budget exhausted"
        );
        let note = format!(
            "Stopped after reaching the limit of {} reasoning steps without a final answer.",
            self.config.max_iterations
        );
        trace.push(Message::system(note.as_str()));
        let answer = trace
            .last_assistant()
            .map(|m| m.content.trim())
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .unwrap_or(note);
        trace.finish(answer);
    }

    async fn plan(&self, trace: &mut Trace) -> crate::Result<()> {
        let task = trace.current_task().unwrap_or_default().to_string();
        let messages = [Message::system(PLANNING_PROMPT), Message::user(task)];
        let reply = self
            .model
            .call(ModelRequest::without_tools(&messages))
            .await?;

        let plans = protocol::parse_plan(&reply.content);
        if !plans.is_empty() {
            debug!(agent = %self.name, steps = plans.len(), "Plan created");
            trace.push(plan_message(&plans));
            trace.set_plans(plans);
        }
        Ok(())
    }

    fn start_task(&self, trace: &mut Trace, session_id: &str, prompt: &str) {
        if let Some(suspension) = trace.take_suspension() {
            debug!(agent = %self.name, "New task abandons outstanding suspension");
            self.pending_store
                .remove(session_id, suspension.kind.subject());
        }
        for call in unanswered_tool_calls(&trace.working_memory) {
            let note = format!(
                "The call to [{}] was cancelled because a new task started.",
                call.name
            );
            trace.push(Message::tool(call.id.as_str(), call.name.as_str(), note));
        }

        let system_prompt = self.system_prompt();
        if !system_prompt.is_empty() && !trace.working_memory.first().is_some_and(Message::is_system)
        {
            trace.working_memory.insert(0, Message::system(system_prompt));
        }
        trace.plans.clear();
        trace.begin_task(prompt);
    }

    fn system_prompt(&self) -> String {
        let mut parts = Vec::new();
        if let Some(prompt) = &self.config.system_prompt {
            parts.push(prompt.clone());
        }
        if !self.config.tool_calling {
            parts.push(protocol::instructions(
                &self.definitions,
                &self.config.finish_marker,
            ));
        }
        parts.join("\n\n")
    }

    fn outcome(&self, trace: &Trace, session_id: &str, stats: &RunStats) -> AgentOutcome {
        AgentOutcome {
            agent_name: self.name.clone(),
            status: trace.status,
            answer: trace.final_answer.clone(),
            iterations: trace.iteration_count,
            tool_calls: stats.tool_calls,
            pending: trace.pending_task(session_id),
        }
    }
}

#[async_trait]
impl Agent for ReActAgent {
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
        self.run(prompt, session, &Emitter::default()).await
    }
}

impl std::fmt::Debug for ReActAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReActAgent")
            .field("name", &self.name)
            .field("tools", &self.tools)
            .field("interceptors", &self.interceptors)
            .field("gate", &self.gate)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
