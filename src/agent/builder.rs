//! ReActAgentBuilder.

use std::sync::Arc;

use super::react::ReActAgent;
use super::terminal::{FinishMarker, TerminalCondition};
use crate::config::{ConfigError, EngineConfig, LoopConfig};
use crate::hitl::{HitlGate, MemoryPendingTaskStore, PendingTaskStore};
use crate::interceptor::{
    ContextCompactor, Interceptor, InterceptorChain, LoopGuard, ToolRetry, ToolSanitizer,
};
use crate::model::ModelCaller;
use crate::tools::{Tool, ToolRegistry};

pub struct ReActAgentBuilder {
    name: String,
    description: String,
    model: Option<Arc<dyn ModelCaller>>,
    tools: ToolRegistry,
    interceptors: InterceptorChain,
    gate: Option<HitlGate>,
    pending_store: Option<Arc<dyn PendingTaskStore>>,
    terminal: Arc<dyn TerminalCondition>,
    config: LoopConfig,
}

impl ReActAgentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            model: None,
            tools: ToolRegistry::new(),
            interceptors: InterceptorChain::new(),
            gate: None,
            pending_store: None,
            terminal: Arc::new(FinishMarker),
            config: LoopConfig::default(),
        }
    }

    /// Shown to a team supervisor when it picks the next member.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn model(mut self, model: Arc<dyn ModelCaller>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.register(Arc::new(tool));
        self
    }

    pub fn tool_arc(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// Appends an interceptor. Tool calls pass through interceptors in the
    /// order they were added.
    pub fn interceptor(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn interceptor_arc(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn gate(mut self, gate: HitlGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Store for loop-guard suspensions. Defaults to the gate's store.
    pub fn pending_store(mut self, store: Arc<dyn PendingTaskStore>) -> Self {
        self.pending_store = Some(store);
        self
    }

    pub fn terminal(mut self, terminal: impl TerminalCondition + 'static) -> Self {
        self.terminal = Arc::new(terminal);
        self
    }

    pub fn config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    pub fn tool_calling(mut self, enabled: bool) -> Self {
        self.config.tool_calling = enabled;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn planning(mut self, enabled: bool) -> Self {
        self.config.planning = enabled;
        self
    }

    /// Loop settings plus the standard interceptor stack from `engine`:
    /// loop guard, retry, sanitizer and (when enabled) compaction.
    ///
    /// Retry wraps the sanitizer so its exhaustion notice reaches the model
    /// untruncated.
    pub fn with_engine_defaults(mut self, engine: &EngineConfig) -> Self {
        self.config = engine.agent_loop.clone();
        self.interceptors.push(Arc::new(LoopGuard::from_config(&engine.loop_guard)));
        self.interceptors
            .push(Arc::new(ToolRetry::from_config(&engine.retry)));
        self.interceptors
            .push(Arc::new(ToolSanitizer::from_config(&engine.sanitizer)));
        if engine.compaction.enabled {
            self.interceptors
                .push(Arc::new(ContextCompactor::new(engine.compaction.max_messages)));
        }
        self
    }

    pub fn build(self) -> crate::Result<ReActAgent> {
        let model = self
            .model
            .ok_or_else(|| ConfigError::invalid("model", "an agent needs a model caller"))?;
        if self.name.trim().is_empty() {
            return Err(ConfigError::invalid("name", "agent name must not be empty").into());
        }
        if self.config.max_iterations == 0 {
            return Err(
                ConfigError::invalid("max_iterations", "must be greater than zero").into(),
            );
        }

        let pending_store = self
            .pending_store
            .or_else(|| self.gate.as_ref().map(|g| Arc::clone(g.store())))
            .unwrap_or_else(|| Arc::new(MemoryPendingTaskStore::new()));

        tracing::debug!(
            agent = %self.name,
            tools = self.tools.len(),
            interceptors = ?self.interceptors.names(),
            gated = self.gate.is_some(),
            "Agent built"
        );

        Ok(ReActAgent {
            definitions: self.tools.definitions(),
            name: self.name,
            description: self.description,
            model,
            tools: self.tools,
            interceptors: self.interceptors,
            gate: self.gate,
            pending_store,
            terminal: self.terminal,
            config: self.config,
        })
    }
}
