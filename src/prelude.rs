//! Prelude module for convenient imports.
//!
//! ```rust
//! use agentloop::prelude::*;
//! ```

// Core
pub use crate::Error;
pub use crate::Result;
pub use crate::agent::{Agent, AgentEvent, AgentOutcome, ReActAgent, TerminalCondition};
pub use crate::team::Team;

// Collaborators
pub use crate::model::{ModelCaller, ModelRequest};
pub use crate::tools::{SchemaTool, Tool, ToolRegistry};
pub use crate::types::{Message, Role, ToolCall, ToolError, ToolOutput};

// Interceptors
pub use crate::interceptor::{
    ContextCompactor, Interceptor, LoopGuard, SummarizationStrategy, ToolRetry, ToolSanitizer,
};

// Human in the loop
pub use crate::hitl::{Decision, Hitl, HitlGate, PauseAfter, PauseBefore, PendingTaskStore};

// Session and configuration
pub use crate::config::EngineConfig;
pub use crate::session::{AgentSession, FileSnapshotStore, InMemorySession, Snapshot};
pub use crate::trace::{Trace, TraceStatus};
