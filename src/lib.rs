//! # agentloop
//!
//! Agent execution engine: a think/act/observe reasoning loop, an interceptor
//! pipeline around it (loop detection, context compaction, tool retry, output
//! sanitization, human approval), a supervisor/worker team orchestrator, and
//! checkpoint/resume of all of it through a serializable session snapshot.
//!
//! The engine is provider-agnostic: plug in a [`ModelCaller`] and any number
//! of [`Tool`]s.
//!
//! ## Single agent
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use agentloop::prelude::*;
//!
//! # async fn example(model: Arc<dyn ModelCaller>, search: impl Tool + 'static) -> agentloop::Result<()> {
//! let agent = ReActAgent::builder("researcher")
//!     .model(model)
//!     .tool(search)
//!     .with_engine_defaults(&EngineConfig::default())
//!     .build()?;
//!
//! let session = InMemorySession::new("session-1");
//! let outcome = agent.call(Some("Plan a trip to Shanghai"), &session).await?;
//! println!("{}", outcome.text());
//! # Ok(())
//! # }
//! ```
//!
//! ## Approval and resume
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use agentloop::prelude::*;
//!
//! # async fn example(agent: ReActAgent, store: Arc<dyn PendingTaskStore>) -> agentloop::Result<()> {
//! let session = InMemorySession::new("session-1");
//! let outcome = agent.call(Some("Delete the temp files"), &session).await?;
//!
//! if outcome.is_pending() {
//!     // Persist, hand off to a reviewer, restore later...
//!     let saved = session.snapshot().await.to_opaque()?;
//!     let restored = InMemorySession::from_snapshot("session-1", Snapshot::from_opaque(&saved)?);
//!
//!     Hitl::new(store).submit(&restored, "shell", Decision::approve()).await?;
//!     let outcome = agent.call(None, &restored).await?;
//!     println!("{}", outcome.text());
//! }
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod agent;
pub mod config;
pub mod hitl;
pub mod interceptor;
pub mod model;
pub mod prelude;
pub mod session;
pub mod team;
pub mod testing;
pub mod tools;
pub mod trace;
pub mod types;

pub use agent::{
    Agent, AgentEvent, AgentOutcome, FinishMarker, PlainReply, ReActAgent, ReActAgentBuilder,
    TerminalCondition,
};
pub use config::{ConfigError, EngineConfig, LoopConfig, TeamConfig};
pub use hitl::{
    Decision, DecisionAction, FlowInterceptor, Hitl, HitlGate, MemoryPendingTaskStore,
    PauseAfter, PauseBefore, PendingTask, PendingTaskStore,
};
pub use interceptor::{
    ArchivalSummary, CompositeSummary, ContextCompactor, Interceptor, InterceptorChain,
    KeyFactExtraction, LlmSummary, LoopGuard, RollingSummary, SummarizationStrategy, ToolRetry,
    ToolSanitizer,
};
pub use model::{ModelCaller, ModelChunk, ModelRequest};
pub use session::{
    AgentSession, ArchiveStore, FileSnapshotStore, InMemorySession, MemoryArchiveStore,
    SessionConfig, SessionError, Snapshot,
};
pub use team::{Team, TeamBuilder};
pub use tools::{SchemaTool, Tool, ToolRegistry};
pub use trace::{Suspension, SuspensionKind, TeamRecord, Trace, TraceStatus};
pub use types::{Message, Role, ToolCall, ToolDefinition, ToolError, ToolOutput};

/// Error type for agentloop operations.
///
/// Tool failures and suspensions are not errors: the loop turns them into
/// observations or a pending status. What reaches the caller is a failing
/// collaborator, bad configuration, or unusable session state.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The model caller failed.
    #[error("Model call failed: {0}")]
    Model(String),

    #[error("Tool execution failed: {0}")]
    Tool(#[from] types::ToolError),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// A snapshot could not be decoded. There is no partial recovery.
    #[error("Snapshot corrupted: {0}")]
    SnapshotCorrupted(String),

    #[error("Session error: {0}")]
    Session(session::SessionError),

    #[error("No pending task for tool [{tool_name}] in session {session_id}")]
    NoPendingTask {
        session_id: String,
        tool_name: String,
    },

    #[error("Invalid decision: {0}")]
    InvalidDecision(String),

    /// Agent or team registration was rejected (duplicates, cycles).
    #[error("Registration failed: {0}")]
    Registration(String),

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),
}

/// Error category for unified error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Configuration, registration or caller mistakes
    Configuration,
    /// Failures that may succeed on retry (model outages, transient tool errors)
    Transient,
    /// Session and snapshot state errors
    Stateful,
    /// Internal errors (IO, JSON, unexpected states)
    Internal,
}

impl Error {
    pub fn model(message: impl Into<String>) -> Self {
        Error::Model(message.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_)
            | Error::Registration(_)
            | Error::UnknownAgent(_)
            | Error::InvalidDecision(_) => ErrorCategory::Configuration,

            Error::Model(_) => ErrorCategory::Transient,
            Error::Tool(e) if e.is_retryable() => ErrorCategory::Transient,

            Error::Session(_) | Error::SnapshotCorrupted(_) | Error::NoPendingTask { .. } => {
                ErrorCategory::Stateful
            }

            Error::Io(_) | Error::Json(_) | Error::Tool(_) => ErrorCategory::Internal,
        }
    }

    pub fn is_configuration_error(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }

    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }
}

impl From<session::SessionError> for Error {
    fn from(err: session::SessionError) -> Self {
        match err {
            session::SessionError::Corrupted { message } => Error::SnapshotCorrupted(message),
            session::SessionError::Serialization(e) => Error::Json(e),
            session::SessionError::Io(e) => Error::Io(e),
            other => Error::Session(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
