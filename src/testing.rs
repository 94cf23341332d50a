//! Deterministic stand-ins for models and tools, for tests and demos.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::model::{ModelCaller, ModelRequest};
use crate::tools::Tool;
use crate::types::{Message, ToolError, ToolOutput};

/// Replays a fixed list of replies and records every request it receives.
///
/// Running out of replies is a model error, so tests fail loudly when the
/// loop makes more calls than scripted.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Message>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Message>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, reply: Message) {
        lock(&self.replies).push_back(reply);
    }

    /// Messages of every request so far, oldest first.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        lock(&self.requests).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }

    pub fn remaining(&self) -> usize {
        lock(&self.replies).len()
    }
}

#[async_trait]
impl ModelCaller for ScriptedModel {
    async fn call(&self, request: ModelRequest<'_>) -> crate::Result<Message> {
        lock(&self.requests).push(request.messages.to_vec());
        lock(&self.replies)
            .pop_front()
            .ok_or_else(|| crate::Error::Model("scripted model has no replies left".into()))
    }
}

type Handler = dyn Fn(serde_json::Value) -> Result<ToolOutput, ToolError> + Send + Sync;

/// Tool backed by a closure, counting its invocations.
pub struct FnTool {
    name: String,
    description: String,
    schema: serde_json::Value,
    handler: Box<Handler>,
    calls: Arc<AtomicUsize>,
}

impl FnTool {
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(serde_json::Value) -> Result<ToolOutput, ToolError> + Send + Sync + 'static,
    {
        let name = name.into();
        Self {
            description: format!("Test tool {}", name),
            name,
            schema: serde_json::json!({"type": "object", "properties": {}}),
            handler: Box::new(handler),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.schema = schema;
        self
    }

    /// Shared invocation counter; stays valid after the tool is registered.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> serde_json::Value {
        self.schema.clone()
    }

    async fn invoke(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.handler)(arguments)
    }
}

impl std::fmt::Debug for FnTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.name)
            .field("calls", &self.calls.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
