//! Model-call abstraction.
//!
//! The engine never talks to a provider directly. A [`ModelCaller`] turns the
//! working memory into one assistant message, surfacing tool calls
//! structurally when the provider supports them, or leaving `Action:` lines in
//! the text for the text protocol fallback.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::types::{Message, ToolCall, ToolDefinition};

pub type ChunkStream = Pin<Box<dyn Stream<Item = crate::Result<ModelChunk>> + Send>>;

/// One model request: the working memory plus the tools offered.
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub messages: &'a [Message],
    pub tools: &'a [ToolDefinition],
}

impl<'a> ModelRequest<'a> {
    pub fn new(messages: &'a [Message], tools: &'a [ToolDefinition]) -> Self {
        Self { messages, tools }
    }

    pub fn without_tools(messages: &'a [Message]) -> Self {
        Self {
            messages,
            tools: &[],
        }
    }
}

/// Incremental piece of a streamed assistant message.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelChunk {
    Text(String),
    ToolCall(ToolCall),
}

#[async_trait]
pub trait ModelCaller: Send + Sync {
    async fn call(&self, request: ModelRequest<'_>) -> crate::Result<Message>;

    /// Streaming variant. The default adapts [`ModelCaller::call`] into a
    /// single text chunk followed by the tool calls.
    async fn stream(&self, request: ModelRequest<'_>) -> crate::Result<ChunkStream> {
        let message = self.call(request).await?;
        let mut chunks = Vec::with_capacity(message.tool_calls.len() + 1);
        if !message.content.is_empty() {
            chunks.push(Ok(ModelChunk::Text(message.content)));
        }
        chunks.extend(message.tool_calls.into_iter().map(|c| Ok(ModelChunk::ToolCall(c))));
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

/// Folds streamed chunks back into one assistant message.
#[derive(Debug, Default)]
pub struct MessageAccumulator {
    content: String,
    tool_calls: Vec<ToolCall>,
}

impl MessageAccumulator {
    pub fn push(&mut self, chunk: &ModelChunk) {
        match chunk {
            ModelChunk::Text(text) => self.content.push_str(text),
            ModelChunk::ToolCall(call) => self.tool_calls.push(call.clone()),
        }
    }

    pub fn finish(self) -> Message {
        Message::assistant_with_tools(self.content, self.tool_calls)
    }
}
