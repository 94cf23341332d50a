//! Event stream over one run.

use std::sync::Arc;

use futures::Stream;
use tokio::sync::mpsc;

use super::events::AgentEvent;
use super::react::{Emitter, ReActAgent};
use crate::session::AgentSession;

const EVENT_BUFFER: usize = 64;

impl ReActAgent {
    /// Run like [`Agent::call`](super::Agent::call), yielding events as the
    /// loop advances. Model output arrives as `Delta` chunks before the
    /// complete `Reasoning` reply. The stream ends with `Finished` or `Failed`.
    ///
    /// The run lives on its own task; dropping the stream does not cancel it,
    /// so the trace is always saved.
    pub fn stream(
        self: &Arc<Self>,
        prompt: Option<String>,
        session: Arc<dyn AgentSession>,
    ) -> impl Stream<Item = AgentEvent> + Send + 'static {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let agent = Arc::clone(self);

        tokio::spawn(async move {
            let emitter = Emitter::new(tx.clone());
            let event = match agent.run(prompt.as_deref(), session.as_ref(), &emitter).await {
                Ok(outcome) => AgentEvent::Finished(Box::new(outcome)),
                Err(e) => {
                    tracing::warn!(agent = %agent.name, error = %e, "Streamed run failed");
                    AgentEvent::Failed(e.to_string())
                }
            };
            let _ = tx.send(event).await;
        });

        futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Agent;
    use crate::model::{ChunkStream, ModelCaller, ModelChunk, ModelRequest};
    use crate::session::InMemorySession;
    use crate::testing::{FnTool, ScriptedModel};
    use crate::types::{Message, ToolCall};
    use async_trait::async_trait;
    use futures::StreamExt;
    use serde_json::json;

    /// Streams its answer in fixed pieces; `call` is never used.
    struct ChunkedModel(Vec<&'static str>);

    #[async_trait]
    impl ModelCaller for ChunkedModel {
        async fn call(&self, _request: ModelRequest<'_>) -> crate::Result<Message> {
            panic!("streamed runs must not use call")
        }

        async fn stream(&self, _request: ModelRequest<'_>) -> crate::Result<ChunkStream> {
            let chunks: Vec<_> = self
                .0
                .iter()
                .map(|piece| Ok(ModelChunk::Text(piece.to_string())))
                .collect();
            Ok(Box::pin(futures::stream::iter(chunks)))
        }
    }

    #[tokio::test]
    async fn test_stream_emits_loop_events() {
        let model = ScriptedModel::new(vec![
            Message::assistant_with_tools(
                "",
                vec![ToolCall::new("c1", "echo", json!({"text": "hi"}))],
            ),
            Message::assistant("[FINISH] hi"),
        ]);
        let agent = Arc::new(
            ReActAgent::builder("a")
                .model(Arc::new(model))
                .tool(FnTool::new("echo", |args| {
                    Ok(args["text"].as_str().unwrap_or_default().into())
                }))
                .build()
                .unwrap(),
        );
        let session: Arc<dyn AgentSession> = Arc::new(InMemorySession::new("s1"));

        let events: Vec<AgentEvent> = agent
            .stream(Some("say hi".into()), session)
            .collect()
            .await;

        assert!(matches!(&events[0], AgentEvent::Delta(ModelChunk::ToolCall(c)) if c.id == "c1"));
        assert!(matches!(events[1], AgentEvent::Reasoning(_)));
        assert!(matches!(&events[2], AgentEvent::ToolCall(c) if c.name == "echo"));
        assert!(
            matches!(&events[3], AgentEvent::Observation { content, .. } if content == "hi")
        );
        assert!(matches!(&events[4], AgentEvent::Delta(ModelChunk::Text(t)) if t == "[FINISH] hi"));
        match events.last().unwrap() {
            AgentEvent::Finished(outcome) => {
                assert_eq!(outcome.text(), "hi");
                assert_eq!(outcome.tool_calls, 1);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stream_emits_deltas_before_reply() {
        let agent = Arc::new(
            ReActAgent::builder("a")
                .model(Arc::new(ChunkedModel(vec!["[FIN", "ISH] all ", "done"])))
                .build()
                .unwrap(),
        );
        let session: Arc<dyn AgentSession> = Arc::new(InMemorySession::new("s1"));

        let events: Vec<AgentEvent> = agent
            .stream(Some("go".into()), session.clone())
            .collect()
            .await;

        let deltas: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                AgentEvent::Delta(ModelChunk::Text(t)) => Some(t.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(deltas, vec!["[FIN", "ISH] all ", "done"]);
        assert!(matches!(&events[3], AgentEvent::Reasoning(m) if m.content == "[FINISH] all done"));
        match events.last().unwrap() {
            AgentEvent::Finished(outcome) => assert_eq!(outcome.text(), "all done"),
            other => panic!("unexpected event: {:?}", other),
        }

        // Non-streamed runs still go through `call`.
        let plain = ReActAgent::builder("b")
            .model(Arc::new(ScriptedModel::new(vec![Message::assistant("[FINISH] ok")])))
            .build()
            .unwrap();
        let outcome = plain.call(Some("go"), session.as_ref()).await.unwrap();
        assert_eq!(outcome.text(), "ok");
    }

    #[tokio::test]
    async fn test_stream_reports_failure() {
        let agent = Arc::new(
            ReActAgent::builder("a")
                .model(Arc::new(ScriptedModel::new(vec![])))
                .build()
                .unwrap(),
        );
        let session: Arc<dyn AgentSession> = Arc::new(InMemorySession::new("s1"));

        let events: Vec<AgentEvent> = agent.stream(Some("hi".into()), session).collect().await;
        assert!(matches!(events.last(), Some(AgentEvent::Failed(_))));
    }
}
