//! Scripted model for tests and offline replay.
//!
//! [`ScriptedModel`] is a queue-based fake: each call to
//! [`generate_stream`](ModelClient::generate_stream) pops the next
//! [`ScriptedTurn`], replays its chunks and then either delivers its final
//! message or fails the stream.  Every request is recorded for later
//! assertion.  An exhausted queue behaves like a transport failure.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::llm::client::{CompletionStream, ModelClient, StreamChunk};
use crate::llm::types::{CompletionRequest, ContentBlock, FinalMessage, StopReason, ToolInvocation};

/// One scripted model turn.
///
/// In JSON form:
///
/// ```json
/// {"chunks": ["Adding "], "final": {"content": [{"type": "text", "text": "Adding"}], "stop_reason": "end_turn"}}
/// {"chunks": [], "failure": "connection reset"}
/// ```
///
/// A turn with neither `final` nor `failure` drops the completion sender.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptedTurn {
    #[serde(default)]
    pub chunks: Vec<String>,

    #[serde(default, rename = "final", skip_serializing_if = "Option::is_none")]
    pub final_message: Option<FinalMessage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl ScriptedTurn {
    /// A plain text answer, streamed as a single chunk.
    pub fn reply(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            chunks: vec![text.clone()],
            final_message: Some(FinalMessage {
                content: vec![ContentBlock::text(text)],
                stop_reason: StopReason::EndTurn,
            }),
            failure: None,
        }
    }

    /// A single tool invocation with no accompanying text.
    pub fn tool_call(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self::tool_calls(vec![ToolInvocation {
            id: id.into(),
            name: name.into(),
            arguments,
        }])
    }

    /// Several tool invocations in emission order.
    pub fn tool_calls(invocations: Vec<ToolInvocation>) -> Self {
        Self {
            chunks: Vec::new(),
            final_message: Some(FinalMessage {
                content: invocations.into_iter().map(ContentBlock::ToolUse).collect(),
                stop_reason: StopReason::ToolUse,
            }),
            failure: None,
        }
    }

    /// A stream that fails after its chunks.
    pub fn transport_failure(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Prepend text to the final message and stream it as a chunk.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.chunks.insert(0, text.clone());
        if let Some(message) = &mut self.final_message {
            message.content.insert(0, ContentBlock::text(text));
        }
        self
    }

    pub fn with_chunks<I, S>(mut self, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.chunks = chunks.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_stop_reason(mut self, stop_reason: StopReason) -> Self {
        if let Some(message) = &mut self.final_message {
            message.stop_reason = stop_reason;
        }
        self
    }
}

/// A queue-based [`ModelClient`].
pub struct ScriptedModel {
    model_id: String,
    turns: Mutex<VecDeque<ScriptedTurn>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl fmt::Debug for ScriptedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedModel")
            .field("model_id", &self.model_id)
            .field("queued_turns", &self.remaining())
            .field("recorded_requests", &self.requests().len())
            .finish()
    }
}

impl ScriptedModel {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            turns: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a model that will replay `turns` in order.
    pub fn with_turns(model_id: impl Into<String>, turns: impl IntoIterator<Item = ScriptedTurn>) -> Self {
        let model = Self::new(model_id);
        model
            .turns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(turns);
        model
    }

    /// Parse a JSON array of turns.
    pub fn from_json(model_id: impl Into<String>, script: &str) -> Result<Self> {
        let turns: Vec<ScriptedTurn> = serde_json::from_str(script)?;
        Ok(Self::with_turns(model_id, turns))
    }

    pub fn push(&self, turn: ScriptedTurn) {
        self.turns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(turn);
    }

    /// Number of turns not yet replayed.
    pub fn remaining(&self) -> usize {
        self.turns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate_stream(&self, request: CompletionRequest) -> Result<CompletionStream> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        let turn = self
            .turns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or_else(|| AgentError::TransportFailure {
                reason: "scripted model has no turns left".into(),
            })?;

        // Every chunk plus a possible error fits, so nothing here can block.
        let (chunk_tx, final_tx, stream) = CompletionStream::channel(turn.chunks.len() + 1);
        for chunk in turn.chunks {
            if chunk_tx.try_send(StreamChunk::Delta(chunk)).is_err() {
                break;
            }
        }

        match (turn.failure, turn.final_message) {
            (Some(reason), _) => {
                tracing::debug!(reason = %reason, "scripted transport failure");
                let _ = chunk_tx.try_send(StreamChunk::Error(reason));
            }
            (None, Some(message)) => {
                let _ = final_tx.send(message);
            }
            (None, None) => tracing::debug!("scripted turn drops its completion"),
        }

        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "scripted".into(),
            system: String::new(),
            messages: Vec::new(),
            tools: Vec::new(),
            temperature: 0.0,
            max_tokens: 16,
        }
    }

    #[tokio::test]
    async fn replays_chunks_then_final_message() {
        let model = ScriptedModel::with_turns("scripted", [ScriptedTurn::reply("hello")]);
        let mut stream = model.generate_stream(request()).await.unwrap();

        assert_eq!(
            stream.chunks.recv().await,
            Some(StreamChunk::Delta("hello".into()))
        );
        assert_eq!(stream.chunks.recv().await, None);

        let message = stream.completion.await.unwrap();
        assert_eq!(message.stop_reason, StopReason::EndTurn);
        assert_eq!(model.requests().len(), 1);
        assert_eq!(model.remaining(), 0);
    }

    #[tokio::test]
    async fn failure_sends_error_and_drops_completion() {
        let model = ScriptedModel::with_turns(
            "scripted",
            [ScriptedTurn::transport_failure("reset").with_chunks(["par"])],
        );
        let mut stream = model.generate_stream(request()).await.unwrap();
        assert_eq!(stream.chunks.recv().await, Some(StreamChunk::Delta("par".into())));
        assert_eq!(stream.chunks.recv().await, Some(StreamChunk::Error("reset".into())));
        assert!(stream.completion.await.is_err());
    }

    #[tokio::test]
    async fn empty_queue_is_transport_failure() {
        let model = ScriptedModel::new("scripted");
        let err = model.generate_stream(request()).await.unwrap_err();
        assert!(matches!(err, AgentError::TransportFailure { .. }));
        assert_eq!(model.requests().len(), 1);
    }

    #[test]
    fn turns_parse_from_json() {
        let model = ScriptedModel::from_json(
            "scripted",
            r#"[
                {"chunks": ["Working"], "final": {"content": [
                    {"type": "tool_use", "id": "t1", "name": "finish", "input": {"result": "4"}}
                ], "stop_reason": "tool_use"}},
                {"failure": "timeout"}
            ]"#,
        )
        .unwrap();
        assert_eq!(model.remaining(), 2);
    }

    #[test]
    fn builders_compose() {
        let turn = ScriptedTurn::tool_call("t1", "finish", json!({"result": "4"})).with_text("Done.");
        let message = turn.final_message.unwrap();
        assert_eq!(message.content.len(), 2);
        assert_eq!(message.content[0], ContentBlock::text("Done."));
        assert_eq!(turn.chunks, vec!["Done.".to_string()]);
    }
}
