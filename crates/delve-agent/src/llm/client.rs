//! Model client seam.
//!
//! A [`ModelClient`] turns a [`CompletionRequest`] into a [`CompletionStream`]:
//! incremental text on one channel and the aggregated [`FinalMessage`] on
//! another.  The concrete vendor wire protocol lives behind this trait.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::error::Result;
use crate::llm::types::{CompletionRequest, FinalMessage};

/// One event relayed while a completion is being generated.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// A fragment of assistant text.
    Delta(String),
    /// The stream failed.  At most one is sent, and no final message follows.
    Error(String),
}

/// A completion in flight.
///
/// `chunks` closes once the client is done producing partial content.  The
/// aggregated message arrives on `completion`; if the sender is dropped
/// without sending, the turn produced no final message.
#[derive(Debug)]
pub struct CompletionStream {
    pub chunks: mpsc::Receiver<StreamChunk>,
    pub completion: oneshot::Receiver<FinalMessage>,
}

impl CompletionStream {
    /// Create a stream together with the sending halves a client writes to.
    pub fn channel(
        buffer: usize,
    ) -> (
        mpsc::Sender<StreamChunk>,
        oneshot::Sender<FinalMessage>,
        Self,
    ) {
        let (chunk_tx, chunks) = mpsc::channel(buffer.max(1));
        let (final_tx, completion) = oneshot::channel();
        (chunk_tx, final_tx, Self { chunks, completion })
    }
}

/// A streaming completion capability.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Identifier of the model this client talks to.
    fn model_id(&self) -> &str;

    /// Start generating a completion.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::TransportFailure`](crate::AgentError::TransportFailure)
    /// when the request cannot be started at all.
    async fn generate_stream(&self, request: CompletionRequest) -> Result<CompletionStream>;
}
