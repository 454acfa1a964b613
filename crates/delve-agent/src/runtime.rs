//! Orchestration loop.
//!
//! [`Controller`] drives one task: it asks the model for a streamed
//! completion, relays the partial text, appends the final message to
//! history, runs every requested tool in order and feeds the outcomes back.
//! The loop ends when `finish` is called, when the iteration cap is reached,
//! or on the first transport failure or cancellation.

use std::sync::Arc;

use delve_sandbox::Sandbox;
use serde::Serialize;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::events::{NotificationKind, Notifier};
use crate::llm::client::{CompletionStream, ModelClient, StreamChunk};
use crate::llm::types::{CompletionRequest, ContentBlock, FinalMessage, StopReason, ToolInvocation};
use crate::prompt;
use crate::state::ConversationState;
use crate::tools::{ToolContext, ToolRegistry};

// ---------------------------------------------------------------------------
// Loop state
// ---------------------------------------------------------------------------

/// Where the controller is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Init,
    Iterating,
    /// `finish` was called.
    Done,
    /// The iteration cap was reached first.
    Exhausted,
    /// Transport failure or cancellation.
    Aborted,
}

impl LoopState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Exhausted | Self::Aborted)
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub task_id: Uuid,
    pub state: LoopState,
    pub iterations: u32,
    pub final_result: Option<Value>,
}

impl RunReport {
    pub fn is_done(&self) -> bool {
        self.state == LoopState::Done
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Owns everything one task needs: state, sandbox, tools and model.
pub struct Controller {
    config: AgentConfig,
    model: Arc<dyn ModelClient>,
    registry: ToolRegistry,
    notifier: Notifier,
    state: ConversationState,
    sandbox: Sandbox,
    loop_state: LoopState,
    iterations: u32,
    cancel: CancellationToken,
}

impl Controller {
    /// Prepare a task.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ConfigError`] if `config` does not validate.
    pub fn new(
        task: impl Into<String>,
        config: AgentConfig,
        model: Arc<dyn ModelClient>,
        registry: ToolRegistry,
        notifier: Notifier,
    ) -> Result<Self> {
        config.validate()?;

        let sandbox = Sandbox::new(config.sandbox.clone());
        let system = match &config.system_prompt {
            Some(prompt) => prompt.clone(),
            None => prompt::system_instructions(&registry.schemas(), sandbox.bound_modules()),
        };
        let state = ConversationState::new(task, system);

        tracing::info!(
            task_id = %state.task_id(),
            model = %config.model,
            max_iterations = config.max_iterations,
            tool_count = registry.len(),
            "controller created"
        );

        Ok(Self {
            config,
            model,
            registry,
            notifier,
            state,
            sandbox,
            loop_state: LoopState::Init,
            iterations: 0,
            cancel: CancellationToken::new(),
        })
    }

    /// Use `token` to stop the run from outside.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn task_id(&self) -> Uuid {
        self.state.task_id()
    }

    pub fn loop_state(&self) -> LoopState {
        self.loop_state
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run the loop to a terminal state.
    ///
    /// Never fails: transport problems and cancellation end the run in
    /// [`LoopState::Aborted`] and are reported on the notification stream.
    /// Calling `run` again after a terminal state returns the same report.
    pub async fn run(&mut self) -> RunReport {
        let task_id = self.state.task_id();
        let max_iterations = self.config.max_iterations;

        if self.loop_state.is_terminal() {
            return self.report();
        }

        self.loop_state = LoopState::Iterating;
        self.notifier.status("Task started.");
        tracing::info!(task_id = %task_id, max_iterations, "starting loop");

        let failure = loop {
            if self.cancel.is_cancelled() {
                break Some(AgentError::Cancelled);
            }

            self.iterations += 1;
            let iterations = self.iterations;
            tracing::debug!(task_id = %task_id, iteration = iterations, "iteration start");
            self.notifier.status(format!(
                "Requesting model turn ({iterations} of {max_iterations})."
            ));

            let message = match self.next_message().await {
                Ok(message) => message,
                Err(err) => break Some(err),
            };

            let invocations: Vec<ToolInvocation> = message
                .content
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::ToolUse(invocation) => Some(invocation.clone()),
                    _ => None,
                })
                .collect();
            self.state.append_assistant(message.content);

            for invocation in &invocations {
                self.run_tool(invocation).await;
            }

            if invocations.is_empty() && message.stop_reason == StopReason::StopSequence {
                tracing::warn!(task_id = %task_id, iteration = iterations, "turn ended without a tool call");
                self.notifier
                    .warning("Model finished its turn without calling a tool. The task may be stalled.");
            }

            if self.state.is_done() {
                self.loop_state = LoopState::Done;
                break None;
            }
            if iterations >= max_iterations {
                self.loop_state = LoopState::Exhausted;
                break None;
            }
        };

        if let Some(err) = failure {
            self.loop_state = LoopState::Aborted;
            tracing::error!(task_id = %task_id, iteration = self.iterations, error = %err, "loop aborted");
            let message = match err {
                AgentError::Cancelled => "Task cancelled.".to_owned(),
                other => other.to_string(),
            };
            self.notifier.error(message);
        }

        match self.loop_state {
            LoopState::Done => {
                let result = self.state.final_result().cloned().unwrap_or(Value::Null);
                self.notifier.status("Task completed successfully.");
                self.notifier.emit(NotificationKind::Done, result);
            }
            LoopState::Exhausted => {
                self.notifier.status(format!(
                    "Task incomplete: reached the limit of {max_iterations} iterations."
                ));
            }
            _ => {}
        }

        tracing::info!(
            task_id = %task_id,
            state = ?self.loop_state,
            iterations = self.iterations,
            "loop finished"
        );
        self.report()
    }

    fn report(&self) -> RunReport {
        RunReport {
            task_id: self.state.task_id(),
            state: self.loop_state,
            iterations: self.iterations,
            final_result: self.state.final_result().cloned(),
        }
    }

    fn request(&self) -> CompletionRequest {
        CompletionRequest {
            model: self.config.model.clone(),
            system: self.state.system_instructions().to_owned(),
            messages: self.state.history().to_vec(),
            tools: self.registry.schemas(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        }
    }

    /// Request one completion, relay its chunks and wait for the final
    /// message.
    async fn next_message(&self) -> Result<FinalMessage> {
        let request = self.request();

        let stream = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(AgentError::Cancelled),
            stream = self.model.generate_stream(request) => stream?,
        };
        let CompletionStream { mut chunks, completion } = stream;

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(AgentError::Cancelled),
                chunk = chunks.recv() => match chunk {
                    Some(StreamChunk::Delta(text)) if text.is_empty() => {}
                    Some(StreamChunk::Delta(text)) => self.notifier.emit(NotificationKind::Chunk, text),
                    Some(StreamChunk::Error(reason)) => {
                        return Err(AgentError::TransportFailure { reason });
                    }
                    None => break,
                },
            }
        }

        let message = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(AgentError::Cancelled),
            message = completion => message.map_err(|_| AgentError::TransportFailure {
                reason: "stream ended without a final message".into(),
            })?,
        };

        if message.content.iter().all(ContentBlock::is_empty) {
            return Err(AgentError::TransportFailure {
                reason: "model returned an empty message".into(),
            });
        }

        tracing::debug!(
            task_id = %self.state.task_id(),
            blocks = message.content.len(),
            stop_reason = ?message.stop_reason,
            "final message received"
        );
        Ok(message)
    }

    async fn run_tool(&mut self, invocation: &ToolInvocation) {
        tracing::info!(
            task_id = %self.state.task_id(),
            tool = %invocation.name,
            id = %invocation.id,
            "tool call"
        );
        self.notifier.emit(
            NotificationKind::ToolCall,
            json!({
                "id": invocation.id,
                "tool": invocation.name,
                "arguments": invocation.arguments,
            }),
        );

        let mut ctx = ToolContext {
            state: &mut self.state,
            sandbox: &mut self.sandbox,
            notifier: &self.notifier,
        };
        let reply = self
            .registry
            .dispatch(&invocation.name, invocation.arguments.clone(), &mut ctx)
            .await;

        self.notifier.emit(NotificationKind::ToolResult, reply.notification());
        self.state
            .append_tool_outcome(invocation.id.clone(), &reply.payload.to_value(), reply.success);
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("task_id", &self.state.task_id())
            .field("model", &self.model.model_id())
            .field("loop_state", &self.loop_state)
            .field("registry", &self.registry)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
