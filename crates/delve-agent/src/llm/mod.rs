//! Model integration layer.
//!
//! - [`types`] -- Messages, content blocks, tool invocations and requests.
//! - [`client`] -- The [`ModelClient`] streaming trait and its channels.
//! - [`mock`] -- [`ScriptedModel`], a replaying client for tests and the CLI.

pub mod client;
pub mod mock;
pub mod types;

pub use client::{CompletionStream, ModelClient, StreamChunk};
pub use mock::{ScriptedModel, ScriptedTurn};
pub use types::{
    CompletionRequest, ContentBlock, FinalMessage, Message, Role, StopReason, ToolInvocation,
    ToolOutcome, ToolSpec,
};
