//! Orchestration engine for Delve.
//!
//! This crate drives a multi-turn exchange between a streaming model client
//! and a registry of tools, keeping the conversation state for one task and
//! running model-issued code in a persistent [`delve_sandbox::Sandbox`].
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐  CompletionRequest  ┌─────────────┐
//! │ Controller │────────────────────>│ ModelClient │
//! │  (runtime) │<── chunks + final ──│   (llm)     │
//! └─────┬──────┘                     └─────────────┘
//!       │ dispatch
//! ┌─────┴────────┐     ┌──────────────┐     ┌─────────┐
//! │ ToolRegistry │────>│ Conversation │     │ Sandbox │
//! │   (tools)    │────>│ State        │     │         │
//! └──────────────┘     └──────────────┘     └─────────┘
//! ```
//!
//! ## Modules
//!
//! - [`runtime`] -- The [`Controller`] state machine.
//! - [`tools`] -- Tool registry, descriptors, built-ins and dispatch.
//! - [`state`] -- Append-only history, plan, findings, termination.
//! - [`llm`] -- Model types, the [`ModelClient`] trait and [`ScriptedModel`].
//! - [`events`] -- The `{type, content}` notification stream.
//! - [`config`] -- [`AgentConfig`] loading and overrides.
//! - [`prompt`] -- Generated system instructions.
//! - [`error`] -- Agent error types.

pub mod config;
pub mod error;
pub mod events;
pub mod llm;
pub mod prompt;
pub mod runtime;
pub mod state;
pub mod tools;

// Re-export the most commonly used types at the crate root.
pub use config::AgentConfig;
pub use error::{AgentError, Result};
pub use events::{Notification, NotificationKind, Notifier};
pub use llm::{
    CompletionRequest, CompletionStream, ContentBlock, FinalMessage, Message, ModelClient, Role,
    ScriptedModel, ScriptedTurn, StopReason, StreamChunk, ToolInvocation, ToolOutcome, ToolSpec,
};
pub use runtime::{Controller, LoopState, RunReport};
pub use state::ConversationState;
pub use tools::{
    Builtin, ParamSpec, ParamType, ToolContext, ToolDescriptor, ToolFault, ToolHandler,
    ToolPayload, ToolRegistry, ToolReply,
};
