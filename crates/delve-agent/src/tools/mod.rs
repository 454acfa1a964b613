//! Tool registry and dispatcher.
//!
//! [`ToolRegistry`] holds every tool the model may call: the four
//! [`Builtin`]s first, then dynamic tools in registration order.
//! [`ToolRegistry::dispatch`] routes one invocation and always produces a
//! [`ToolReply`]; unknown names, bad arguments, faults and panics all become
//! failed replies rather than errors.

pub mod builtin;
pub mod descriptor;

use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use delve_sandbox::Sandbox;
use futures::FutureExt;
use jsonschema::{Draft, JSONSchema};
use serde_json::{Value, json};

use crate::error::{AgentError, Result};
use crate::events::Notifier;
use crate::llm::types::ToolSpec;
use crate::state::{ConversationState, canonical_text};

pub use builtin::Builtin;
pub use descriptor::{ParamSpec, ParamType, ToolDescriptor};

// ---------------------------------------------------------------------------
// Handler seam
// ---------------------------------------------------------------------------

/// A fault raised by a tool implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ToolFault {
    pub kind: String,
    pub message: String,
}

impl ToolFault {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Implementation of a dynamic tool.
///
/// Handlers receive the validated arguments with defaults filled in.  A
/// string result is passed to the model verbatim; anything else is rendered
/// as canonical JSON.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: Value) -> std::result::Result<Value, ToolFault>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F> ToolHandler for FnHandler<F>
where
    F: Fn(Value) -> std::result::Result<Value, ToolFault> + Send + Sync,
{
    async fn call(&self, arguments: Value) -> std::result::Result<Value, ToolFault> {
        (self.0)(arguments)
    }
}

/// Dependencies injected into built-in tools.
pub struct ToolContext<'a> {
    pub state: &'a mut ConversationState,
    pub sandbox: &'a mut Sandbox,
    pub notifier: &'a Notifier,
}

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

/// What a tool produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolPayload {
    Text(String),
    /// Output of `run-code`.
    Execution {
        stdout: String,
        error: Option<String>,
    },
    Structured(Value),
}

impl ToolPayload {
    pub fn to_value(&self) -> Value {
        match self {
            Self::Text(text) => Value::String(text.clone()),
            Self::Execution { stdout, error } => json!({ "stdout": stdout, "error": error }),
            Self::Structured(value) => value.clone(),
        }
    }

    /// Deterministic text form stored in history.
    pub fn canonical_text(&self) -> String {
        canonical_text(&self.to_value())
    }
}

impl From<Value> for ToolPayload {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => Self::Text(text),
            other => Self::Structured(other),
        }
    }
}

/// The result of one dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolReply {
    pub tool: String,
    pub success: bool,
    pub payload: ToolPayload,
}

impl ToolReply {
    fn ok(tool: &str, payload: ToolPayload) -> Self {
        // A snippet that faulted is a failed call even though dispatch worked.
        let success = !matches!(payload, ToolPayload::Execution { error: Some(_), .. });
        Self {
            tool: tool.to_owned(),
            success,
            payload,
        }
    }

    fn failure(tool: &str, message: String) -> Self {
        tracing::warn!(tool = %tool, error = %message, "tool call failed");
        Self {
            tool: tool.to_owned(),
            success: false,
            payload: ToolPayload::Text(message),
        }
    }

    /// Content of the `tool_result` notification.
    pub fn notification(&self) -> Value {
        match &self.payload {
            ToolPayload::Execution { stdout, error } => json!({
                "tool": self.tool,
                "success": self.success,
                "stdout": stdout,
                "error": error,
            }),
            payload => json!({
                "tool": self.tool,
                "success": self.success,
                "content": payload.canonical_text(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

enum Implementation {
    Builtin(Builtin),
    Dynamic {
        descriptor: ToolDescriptor,
        handler: Arc<dyn ToolHandler>,
    },
}

struct RegisteredTool {
    spec: ToolSpec,
    validator: JSONSchema,
    implementation: Implementation,
}

/// All tools available to one task.
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    /// Create a registry holding only the built-ins.
    pub fn new() -> Result<Self> {
        let mut registry = Self {
            tools: Vec::new(),
            index: HashMap::new(),
        };
        for builtin in Builtin::ALL {
            registry.insert(builtin.spec(), Implementation::Builtin(builtin))?;
        }
        Ok(registry)
    }

    /// Register a dynamic tool.
    ///
    /// # Errors
    ///
    /// Fails if the name belongs to a built-in, is already registered, or the
    /// descriptor's schema does not compile.
    pub fn register(&mut self, descriptor: ToolDescriptor, handler: Arc<dyn ToolHandler>) -> Result<()> {
        if Builtin::from_name(&descriptor.name).is_some() {
            return Err(AgentError::ReservedToolName {
                tool_name: descriptor.name,
            });
        }
        if self.index.contains_key(&descriptor.name) {
            return Err(AgentError::DuplicateTool {
                tool_name: descriptor.name,
            });
        }

        let spec = descriptor.spec();
        self.insert(spec, Implementation::Dynamic { descriptor, handler })?;
        Ok(())
    }

    /// Register a synchronous closure as a dynamic tool.
    pub fn register_fn<F>(&mut self, descriptor: ToolDescriptor, f: F) -> Result<()>
    where
        F: Fn(Value) -> std::result::Result<Value, ToolFault> + Send + Sync + 'static,
    {
        self.register(descriptor, Arc::new(FnHandler(f)))
    }

    fn insert(&mut self, spec: ToolSpec, implementation: Implementation) -> Result<()> {
        let validator = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&spec.input_schema)
            .map_err(|e| AgentError::InvalidSchema {
                tool_name: spec.name.clone(),
                reason: e.to_string(),
            })?;

        tracing::debug!(tool = %spec.name, "tool registered");
        self.index.insert(spec.name.clone(), self.tools.len());
        self.tools.push(RegisteredTool {
            spec,
            validator,
            implementation,
        });
        Ok(())
    }

    /// Tool specifications: built-ins first, then dynamic tools in
    /// registration order.
    pub fn schemas(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|tool| tool.spec.clone()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|tool| tool.spec.name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Invoke tool `name`.  Never fails: every problem becomes a failed
    /// [`ToolReply`] whose text is meant for the model.
    pub async fn dispatch(&self, name: &str, arguments: Value, ctx: &mut ToolContext<'_>) -> ToolReply {
        let Some(tool) = self.index.get(name).map(|&i| &self.tools[i]) else {
            return ToolReply::failure(name, format!("Error: Tool '{name}' not found."));
        };

        let arguments = match &tool.implementation {
            Implementation::Dynamic { descriptor, .. } => descriptor.apply_defaults(arguments),
            Implementation::Builtin(_) if arguments.is_null() => json!({}),
            Implementation::Builtin(_) => arguments,
        };

        if let Err(errors) = tool.validator.validate(&arguments) {
            let reasons: Vec<String> = errors.map(|e| e.to_string()).collect();
            return ToolReply::failure(
                name,
                format!(
                    "Error: Invalid arguments for tool '{name}': {}",
                    reasons.join("; ")
                ),
            );
        }

        tracing::debug!(tool = %name, "executing tool");

        let outcome = AssertUnwindSafe(async {
            match &tool.implementation {
                Implementation::Builtin(builtin) => builtin.run(&arguments, ctx),
                Implementation::Dynamic { handler, .. } => {
                    handler.call(arguments.clone()).await.map(ToolPayload::from)
                }
            }
        })
        .catch_unwind()
        .await;

        match outcome {
            Ok(Ok(payload)) => ToolReply::ok(name, payload),
            Ok(Err(fault)) => {
                ToolReply::failure(name, format!("Error executing tool '{name}': {fault}"))
            }
            Err(panic) => {
                let fault = ToolFault::new("Panic", panic_message(panic.as_ref()));
                ToolReply::failure(name, format!("Error executing tool '{name}': {fault}"))
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "tool panicked".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NotificationKind;

    struct Fixture {
        state: ConversationState,
        sandbox: Sandbox,
        notifier: Notifier,
        rx: tokio::sync::mpsc::UnboundedReceiver<crate::events::Notification>,
    }

    impl Fixture {
        fn new() -> Self {
            let (notifier, rx) = Notifier::channel();
            Self {
                state: ConversationState::new("task", "system"),
                sandbox: Sandbox::with_defaults(),
                notifier,
                rx,
            }
        }

        fn ctx(&mut self) -> ToolContext<'_> {
            ToolContext {
                state: &mut self.state,
                sandbox: &mut self.sandbox,
                notifier: &self.notifier,
            }
        }
    }

    fn echo() -> ToolDescriptor {
        ToolDescriptor::new("echo", "Echo the input back.")
            .param(ParamSpec::new("text", ParamType::String))
            .param(ParamSpec::new("times", ParamType::Integer).with_default(1))
    }

    fn registry_with_echo() -> ToolRegistry {
        let mut registry = ToolRegistry::new().unwrap();
        registry
            .register_fn(echo(), |args| {
                let times = args["times"].as_u64().unwrap_or(1) as usize;
                Ok(Value::String(args["text"].as_str().unwrap_or("").repeat(times)))
            })
            .unwrap();
        registry
    }

    #[test]
    fn schemas_are_stable_and_builtins_first() {
        let registry = registry_with_echo();
        let first = registry.schemas();
        assert_eq!(first, registry.schemas());
        let names: Vec<_> = first.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["run-code", "set-plan", "record-findings", "finish", "echo"]);
    }

    #[test]
    fn builtin_names_are_reserved() {
        let mut registry = ToolRegistry::new().unwrap();
        let err = registry
            .register_fn(ToolDescriptor::new("finish", "mine"), |_| Ok(Value::Null))
            .unwrap_err();
        assert!(matches!(err, AgentError::ReservedToolName { .. }));
    }

    #[test]
    fn duplicate_dynamic_names_are_rejected() {
        let mut registry = registry_with_echo();
        let err = registry.register_fn(echo(), |_| Ok(Value::Null)).unwrap_err();
        assert!(matches!(err, AgentError::DuplicateTool { .. }));
        assert_eq!(registry.len(), 5);
    }

    #[tokio::test]
    async fn unknown_tool_is_a_failed_reply() {
        let registry = ToolRegistry::new().unwrap();
        let mut fixture = Fixture::new();
        let reply = registry.dispatch("search", json!({}), &mut fixture.ctx()).await;
        assert!(!reply.success);
        assert_eq!(
            reply.payload,
            ToolPayload::Text("Error: Tool 'search' not found.".into())
        );
    }

    #[tokio::test]
    async fn invalid_arguments_are_rejected_before_running() {
        let registry = registry_with_echo();
        let mut fixture = Fixture::new();
        let reply = registry
            .dispatch("echo", json!({"text": 3}), &mut fixture.ctx())
            .await;
        assert!(!reply.success);
        let ToolPayload::Text(message) = reply.payload else {
            panic!("expected text payload");
        };
        assert!(message.starts_with("Error: Invalid arguments for tool 'echo':"), "{message}");

        let reply = registry.dispatch("run-code", json!({}), &mut fixture.ctx()).await;
        assert!(!reply.success);
    }

    #[tokio::test]
    async fn defaults_are_applied_for_dynamic_tools() {
        let registry = registry_with_echo();
        let mut fixture = Fixture::new();
        let reply = registry
            .dispatch("echo", json!({"text": "ab"}), &mut fixture.ctx())
            .await;
        assert!(reply.success);
        assert_eq!(reply.payload, ToolPayload::Text("ab".into()));

        let reply = registry
            .dispatch("echo", json!({"text": "ab", "times": 3}), &mut fixture.ctx())
            .await;
        assert_eq!(reply.payload, ToolPayload::Text("ababab".into()));
    }

    #[tokio::test]
    async fn faults_and_panics_become_failed_replies() {
        let mut registry = ToolRegistry::new().unwrap();
        registry
            .register_fn(ToolDescriptor::new("broken", "Always fails."), |_| {
                Err(ToolFault::new("LookupError", "no such record"))
            })
            .unwrap();
        registry
            .register_fn(ToolDescriptor::new("explode", "Always panics."), |_| {
                panic!("boom")
            })
            .unwrap();
        let mut fixture = Fixture::new();

        let reply = registry.dispatch("broken", json!({}), &mut fixture.ctx()).await;
        assert_eq!(
            reply.payload,
            ToolPayload::Text("Error executing tool 'broken': LookupError: no such record".into())
        );

        let reply = registry.dispatch("explode", json!({}), &mut fixture.ctx()).await;
        assert!(!reply.success);
        assert_eq!(
            reply.payload,
            ToolPayload::Text("Error executing tool 'explode': Panic: boom".into())
        );
    }

    #[tokio::test]
    async fn run_code_merges_bindings_into_state() {
        let registry = ToolRegistry::new().unwrap();
        let mut fixture = Fixture::new();

        let reply = registry
            .dispatch("run-code", json!({"code": "x = 1"}), &mut fixture.ctx())
            .await;
        assert!(reply.success);
        assert!(fixture.state.bindings().contains_key("x"));

        let reply = registry
            .dispatch("run-code", json!({"code": "print(x)"}), &mut fixture.ctx())
            .await;
        assert_eq!(
            reply.payload,
            ToolPayload::Execution {
                stdout: "1\n".into(),
                error: None
            }
        );
    }

    #[tokio::test]
    async fn faulting_snippet_is_a_failed_execution() {
        let registry = ToolRegistry::new().unwrap();
        let mut fixture = Fixture::new();
        let reply = registry
            .dispatch("run-code", json!({"code": "1 / 0"}), &mut fixture.ctx())
            .await;
        assert!(!reply.success);
        assert_eq!(
            reply.notification(),
            json!({
                "tool": "run-code",
                "success": false,
                "stdout": "",
                "error": "ZeroDivisionError: division by zero",
            })
        );
    }

    #[tokio::test]
    async fn document_tools_replace_and_notify() {
        let registry = ToolRegistry::new().unwrap();
        let mut fixture = Fixture::new();

        registry
            .dispatch("set-plan", json!({"text": "# Plan\n- [ ] add"}), &mut fixture.ctx())
            .await;
        registry
            .dispatch("record-findings", json!({"text": "# Findings"}), &mut fixture.ctx())
            .await;

        assert_eq!(fixture.state.plan(), "# Plan\n- [ ] add");
        assert_eq!(fixture.state.findings(), "# Findings");

        let first = fixture.rx.try_recv().unwrap();
        let second = fixture.rx.try_recv().unwrap();
        assert_eq!(first.kind, NotificationKind::Plan);
        assert_eq!(second.kind, NotificationKind::Findings);
    }

    #[tokio::test]
    async fn finish_sets_termination_once() {
        let registry = ToolRegistry::new().unwrap();
        let mut fixture = Fixture::new();

        let reply = registry
            .dispatch("finish", json!({"result": "42"}), &mut fixture.ctx())
            .await;
        assert!(reply.success);
        assert_eq!(reply.payload, ToolPayload::Text("42".into()));
        assert!(fixture.state.is_done());
        assert_eq!(fixture.state.final_result(), Some(&json!("42")));

        let reply = registry
            .dispatch("finish", json!({"result": "43"}), &mut fixture.ctx())
            .await;
        assert_eq!(reply.payload, ToolPayload::Text("42".into()));

        let status = fixture.rx.try_recv().unwrap();
        assert_eq!(status.kind, NotificationKind::Status);
        assert!(fixture.rx.try_recv().is_err());
    }
}
