//! Built-in tools.
//!
//! These four tools are always registered first and need the per-task
//! context: the sandbox, the conversation state and the notifier.

use serde_json::{Value, json};

use crate::events::NotificationKind;
use crate::llm::types::ToolSpec;
use crate::tools::{ToolContext, ToolFault, ToolPayload};

/// The fixed built-in tools, in the order they are exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    RunCode,
    SetPlan,
    RecordFindings,
    Finish,
}

impl Builtin {
    pub const ALL: [Builtin; 4] = [
        Builtin::RunCode,
        Builtin::SetPlan,
        Builtin::RecordFindings,
        Builtin::Finish,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::RunCode => "run-code",
            Self::SetPlan => "set-plan",
            Self::RecordFindings => "record-findings",
            Self::Finish => "finish",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|builtin| builtin.name() == name)
    }

    pub fn spec(self) -> ToolSpec {
        let (description, param, param_description, param_type) = match self {
            Self::RunCode => (
                "Runs a code snippet in the persistent sandbox. Variables survive between calls; use print() to produce output.",
                "code",
                "The snippet to run.",
                Some("string"),
            ),
            Self::SetPlan => (
                "Replaces the working plan (a Markdown checklist). Call it at the start of each reasoning step.",
                "text",
                "The complete updated plan in Markdown.",
                Some("string"),
            ),
            Self::RecordFindings => (
                "Replaces the findings document (Markdown). Call it before finish.",
                "text",
                "The complete findings in Markdown.",
                Some("string"),
            ),
            Self::Finish => (
                "Delivers the final answer to the task and ends the run.",
                "result",
                "The final answer.",
                None,
            ),
        };

        let mut property = json!({ "description": param_description });
        if let Some(param_type) = param_type {
            property["type"] = json!(param_type);
        }

        ToolSpec {
            name: self.name().to_owned(),
            description: description.to_owned(),
            input_schema: json!({
                "type": "object",
                "properties": { param: property },
                "required": [param],
            }),
        }
    }

    /// Run the tool against already validated arguments.
    pub fn run(self, arguments: &Value, ctx: &mut ToolContext<'_>) -> Result<ToolPayload, ToolFault> {
        match self {
            Self::RunCode => {
                let code = str_arg(arguments, "code")?;
                let result = ctx.sandbox.execute(code);
                tracing::debug!(
                    task_id = %ctx.state.task_id(),
                    changed = result.changed_bindings.len(),
                    failed = !result.is_success(),
                    "snippet executed"
                );
                ctx.state.merge_bindings(result.changed_bindings);
                Ok(ToolPayload::Execution {
                    stdout: result.stdout,
                    error: result.error,
                })
            }
            Self::SetPlan => {
                let text = str_arg(arguments, "text")?;
                ctx.state.set_plan(text);
                ctx.notifier.emit(NotificationKind::Plan, text);
                Ok(ToolPayload::Text("Plan updated.".into()))
            }
            Self::RecordFindings => {
                let text = str_arg(arguments, "text")?;
                ctx.state.set_findings(text);
                ctx.notifier.emit(NotificationKind::Findings, text);
                Ok(ToolPayload::Text("Findings recorded.".into()))
            }
            Self::Finish => {
                let result = arguments.get("result").cloned().unwrap_or(Value::Null);
                if ctx.state.mark_done(result) {
                    ctx.notifier.status("Final result recorded.");
                }
                let kept = ctx.state.final_result().cloned().unwrap_or(Value::Null);
                Ok(ToolPayload::from(kept))
            }
        }
    }
}

fn str_arg<'v>(arguments: &'v Value, name: &str) -> Result<&'v str, ToolFault> {
    arguments
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolFault::new("TypeError", format!("'{name}' must be a string")))
}
