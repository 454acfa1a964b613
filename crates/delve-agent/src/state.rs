//! Conversation state for one task.
//!
//! [`ConversationState`] holds the append-only message history, the plan and
//! findings documents, the termination flag and the bindings carried over
//! from the sandbox.  It is owned by a single controller and never shared.

use std::collections::HashSet;

use delve_sandbox::Bindings;
use serde_json::Value;
use uuid::Uuid;

use crate::llm::types::{ContentBlock, Message, ToolOutcome};

/// Initial plan document.
pub const PLAN_TEMPLATE: &str = "\
# Plan

## Done
- [ ] Understand the task

## Next
- [ ] Choose a first approach

_Replace this document with `set-plan` as work progresses._
";

/// Initial findings document.
pub const FINDINGS_TEMPLATE: &str = "\
# Findings

## Summary
_Nothing recorded yet._

## Evidence
_Results, observations and data points go here._

## Confidence
_High, medium or low, with a reason._
";

/// Render a structured value the way it is stored in history: strings
/// verbatim, everything else as pretty-printed JSON with sorted keys.
pub fn canonical_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => {
            let sorted = sort_keys(other);
            serde_json::to_string_pretty(&sorted).unwrap_or_else(|_| sorted.to_string())
        }
    }
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, item)| (key.clone(), sort_keys(item)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Termination {
    is_done: bool,
    final_result: Option<Value>,
}

/// Per-task conversation state.
#[derive(Debug, Clone)]
pub struct ConversationState {
    task_id: Uuid,
    system_instructions: String,
    history: Vec<Message>,
    plan: String,
    findings: String,
    termination: Termination,
    bindings: Bindings,
}

impl ConversationState {
    /// Start a task: the task text becomes the first user message.
    pub fn new(task: impl Into<String>, system_instructions: impl Into<String>) -> Self {
        let mut state = Self {
            task_id: Uuid::now_v7(),
            system_instructions: system_instructions.into(),
            history: Vec::new(),
            plan: PLAN_TEMPLATE.to_owned(),
            findings: FINDINGS_TEMPLATE.to_owned(),
            termination: Termination::default(),
            bindings: Bindings::new(),
        };
        state.append_user(task);
        state
    }

    pub fn task_id(&self) -> Uuid {
        self.task_id
    }

    pub fn system_instructions(&self) -> &str {
        &self.system_instructions
    }

    // -- History -------------------------------------------------------------

    /// Messages in insertion order.
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn append_user(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text.is_empty() {
            tracing::warn!(task_id = %self.task_id, "ignoring empty user message");
            return;
        }
        self.history.push(Message::user(text));
    }

    pub fn append_assistant(&mut self, content: Vec<ContentBlock>) {
        if content.iter().all(ContentBlock::is_empty) {
            tracing::warn!(task_id = %self.task_id, "ignoring empty assistant message");
            return;
        }
        self.history.push(Message::assistant(content));
    }

    /// Append the outcome of invocation `tool_use_id` as its own user message.
    pub fn append_tool_outcome(&mut self, tool_use_id: impl Into<String>, payload: &Value, success: bool) {
        let tool_use_id = tool_use_id.into();
        if tool_use_id.is_empty() {
            tracing::warn!(task_id = %self.task_id, "ignoring tool outcome without correlation id");
            return;
        }
        self.history.push(Message::tool_outcome(ToolOutcome {
            tool_use_id,
            is_error: !success,
            content: canonical_text(payload),
        }));
    }

    /// Ids of tool invocations that have no outcome in history yet, in
    /// emission order.
    pub fn unresolved_invocations(&self) -> Vec<String> {
        let answered: HashSet<&str> = self
            .history
            .iter()
            .flat_map(Message::tool_outcomes)
            .map(|outcome| outcome.tool_use_id.as_str())
            .collect();

        self.history
            .iter()
            .flat_map(Message::tool_invocations)
            .filter(|invocation| !answered.contains(invocation.id.as_str()))
            .map(|invocation| invocation.id.clone())
            .collect()
    }

    // -- Documents -----------------------------------------------------------

    pub fn plan(&self) -> &str {
        &self.plan
    }

    pub fn set_plan(&mut self, plan: impl Into<String>) {
        self.plan = plan.into();
        tracing::info!(task_id = %self.task_id, "plan updated");
    }

    pub fn findings(&self) -> &str {
        &self.findings
    }

    pub fn set_findings(&mut self, findings: impl Into<String>) {
        self.findings = findings.into();
        tracing::info!(task_id = %self.task_id, "findings updated");
    }

    // -- Termination ---------------------------------------------------------

    pub fn is_done(&self) -> bool {
        self.termination.is_done
    }

    pub fn final_result(&self) -> Option<&Value> {
        self.termination.final_result.as_ref()
    }

    /// Mark the task finished.  Returns `false` if it already was; the first
    /// result is kept.
    pub fn mark_done(&mut self, result: Value) -> bool {
        if self.termination.is_done {
            tracing::warn!(task_id = %self.task_id, "task already finished, keeping first result");
            return false;
        }
        tracing::info!(task_id = %self.task_id, result = %canonical_text(&result), "task marked done");
        self.termination = Termination {
            is_done: true,
            final_result: Some(result),
        };
        true
    }

    // -- Bindings ------------------------------------------------------------

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub fn set_bindings(&mut self, bindings: Bindings) {
        self.bindings = bindings;
    }

    pub fn merge_bindings(&mut self, changed: Bindings) {
        self.bindings.extend(changed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::{Role, ToolInvocation};
    use delve_sandbox::Value as SandboxValue;
    use serde_json::json;

    fn state() -> ConversationState {
        ConversationState::new("Summarize the data", "be brief")
    }

    #[test]
    fn task_becomes_first_user_message() {
        let state = state();
        assert_eq!(state.history().len(), 1);
        assert_eq!(state.history()[0].role, Role::User);
        assert_eq!(state.history()[0].content_text(), "Summarize the data");
        assert_eq!(state.plan(), PLAN_TEMPLATE);
        assert_eq!(state.findings(), FINDINGS_TEMPLATE);
        assert_eq!(state.task_id().get_version_num(), 7);
    }

    #[test]
    fn empty_appends_are_ignored() {
        let mut state = state();
        state.append_user("");
        state.append_assistant(vec![]);
        state.append_assistant(vec![ContentBlock::text("")]);
        state.append_tool_outcome("", &json!("x"), true);
        assert_eq!(state.history().len(), 1);
    }

    #[test]
    fn structured_outcomes_are_canonical() {
        let mut state = state();
        state.append_tool_outcome("t1", &json!({"stdout": "1\n", "error": null}), true);
        let outcome = state.history()[1].tool_outcomes().next().cloned().unwrap();
        assert_eq!(outcome.content, "{\n  \"error\": null,\n  \"stdout\": \"1\\n\"\n}");
        assert!(!outcome.is_error);

        state.append_tool_outcome("t2", &json!("plain"), false);
        let outcome = state.history()[2].tool_outcomes().next().cloned().unwrap();
        assert_eq!(outcome.content, "plain");
        assert!(outcome.is_error);
    }

    #[test]
    fn unresolved_invocations_track_outcomes() {
        let mut state = state();
        state.append_assistant(vec![
            ContentBlock::ToolUse(ToolInvocation {
                id: "a".into(),
                name: "set-plan".into(),
                arguments: json!({"text": "p"}),
            }),
            ContentBlock::ToolUse(ToolInvocation {
                id: "b".into(),
                name: "finish".into(),
                arguments: json!({"result": "r"}),
            }),
        ]);
        assert_eq!(state.unresolved_invocations(), vec!["a", "b"]);

        state.append_tool_outcome("a", &json!("ok"), true);
        assert_eq!(state.unresolved_invocations(), vec!["b"]);
    }

    #[test]
    fn first_finish_wins() {
        let mut state = state();
        assert!(!state.is_done());
        assert!(state.mark_done(json!("42")));
        assert!(!state.mark_done(json!("43")));
        assert!(state.is_done());
        assert_eq!(state.final_result(), Some(&json!("42")));
    }

    #[test]
    fn bindings_merge_overwrites() {
        let mut state = state();
        state.set_bindings(Bindings::from([("x".to_string(), SandboxValue::Int(1))]));
        state.merge_bindings(Bindings::from([
            ("x".to_string(), SandboxValue::Int(2)),
            ("y".to_string(), SandboxValue::Bool(true)),
        ]));
        assert_eq!(state.bindings().len(), 2);
        assert_eq!(state.bindings().get("x"), Some(&SandboxValue::Int(2)));
    }

    #[test]
    fn documents_are_replaced_wholesale() {
        let mut state = state();
        state.set_plan("# New plan");
        state.set_findings("# Found it");
        assert_eq!(state.plan(), "# New plan");
        assert_eq!(state.findings(), "# Found it");
    }
}
