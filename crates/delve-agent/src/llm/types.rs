//! Core types for model interaction.
//!
//! These types model the data flowing between the controller and a model
//! client.  They are vendor-agnostic; a concrete client translates them into
//! its own wire format.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// The role of a participant in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Input from the human user, and tool outcomes fed back to the model.
    User,
    /// Output from the model.
    Assistant,
}

/// One block of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text { text: String },

    /// A tool invocation requested by the model.
    ToolUse(ToolInvocation),

    /// The outcome of a previously requested invocation.
    ToolResult(ToolOutcome),
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Whether the block carries nothing worth sending to the model.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text { text } => text.is_empty(),
            Self::ToolUse(_) | Self::ToolResult(_) => false,
        }
    }
}

/// A single message in a conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who produced this message.
    pub role: Role,

    /// Ordered content blocks.
    pub content: Vec<ContentBlock>,
}

impl Message {
    /// Create a user message with a single text block.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::text(text)],
        }
    }

    /// Create an assistant message from its content blocks.
    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    /// Create a user message carrying one tool outcome.
    pub fn tool_outcome(outcome: ToolOutcome) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::ToolResult(outcome)],
        }
    }

    /// Concatenated text of every text block.
    pub fn content_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Tool invocations in emission order.
    pub fn tool_invocations(&self) -> impl Iterator<Item = &ToolInvocation> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::ToolUse(invocation) => Some(invocation),
            _ => None,
        })
    }

    /// Tool outcomes in emission order.
    pub fn tool_outcomes(&self) -> impl Iterator<Item = &ToolOutcome> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::ToolResult(outcome) => Some(outcome),
            _ => None,
        })
    }
}

// ---------------------------------------------------------------------------
// Tool calls
// ---------------------------------------------------------------------------

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Correlation key assigned by the model.
    pub id: String,

    /// The name of the tool to invoke.
    pub name: String,

    /// Named arguments as a JSON object.
    #[serde(default, alias = "input")]
    pub arguments: Value,
}

/// The result of executing a tool, ready to feed back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    /// The [`ToolInvocation::id`] this outcome answers.
    pub tool_use_id: String,

    /// Whether the invocation failed.
    #[serde(default)]
    pub is_error: bool,

    /// Serialized result content.
    pub content: String,
}

/// A tool definition exposed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Unique tool name.
    pub name: String,

    /// Human-readable description of what the tool does.
    pub description: String,

    /// JSON Schema describing the tool's input parameters.
    pub input_schema: Value,
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    StopSequence,
    ToolUse,
    MaxTokens,
}

/// The aggregated message produced at the end of a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalMessage {
    pub content: Vec<ContentBlock>,
    pub stop_reason: StopReason,
}

impl FinalMessage {
    pub fn has_tool_use(&self) -> bool {
        self.content
            .iter()
            .any(|block| matches!(block, ContentBlock::ToolUse(_)))
    }
}

/// A full request to send to a model client.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    /// The model identifier.
    pub model: String,

    /// System instructions.
    pub system: String,

    /// The conversation history.
    pub messages: Vec<Message>,

    /// Tools the model may invoke.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSpec>,

    /// Sampling temperature.
    pub temperature: f32,

    /// Maximum tokens the model may generate in this turn.
    pub max_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_blocks_are_tagged_by_type() {
        let block = ContentBlock::ToolUse(ToolInvocation {
            id: "call_1".into(),
            name: "run-code".into(),
            arguments: json!({"code": "x = 1"}),
        });
        let encoded = serde_json::to_value(&block).unwrap();
        assert_eq!(encoded["type"], "tool_use");
        assert_eq!(encoded["name"], "run-code");

        let text: ContentBlock = serde_json::from_value(json!({"type": "text", "text": "hi"})).unwrap();
        assert_eq!(text, ContentBlock::text("hi"));
    }

    #[test]
    fn tool_use_accepts_input_alias() {
        let block: ContentBlock = serde_json::from_value(json!({
            "type": "tool_use",
            "id": "a",
            "name": "finish",
            "input": {"result": "4"}
        }))
        .unwrap();
        let ContentBlock::ToolUse(invocation) = block else {
            panic!("expected tool_use");
        };
        assert_eq!(invocation.arguments["result"], "4");
    }

    #[test]
    fn message_helpers_split_blocks() {
        let message = Message::assistant(vec![
            ContentBlock::text("Let me "),
            ContentBlock::ToolUse(ToolInvocation {
                id: "1".into(),
                name: "set-plan".into(),
                arguments: json!({"text": "# Plan"}),
            }),
            ContentBlock::text("check."),
        ]);
        assert_eq!(message.content_text(), "Let me check.");
        assert_eq!(message.tool_invocations().count(), 1);
        assert_eq!(message.tool_outcomes().count(), 0);
    }

    #[test]
    fn stop_reason_is_snake_case() {
        assert_eq!(
            serde_json::to_string(&StopReason::StopSequence).unwrap(),
            "\"stop_sequence\""
        );
    }
}
