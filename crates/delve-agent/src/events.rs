//! Notification stream.
//!
//! The controller reports progress to its host as an ordered sequence of
//! `{type, content}` events over an unbounded channel.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

/// The kind of a [`Notification`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Status,
    Chunk,
    ToolCall,
    ToolResult,
    Plan,
    Findings,
    Warning,
    Error,
    Done,
}

/// One event sent to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub content: Value,
}

impl Notification {
    pub fn new(kind: NotificationKind, content: impl Into<Value>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }

    /// The content as text, without JSON quoting for plain strings.
    pub fn content_text(&self) -> String {
        match &self.content {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

/// Sending half of the notification stream.
///
/// Emitting never fails: if the host has dropped its receiver the event is
/// discarded.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    /// Create a notifier and the receiver the host reads from.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, kind: NotificationKind, content: impl Into<Value>) {
        if self.tx.send(Notification::new(kind, content)).is_err() {
            tracing::trace!(?kind, "notification receiver closed, event dropped");
        }
    }

    pub fn status(&self, text: impl Into<String>) {
        self.emit(NotificationKind::Status, text.into());
    }

    pub fn warning(&self, text: impl Into<String>) {
        self.emit(NotificationKind::Warning, text.into());
    }

    pub fn error(&self, text: impl Into<String>) {
        self.emit(NotificationKind::Error, text.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn notifications_serialize_with_type_field() {
        let event = Notification::new(NotificationKind::ToolResult, json!({"tool": "finish"}));
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "tool_result", "content": {"tool": "finish"}})
        );
    }

    #[test]
    fn events_arrive_in_order() {
        let (notifier, mut rx) = Notifier::channel();
        notifier.status("one");
        notifier.emit(NotificationKind::Chunk, "two");
        notifier.warning("three");

        let kinds: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|n| (n.kind, n.content_text()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (NotificationKind::Status, "one".to_string()),
                (NotificationKind::Chunk, "two".to_string()),
                (NotificationKind::Warning, "three".to_string()),
            ]
        );
    }

    #[test]
    fn emitting_after_receiver_drop_is_harmless() {
        let (notifier, rx) = Notifier::channel();
        drop(rx);
        notifier.error("nobody listening");
    }
}
