//! Conversation history — the shared, append-only message log.
//!
//! Every component of a team run reads and writes the same `ChatHistory`.
//! Insertion order is load-bearing: a step's directive must be visible to
//! the worker executing that step, so the engine never reorders or batches
//! appends. A history can be forked (value clone) for isolated sub-runs;
//! see [`crate::merge`] for reconciling the delta back.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// In-band marker legacy model output uses to request a re-plan.
pub const REPLAN_MARKER: &str = "~~~REPLAN";

/// Sentinel a human-proxy worker emits to pause a conversational run.
pub const PAUSE_SENTINEL: &str = "PAUSE";

/// Author role of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// Structured control signal carried by a message.
///
/// The engine only ever inspects this field; it never sniffs message
/// content for markers. Raw model output is translated into a signal once,
/// at ingestion, by [`Message::from_model_output`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlSignal {
    /// Abort the remaining steps of the current plan and re-plan.
    Replan,
    /// Pause the conversational loop and wait for external input.
    Pause,
}

/// A single immutable entry in the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: Role,
    /// Id of the worker (or team) that produced the message.
    pub sender: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control: Option<ControlSignal>,
}

impl Message {
    pub fn new(role: Role, sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role,
            sender: sender.into(),
            content: content.into(),
            metadata: HashMap::new(),
            control: None,
        }
    }

    pub fn system(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(Role::System, sender, content)
    }

    pub fn user(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(Role::User, sender, content)
    }

    pub fn assistant(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, sender, content)
    }

    pub fn with_control(mut self, control: ControlSignal) -> Self {
        self.control = Some(control);
        self
    }

    /// Build an assistant message from raw model output, translating the
    /// legacy in-band markers into a structured control signal.
    ///
    /// Model-backed workers have no way to set `control` directly, so the
    /// conventions from their prompts (`~~~REPLAN` anywhere in the text,
    /// or a bare `PAUSE` reply) are recognized here and nowhere else.
    pub fn from_model_output(sender: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let control = if content.contains(REPLAN_MARKER) {
            Some(ControlSignal::Replan)
        } else if content.trim() == PAUSE_SENTINEL {
            Some(ControlSignal::Pause)
        } else {
            None
        };
        Self {
            role: Role::Assistant,
            sender: sender.into(),
            content,
            metadata: HashMap::new(),
            control,
        }
    }
}

/// Ordered, append-only sequence of messages.
///
/// Exclusively owned by one run at a time; forking produces an independent
/// value copy, so parent and fork never share mutable state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatHistory {
    messages: Vec<Message>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Create an independent copy for an isolated sub-run.
    pub fn fork(&self) -> Self {
        self.clone()
    }
}

impl From<Vec<Message>> for ChatHistory {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_preserves_order() {
        let mut history = ChatHistory::new();
        history.push(Message::user("caller", "first"));
        history.push(Message::assistant("team", "second"));

        assert_eq!(history.len(), 2);
        assert_eq!(history.messages()[0].content, "first");
        assert_eq!(history.messages()[1].content, "second");
        assert_eq!(history.last().unwrap().sender, "team");
    }

    #[test]
    fn test_iter_walks_both_directions() {
        let mut history = ChatHistory::new();
        history.push(Message::user("caller", "first"));
        history.push(Message::assistant("team", "second"));
        history.push(Message::assistant("worker", "third"));

        // Election strategies scan the log newest-first.
        let newest_two: Vec<&str> = history
            .iter()
            .rev()
            .take(2)
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(newest_two, vec!["third", "second"]);
    }

    #[test]
    fn test_fork_is_independent() {
        let mut parent = ChatHistory::new();
        parent.push(Message::user("caller", "hello"));

        let mut fork = parent.fork();
        fork.push(Message::assistant("worker", "reply"));

        assert_eq!(parent.len(), 1);
        assert_eq!(fork.len(), 2);
    }

    #[test]
    fn test_from_model_output_detects_replan() {
        let msg = Message::from_model_output("checker", "stock mismatch ~~~REPLAN");
        assert_eq!(msg.control, Some(ControlSignal::Replan));
    }

    #[test]
    fn test_from_model_output_detects_pause() {
        let msg = Message::from_model_output("user_proxy", "PAUSE");
        assert_eq!(msg.control, Some(ControlSignal::Pause));

        // The sentinel must be the whole reply, not a substring.
        let msg = Message::from_model_output("worker", "press PAUSE to stop");
        assert_eq!(msg.control, None);
    }

    #[test]
    fn test_message_serde_round_trip() {
        let msg = Message::assistant("team", "do the thing").with_control(ControlSignal::Replan);
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"control\":\"replan\""));
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
