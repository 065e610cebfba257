//! Canonical message and tool-call model for conversation state.
//!
//! A [`Message`] is one turn in a thread's conversation. Tool invocations are
//! modeled as first-class data: an ai message carries an
//! always-present-but-possibly-empty `tool_calls` list (never a dynamically
//! attached attribute), and a tool message answers one of those calls via
//! `tool_call_id`.
//!
//! The serde form is the canonical wire/storage format; round-tripping
//! through [`serialize_messages`]/[`deserialize_messages`] is lossless,
//! including `tool_calls` and `tool_call_id`.
//!
//! # Examples
//!
//! ```rust
//! use agentgraph_core::messages::{Message, MessageRole, ToolCall};
//! use serde_json::json;
//!
//! let ai = Message::ai("").with_tool_calls(vec![ToolCall {
//!     id: "call_1".to_string(),
//!     name: "calculator".to_string(),
//!     args: json!({"expression": "2+2"}),
//! }]);
//! let answer = Message::tool("Result: 4", "call_1");
//!
//! assert_eq!(ai.role, MessageRole::Ai);
//! assert_eq!(answer.tool_call_id.as_deref(), Some("call_1"));
//! ```

use crate::error::{GraphError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message from the human user
    Human,
    /// Message produced by the model
    Ai,
    /// Result of a tool execution, answering a specific tool call
    Tool,
    /// System instruction
    System,
}

/// A structured tool invocation request extracted from model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique within the ai message that emitted it
    pub id: String,

    /// Tool name to invoke
    pub name: String,

    /// Tool arguments as a JSON object; key order is irrelevant
    pub args: Value,
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who produced this message
    pub role: MessageRole,

    /// Text content; empty on ai messages that only request tools
    pub content: String,

    /// Tool invocations requested by this message; only meaningful on ai
    /// messages, empty otherwise
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Id of the [`ToolCall`] this message answers; only meaningful on tool
    /// messages, and must reference a call emitted by a preceding ai message
    /// in the same thread
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// Create a message with the given role and content.
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create a human message.
    pub fn human(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Human, content)
    }

    /// Create an ai message.
    pub fn ai(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Ai, content)
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Create a tool-result message answering `tool_call_id`.
    pub fn tool(content: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        let mut message = Self::new(MessageRole::Tool, content);
        message.tool_call_id = Some(tool_call_id.into());
        message
    }

    /// Attach tool calls to this message.
    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    /// True when this message requests at least one tool invocation.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Serialize messages into their canonical JSON array form.
pub fn serialize_messages(messages: &[Message]) -> Result<Value> {
    serde_json::to_value(messages).map_err(|e| GraphError::Serialization(e.to_string()))
}

/// Deserialize messages from their canonical JSON array form.
///
/// The exact inverse of [`serialize_messages`]; any structural mismatch is a
/// [`GraphError::Serialization`].
pub fn deserialize_messages(value: &Value) -> Result<Vec<Message>> {
    serde_json::from_value(value.clone()).map_err(|e| GraphError::Serialization(e.to_string()))
}

/// The most recent message, if any.
pub fn last_message(messages: &[Message]) -> Option<&Message> {
    messages.last()
}

/// The tool calls of the most recent ai message that carries any.
///
/// This is the call set a pending interrupt refers to: the guarded tools
/// node will execute exactly these calls when approved.
pub fn last_ai_tool_calls(messages: &[Message]) -> Option<&[ToolCall]> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == MessageRole::Ai && m.has_tool_calls())
        .map(|m| m.tool_calls.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_conversation() -> Vec<Message> {
        vec![
            Message::system("You are a helpful assistant."),
            Message::human("What is 2+2?"),
            Message::ai("").with_tool_calls(vec![ToolCall {
                id: "call_abc".to_string(),
                name: "calculator".to_string(),
                args: json!({"expression": "2+2"}),
            }]),
            Message::tool("Result: 4", "call_abc"),
            Message::ai("The answer is 4."),
        ]
    }

    #[test]
    fn round_trip_is_exact() {
        let messages = sample_conversation();
        let encoded = serialize_messages(&messages).unwrap();
        let decoded = deserialize_messages(&encoded).unwrap();
        assert_eq!(decoded, messages);
    }

    #[test]
    fn round_trip_preserves_tool_linkage() {
        let messages = sample_conversation();
        let decoded = deserialize_messages(&serialize_messages(&messages).unwrap()).unwrap();

        let calls = last_ai_tool_calls(&decoded).unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "calculator");
        assert_eq!(calls[0].args, json!({"expression": "2+2"}));

        let tool_msg = decoded.iter().find(|m| m.role == MessageRole::Tool).unwrap();
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some(calls[0].id.as_str()));
    }

    #[test]
    fn last_ai_tool_calls_skips_plain_ai_messages() {
        let messages = sample_conversation();
        // The final ai message has no calls; the lookup must reach back to
        // the one that does.
        let calls = last_ai_tool_calls(&messages).unwrap();
        assert_eq!(calls[0].id, "call_abc");

        let plain = vec![Message::human("hi"), Message::ai("hello")];
        assert!(last_ai_tool_calls(&plain).is_none());
    }

    #[test]
    fn deserialize_rejects_malformed_shapes() {
        let err = deserialize_messages(&json!([{"role": "ai"}])).unwrap_err();
        assert!(matches!(err, GraphError::Serialization(_)));

        let err = deserialize_messages(&json!({"not": "an array"})).unwrap_err();
        assert!(matches!(err, GraphError::Serialization(_)));
    }

    #[test]
    fn empty_tool_calls_are_omitted_from_wire_form() {
        let encoded = serialize_messages(&[Message::human("hi")]).unwrap();
        assert_eq!(encoded, json!([{"role": "human", "content": "hi"}]));
    }
}
