//! Human-in-the-loop approval guarding designated nodes.
//!
//! The per-thread approval protocol is a small state machine:
//!
//! ```text
//! RUNNING ──(routing reaches a guarded node)──▶ INTERRUPTED(node)
//! INTERRUPTED(node) ──resume(approved=true)───▶ RUNNING  (guarded node executes)
//! INTERRUPTED(node) ──resume(approved=false)──▶ RUNNING  (rejection message, handler skipped)
//! ```
//!
//! The `INTERRUPTED` state is durable: it lives in checkpoint metadata, so
//! a thread can sit interrupted indefinitely across process restarts. At
//! most one interrupt is pending per thread at a time.
//!
//! The guard is consulted by the scheduler on **every** pass through an
//! edge, not only the first time a loop is entered. An agent↔tools loop that
//! requests a second tool after the first approval must therefore interrupt
//! a second time; failing to re-check here is exactly the "second approval
//! never fires" defect.

use crate::error::Result;
use crate::graph::NodeId;
use crate::messages::{last_ai_tool_calls, serialize_messages, Message};
use crate::state::State;
use std::collections::HashSet;

/// Approve/reject guard over the graph's `interrupt_before` node set.
#[derive(Debug, Clone)]
pub struct InterruptController {
    guarded: HashSet<NodeId>,
}

impl InterruptController {
    /// Create a controller guarding the given nodes.
    pub fn new(guarded: HashSet<NodeId>) -> Self {
        Self { guarded }
    }

    /// Whether execution must pause before `node`.
    pub fn guards(&self, node: &str) -> bool {
        self.guarded.contains(node)
    }

    /// The guarded node ids.
    pub fn guarded_nodes(&self) -> &HashSet<NodeId> {
        &self.guarded
    }

    /// Build the partial update for a rejected interrupt.
    ///
    /// Instead of invoking the guarded node's real handler, rejection
    /// synthesizes a tool-role message whose `tool_call_id` references the
    /// pending call, so the conversation records that the call was refused
    /// and routing can continue normally from there.
    pub fn rejection_update(&self, state: &State) -> Result<State> {
        let messages = match state.get("messages") {
            Some(value) => crate::messages::deserialize_messages(value)?,
            None => Vec::new(),
        };

        let rejection = match last_ai_tool_calls(&messages).and_then(|calls| calls.first()) {
            Some(call) => Message::tool(
                format!(
                    "Tool call '{}' was rejected by the user and was not executed",
                    call.name
                ),
                call.id.clone(),
            ),
            None => Message::tool("Tool execution rejected by the user", ""),
        };

        let mut partial = State::new();
        partial.insert("messages".to_string(), serialize_messages(&[rejection])?);
        Ok(partial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{deserialize_messages, MessageRole, ToolCall};
    use serde_json::json;

    fn controller() -> InterruptController {
        InterruptController::new(HashSet::from(["tools".to_string()]))
    }

    #[test]
    fn guards_only_designated_nodes() {
        let controller = controller();
        assert!(controller.guards("tools"));
        assert!(!controller.guards("agent"));
    }

    #[test]
    fn rejection_references_the_pending_call() {
        let messages = vec![
            Message::human("search for hotels"),
            Message::ai("").with_tool_calls(vec![ToolCall {
                id: "call_7".to_string(),
                name: "tavily_search_results_json".to_string(),
                args: json!({"query": "hotels in Paris"}),
            }]),
        ];
        let mut state = State::new();
        state.insert(
            "messages".to_string(),
            serialize_messages(&messages).unwrap(),
        );

        let partial = controller().rejection_update(&state).unwrap();
        let synthesized = deserialize_messages(&partial["messages"]).unwrap();
        assert_eq!(synthesized.len(), 1);
        assert_eq!(synthesized[0].role, MessageRole::Tool);
        assert_eq!(synthesized[0].tool_call_id.as_deref(), Some("call_7"));
        assert!(synthesized[0].content.contains("rejected"));
    }

    #[test]
    fn rejection_without_a_pending_call_still_produces_a_message() {
        let partial = controller().rejection_update(&State::new()).unwrap();
        let synthesized = deserialize_messages(&partial["messages"]).unwrap();
        assert_eq!(synthesized[0].role, MessageRole::Tool);
    }
}
