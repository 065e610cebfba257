//! Prebuilt node handlers and routers for the agent↔tools pattern.
//!
//! The canonical graph this engine runs is:
//!
//! ```text
//! agent ──(tool call in last message?)──▶ tools ──▶ agent
//!    └──(no tool call)──▶ END
//! ```
//!
//! [`tool_node`] provides the `tools` handler: it executes the last ai
//! message's tool calls against a [`ToolRegistry`] of injected callables and
//! answers each with a tool-role message. [`route_on_tool_calls`] provides
//! the conditional router. The agent node itself stays caller-supplied: it
//! wraps whatever LLM client the application uses; the core performs no
//! network I/O.
//!
//! Tool failures are conversation data, not engine errors: an unknown tool
//! or a failing tool produces a tool-role message describing the problem, so
//! the model can react to it on the next loop pass.

use crate::graph::{NodeId, END};
use crate::messages::{
    deserialize_messages, last_message, serialize_messages, Message,
};
use crate::state::State;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Injected async tool callable: JSON args in, rendered output out.
pub type ToolFn = Arc<
    dyn Fn(
            serde_json::Value,
        ) -> BoxFuture<
            'static,
            std::result::Result<String, Box<dyn std::error::Error + Send + Sync>>,
        > + Send
        + Sync,
>;

/// Named registry of injected tool callables.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolFn>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under `name`.
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, tool: F) -> &mut Self
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<String, Box<dyn std::error::Error + Send + Sync>>>
            + Send
            + 'static,
    {
        self.tools
            .insert(name.into(), Arc::new(move |args| Box::pin(tool(args))));
        self
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&ToolFn> {
        self.tools.get(name)
    }

    /// Registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

/// Build a node handler that executes the last ai message's tool calls.
///
/// For each call, in order: a registered tool produces a tool-role message
/// with its output; an unknown tool or a tool error produces a tool-role
/// message describing the failure. Every result message answers its call
/// via `tool_call_id`. The partial update is `{"messages": [results…]}`,
/// which composes with the `messages` append reducer.
pub fn tool_node(
    registry: Arc<ToolRegistry>,
) -> impl Fn(
    State,
) -> BoxFuture<
    'static,
    std::result::Result<State, Box<dyn std::error::Error + Send + Sync>>,
> + Send
       + Sync
       + 'static {
    move |state: State| {
        let registry = registry.clone();
        Box::pin(async move {
            let messages = match state.get("messages") {
                Some(value) => deserialize_messages(value)?,
                None => Vec::new(),
            };

            let mut results = Vec::new();
            if let Some(message) = last_message(&messages) {
                for call in &message.tool_calls {
                    let content = match registry.get(&call.name) {
                        Some(tool) => match tool(call.args.clone()).await {
                            Ok(output) => output,
                            Err(err) => format!("Error executing tool: {err}"),
                        },
                        None => format!("Tool '{}' not found", call.name),
                    };
                    tracing::debug!(tool = %call.name, call_id = %call.id, "tool executed");
                    results.push(Message::tool(content, call.id.clone()));
                }
            }

            let mut partial = State::new();
            partial.insert("messages".to_string(), serialize_messages(&results)?);
            Ok(partial)
        })
    }
}

/// Router for the agent's conditional edge: `tools_node` when the last
/// message carries tool calls, [`END`] otherwise.
pub fn route_on_tool_calls(
    tools_node: impl Into<NodeId>,
) -> impl Fn(&State) -> NodeId + Send + Sync + 'static {
    let tools_node = tools_node.into();
    move |state: &State| {
        let wants_tools = state
            .get("messages")
            .and_then(|value| deserialize_messages(value).ok())
            .and_then(|messages| last_message(&messages).map(Message::has_tool_calls))
            .unwrap_or(false);
        if wants_tools {
            tools_node.clone()
        } else {
            END.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::ToolCall;
    use serde_json::json;

    fn registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register("calculator", |args: serde_json::Value| async move {
            let expression = args["expression"].as_str().unwrap_or_default().to_string();
            if expression == "2+2" {
                Ok("Result: 4".to_string())
            } else {
                Err(format!("cannot evaluate '{expression}'").into())
            }
        });
        Arc::new(registry)
    }

    fn state_with_calls(calls: Vec<ToolCall>) -> State {
        let messages = vec![Message::ai("").with_tool_calls(calls)];
        State::from([(
            "messages".to_string(),
            serialize_messages(&messages).unwrap(),
        )])
    }

    #[tokio::test]
    async fn executes_registered_tool() {
        let handler = tool_node(registry());
        let state = state_with_calls(vec![ToolCall {
            id: "call_1".to_string(),
            name: "calculator".to_string(),
            args: json!({"expression": "2+2"}),
        }]);

        let partial = handler(state).await.unwrap();
        let results = deserialize_messages(&partial["messages"]).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "Result: 4");
        assert_eq!(results[0].tool_call_id.as_deref(), Some("call_1"));
    }

    #[tokio::test]
    async fn tool_errors_become_tool_messages() {
        let handler = tool_node(registry());
        let state = state_with_calls(vec![ToolCall {
            id: "call_2".to_string(),
            name: "calculator".to_string(),
            args: json!({"expression": "sqrt(-1)"}),
        }]);

        let partial = handler(state).await.unwrap();
        let results = deserialize_messages(&partial["messages"]).unwrap();
        assert!(results[0].content.starts_with("Error executing tool:"));
    }

    #[tokio::test]
    async fn unknown_tool_becomes_tool_message() {
        let handler = tool_node(registry());
        let state = state_with_calls(vec![ToolCall {
            id: "call_3".to_string(),
            name: "teleport".to_string(),
            args: json!({}),
        }]);

        let partial = handler(state).await.unwrap();
        let results = deserialize_messages(&partial["messages"]).unwrap();
        assert_eq!(results[0].content, "Tool 'teleport' not found");
    }

    #[test]
    fn router_picks_tools_only_when_calls_pending() {
        let router = route_on_tool_calls("tools");

        let with_calls = state_with_calls(vec![ToolCall {
            id: "call_4".to_string(),
            name: "calculator".to_string(),
            args: json!({}),
        }]);
        assert_eq!(router(&with_calls), "tools");

        let plain = State::from([(
            "messages".to_string(),
            serialize_messages(&[Message::ai("all done")]).unwrap(),
        )]);
        assert_eq!(router(&plain), END);

        assert_eq!(router(&State::new()), END);
    }
}
