//! # agentgraph-core - Checkpointed Graph Execution with Human-in-the-Loop
//!
//! A graph execution engine for agent workflows: a fixed set of nodes
//! connected by static and conditional edges, a **checkpoint after every
//! node**, durable pauses before designated nodes for human approval, and
//! branching resumption from any historical checkpoint.
//!
//! ## Core Concepts
//!
//! ### 1. Graphs and the Scheduler
//!
//! Build a graph with [`GraphBuilder`]: async node handlers that return
//! partial state updates, edges that route between them (conditionally, if
//! needed), an entry node, and an `interrupt_before` set. Compiling
//! validates the structure and binds it to an explicit
//! [`CheckpointStore`](agentgraph_checkpoint::CheckpointStore) handle. The
//! resulting [`CompiledGraph`] steps threads one node at a time; loops like
//! agent↔tools are explicit edges, never recursion.
//!
//! ### 2. Checkpointing and Time Travel
//!
//! Every step appends an immutable checkpoint (state, pending nodes,
//! metadata) with a per-thread logical-clock id. `fork_from_checkpoint`
//! branches a new timeline off any historical checkpoint; nothing is ever
//! rewritten or deleted.
//!
//! ### 3. Human-in-the-Loop
//!
//! When routing reaches a guarded node, the thread parks in a durable
//! `Interrupted` status. `resume(approved=true)` executes the guarded node
//! (optionally with overridden tool arguments); `resume(approved=false)`
//! records a tool-role rejection message instead of running the node. The
//! guard re-fires on every pass through the edge, so a second tool request
//! in the same loop interrupts a second time.
//!
//! ### 4. Free-Text Tool Calls
//!
//! For models without native function calling,
//! [`extract_tool_call`](extract::extract_tool_call) normalizes a prompted
//! JSON convention out of raw model text so conditional edges can route on
//! it; "no tool call found" is a defined outcome, not an error.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use agentgraph_core::{
//!     extract_tool_call, route_on_tool_calls, serialize_messages, tool_node,
//!     GraphBuilder, Message, Reducer, RunOutcome, State, END,
//! };
//! use agentgraph_checkpoint::InMemoryCheckpointStore;
//! use std::sync::Arc;
//!
//! let mut builder = GraphBuilder::new();
//! builder.add_node("agent", |state: State| async move {
//!     // Call your LLM client here, then extract a possible tool request:
//!     let text = call_model(&state).await?;
//!     let message = match extract_tool_call(&text) {
//!         Some(call) => Message::ai("").with_tool_calls(vec![call]),
//!         None => Message::ai(text),
//!     };
//!     Ok(State::from([(
//!         "messages".to_string(),
//!         serialize_messages(&[message])?,
//!     )]))
//! });
//! builder.add_node("tools", tool_node(tools));
//! builder.set_entry("agent");
//! builder.add_conditional_edge("agent", route_on_tool_calls("tools"), ["tools", END]);
//! builder.add_edge("tools", "agent");
//! builder.interrupt_before(["tools"]);
//! builder.with_reducer("messages", Reducer::Append);
//!
//! let graph = builder.compile(Arc::new(InMemoryCheckpointStore::new()))?;
//! ```

pub mod error;
pub mod extract;
pub mod graph;
pub mod interrupt;
pub mod messages;
pub mod prebuilt;
pub mod scheduler;
pub mod state;

pub use error::{GraphError, Result};
pub use extract::extract_tool_call;
pub use graph::{Edge, EdgeRouter, GraphBuilder, NodeHandler, NodeId, END};
pub use interrupt::InterruptController;
pub use messages::{
    deserialize_messages, last_ai_tool_calls, last_message, serialize_messages, Message,
    MessageRole, ToolCall,
};
pub use prebuilt::{route_on_tool_calls, tool_node, ToolFn, ToolRegistry};
pub use scheduler::{CompiledGraph, RunOutcome, StepOutcome, ThreadSnapshot};
pub use state::{introspect, merge, FieldInfo, Reducer, State, StateSchema};

// Checkpoint layer re-exports so callers depend on one crate.
pub use agentgraph_checkpoint::{
    Checkpoint, CheckpointError, CheckpointId, CheckpointMetadata, CheckpointSource,
    CheckpointStore, InMemoryCheckpointStore, ThreadStatus,
};
