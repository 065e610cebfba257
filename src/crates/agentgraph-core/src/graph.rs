//! Graph definition, builder and compile-time validation.
//!
//! A graph is a fixed set of named nodes connected by static and conditional
//! edges. Nodes are async handlers that receive the full state and return a
//! **partial** update; edges decide which node runs next, either
//! unconditionally ([`Edge::Direct`]) or by evaluating a router function
//! against the post-merge state ([`Edge::Conditional`]).
//!
//! Cycles are expected (the canonical agent↔tools loop is one) and are
//! modeled as explicit node-id position plus edge lookup, never language
//! recursion, so loop depth never grows a call stack and the interrupt guard
//! is re-evaluated identically on every pass.
//!
//! [`GraphBuilder::compile`] validates the structure (every edge target,
//! branch, guarded node and the entry must name a declared node or [`END`])
//! and binds the graph to an explicit [`CheckpointStore`] handle; there is no
//! ambient global store.
//!
//! # Examples
//!
//! ```rust,ignore
//! use agentgraph_core::{GraphBuilder, Reducer, END};
//! use agentgraph_checkpoint::InMemoryCheckpointStore;
//! use serde_json::json;
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! let mut builder = GraphBuilder::new();
//! builder.add_node("agent", |state| async move {
//!     Ok(HashMap::from([("messages".to_string(), json!([]))]))
//! });
//! builder.add_node("tools", |state| async move { Ok(HashMap::new()) });
//! builder.set_entry("agent");
//! builder.add_conditional_edge(
//!     "agent",
//!     |state| "tools".to_string(),
//!     ["tools", END],
//! );
//! builder.add_edge("tools", "agent");
//! builder.interrupt_before(["tools"]);
//! builder.with_reducer("messages", Reducer::Append);
//!
//! let graph = builder.compile(Arc::new(InMemoryCheckpointStore::new()))?;
//! # Ok::<(), agentgraph_core::GraphError>(())
//! ```

use crate::error::{GraphError, Result};
use crate::interrupt::InterruptController;
use crate::scheduler::CompiledGraph;
use crate::state::{Reducer, State, StateSchema};
use agentgraph_checkpoint::CheckpointStore;
use futures::future::BoxFuture;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

/// Node identifier: a unique name within a graph.
pub type NodeId = String;

/// Terminal sentinel: routing to `END` completes the thread.
pub const END: &str = "__end__";

/// Boxed async node handler: full state in, partial update out.
pub type NodeHandler = Arc<
    dyn Fn(State) -> BoxFuture<'static, std::result::Result<State, Box<dyn std::error::Error + Send + Sync>>>
        + Send
        + Sync,
>;

/// Routing function for a conditional edge.
///
/// Receives the state *after* the source node's update was merged and
/// returns the next node id or [`END`]. May call
/// [`extract_tool_call`](crate::extract::extract_tool_call) internally to
/// route on unstructured model output.
pub type EdgeRouter = Arc<dyn Fn(&State) -> NodeId + Send + Sync>;

/// Transition out of a node.
#[derive(Clone)]
pub enum Edge {
    /// Unconditional transition to a node (or [`END`])
    Direct(NodeId),

    /// Dynamic routing via a router function
    Conditional {
        /// Router evaluated against the post-merge state
        router: EdgeRouter,
        /// All node ids the router may return, declared for validation
        branches: Vec<NodeId>,
    },
}

impl std::fmt::Debug for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Edge::Direct(to) => f.debug_tuple("Direct").field(to).finish(),
            Edge::Conditional { branches, .. } => f
                .debug_struct("Conditional")
                .field("router", &"<function>")
                .field("branches", branches)
                .finish(),
        }
    }
}

/// Mutable graph specification, turned executable by [`compile`](Self::compile).
#[derive(Default)]
pub struct GraphBuilder {
    pub(crate) nodes: HashMap<NodeId, NodeHandler>,
    pub(crate) edges: HashMap<NodeId, Edge>,
    pub(crate) entry: Option<NodeId>,
    pub(crate) guarded: HashSet<NodeId>,
    pub(crate) schema: StateSchema,
}

impl GraphBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with its async handler.
    ///
    /// The handler receives the current state and returns a partial update;
    /// any error it raises is wrapped as
    /// [`GraphError::NodeExecution`](crate::GraphError::NodeExecution) and
    /// moves the thread to `Failed` with no partial commit.
    pub fn add_node<F, Fut>(&mut self, id: impl Into<NodeId>, handler: F) -> &mut Self
    where
        F: Fn(State) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<State, Box<dyn std::error::Error + Send + Sync>>>
            + Send
            + 'static,
    {
        self.nodes.insert(
            id.into(),
            Arc::new(move |state| Box::pin(handler(state))),
        );
        self
    }

    /// Add a static edge `from -> to`.
    pub fn add_edge(&mut self, from: impl Into<NodeId>, to: impl Into<NodeId>) -> &mut Self {
        self.edges.insert(from.into(), Edge::Direct(to.into()));
        self
    }

    /// Add a conditional edge out of `from`.
    ///
    /// `branches` must list every node id the router may return (plus
    /// [`END`] if it may terminate); compilation validates them.
    pub fn add_conditional_edge<R, I, S>(
        &mut self,
        from: impl Into<NodeId>,
        router: R,
        branches: I,
    ) -> &mut Self
    where
        R: Fn(&State) -> NodeId + Send + Sync + 'static,
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        self.edges.insert(
            from.into(),
            Edge::Conditional {
                router: Arc::new(router),
                branches: branches.into_iter().map(Into::into).collect(),
            },
        );
        self
    }

    /// Set the entry node where new threads begin.
    pub fn set_entry(&mut self, node: impl Into<NodeId>) -> &mut Self {
        self.entry = Some(node.into());
        self
    }

    /// Pause for external approval before executing any of `nodes`.
    pub fn interrupt_before<I, S>(&mut self, nodes: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        self.guarded.extend(nodes.into_iter().map(Into::into));
        self
    }

    /// Declare the merge reducer for a state field.
    ///
    /// Fixed here, at compile time; fields without a declaration use
    /// [`Reducer::Replace`].
    pub fn with_reducer(&mut self, field: impl Into<String>, reducer: Reducer) -> &mut Self {
        self.schema = std::mem::take(&mut self.schema).with_reducer(field, reducer);
        self
    }

    /// Validate the specification and bind it to a checkpoint store.
    ///
    /// Fails with [`GraphError::Validation`] when the entry is missing, or
    /// when any edge target, conditional branch or guarded node does not
    /// name a declared node (or [`END`], where a node id is not required).
    pub fn compile(self, store: Arc<dyn CheckpointStore>) -> Result<CompiledGraph> {
        let entry = self
            .entry
            .clone()
            .ok_or_else(|| GraphError::Validation("entry point is not set".to_string()))?;
        if !self.nodes.contains_key(&entry) {
            return Err(GraphError::Validation(format!(
                "entry point '{entry}' is not a declared node"
            )));
        }

        for (from, edge) in &self.edges {
            if !self.nodes.contains_key(from) {
                return Err(GraphError::Validation(format!(
                    "edge source '{from}' is not a declared node"
                )));
            }
            match edge {
                Edge::Direct(to) => {
                    if to != END && !self.nodes.contains_key(to) {
                        return Err(GraphError::Validation(format!(
                            "edge target '{to}' is not a declared node"
                        )));
                    }
                }
                Edge::Conditional { branches, .. } => {
                    for to in branches {
                        if to != END && !self.nodes.contains_key(to) {
                            return Err(GraphError::Validation(format!(
                                "branch target '{to}' is not a declared node"
                            )));
                        }
                    }
                }
            }
        }

        for node in &self.guarded {
            if !self.nodes.contains_key(node) {
                return Err(GraphError::Validation(format!(
                    "interrupt_before names unknown node '{node}'"
                )));
            }
        }

        let interrupts = InterruptController::new(self.guarded.clone());
        Ok(CompiledGraph::new(self, entry, interrupts, store))
    }
}

impl std::fmt::Debug for GraphBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphBuilder")
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("edges", &self.edges)
            .field("entry", &self.entry)
            .field("guarded", &self.guarded)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentgraph_checkpoint::InMemoryCheckpointStore;

    fn noop_builder() -> GraphBuilder {
        let mut builder = GraphBuilder::new();
        builder.add_node("a", |_state| async move { Ok(State::new()) });
        builder.add_node("b", |_state| async move { Ok(State::new()) });
        builder
    }

    fn store() -> Arc<dyn CheckpointStore> {
        Arc::new(InMemoryCheckpointStore::new())
    }

    #[test]
    fn valid_graph_compiles() {
        let mut builder = noop_builder();
        builder.set_entry("a");
        builder.add_edge("a", "b");
        builder.add_edge("b", END);
        assert!(builder.compile(store()).is_ok());
    }

    #[test]
    fn missing_entry_fails() {
        let builder = noop_builder();
        let err = builder.compile(store()).unwrap_err();
        assert!(matches!(err, GraphError::Validation(_)));
    }

    #[test]
    fn unknown_entry_fails() {
        let mut builder = noop_builder();
        builder.set_entry("missing");
        assert!(matches!(
            builder.compile(store()),
            Err(GraphError::Validation(_))
        ));
    }

    #[test]
    fn unknown_edge_target_fails() {
        let mut builder = noop_builder();
        builder.set_entry("a");
        builder.add_edge("a", "missing");
        let err = builder.compile(store()).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn unknown_branch_target_fails() {
        let mut builder = noop_builder();
        builder.set_entry("a");
        builder.add_conditional_edge("a", |_state| "b".to_string(), ["b", "missing"]);
        assert!(matches!(
            builder.compile(store()),
            Err(GraphError::Validation(_))
        ));
    }

    #[test]
    fn unknown_guarded_node_fails() {
        let mut builder = noop_builder();
        builder.set_entry("a");
        builder.add_edge("a", END);
        builder.interrupt_before(["missing"]);
        assert!(matches!(
            builder.compile(store()),
            Err(GraphError::Validation(_))
        ));
    }

    #[test]
    fn end_is_always_a_valid_target() {
        let mut builder = noop_builder();
        builder.set_entry("a");
        builder.add_conditional_edge("a", |_state| END.to_string(), ["b", END]);
        builder.add_edge("b", END);
        assert!(builder.compile(store()).is_ok());
    }
}
