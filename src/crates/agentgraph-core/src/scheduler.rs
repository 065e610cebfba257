//! The checkpointed stepper: one node at a time, one checkpoint per step.
//!
//! [`CompiledGraph`] executes a validated graph against a
//! [`CheckpointStore`]. Every operation follows the same read-modify-append
//! shape:
//!
//! 1. load the thread's latest checkpoint,
//! 2. invoke the pending node's handler with the checkpoint's state,
//! 3. merge the handler's partial update through the per-field reducers,
//! 4. evaluate the executed node's edge against the **new** state,
//! 5. append a new checkpoint carrying the routed `next` node.
//!
//! If the routed node is interrupt-guarded, the checkpoint is saved with a
//! durable `Interrupted` status instead and the guarded node does not run
//! until [`resume`](CompiledGraph::resume) approves it. The guard is applied
//! after *every* routing decision, including the one made while resuming,
//! so a loop that re-enters the guarded edge interrupts again.
//!
//! # Concurrency
//!
//! Steps on one thread are serialized by a per-thread async mutex held
//! across the whole read-modify-append; concurrent steps would race on
//! parent selection and break the strictly-increasing checkpoint-id
//! invariant. Different threads share nothing but the store and run freely
//! in parallel. A handler invocation is atomic from the engine's point of
//! view: it either completes and its update is committed, or it fails and
//! the thread moves to a durable `Failed` status with **no partial commit**.
//! There is no mid-handler cancellation; the only cancellation point is
//! between steps.

use crate::error::{GraphError, Result};
use crate::graph::{Edge, GraphBuilder, NodeHandler, NodeId, END};
use crate::interrupt::InterruptController;
use crate::messages::{deserialize_messages, serialize_messages, MessageRole};
use crate::state::{introspect, merge, FieldInfo, State, StateSchema};
use agentgraph_checkpoint::{
    Checkpoint, CheckpointId, CheckpointMetadata, CheckpointSource, CheckpointStore, ThreadStatus,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Result of a single [`step`](CompiledGraph::step).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// A node executed and the thread has more work pending
    Ran {
        /// The node that executed
        node: NodeId,
        /// The node(s) pending next
        next: Vec<NodeId>,
    },
    /// Execution paused before a guarded node, awaiting approve/reject
    Interrupted {
        /// The guarded node awaiting approval
        node: NodeId,
    },
    /// A node executed and routing reached the terminal sentinel
    Complete {
        /// The final node that executed
        node: NodeId,
    },
}

/// Result of [`run_to_completion`](CompiledGraph::run_to_completion).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The thread reached terminal state
    Complete,
    /// The loop stopped at a pending interrupt
    Interrupted {
        /// The guarded node awaiting approval
        node: NodeId,
    },
}

/// Caller-facing view of one checkpoint of a thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadSnapshot {
    /// Owning thread
    pub thread_id: String,
    /// Checkpoint this snapshot was taken from
    pub checkpoint_id: CheckpointId,
    /// Parent checkpoint, `None` for the root
    pub parent_checkpoint_id: Option<CheckpointId>,
    /// State field values
    pub values: State,
    /// Pending node ids; empty means terminal
    pub next: Vec<NodeId>,
    /// Durable thread status as of this checkpoint
    pub status: ThreadStatus,
    /// Step counter
    pub step: i64,
    /// Guarded node awaiting approval, if interrupted here
    pub pending_interrupt: Option<NodeId>,
}

impl ThreadSnapshot {
    fn from_checkpoint(thread_id: &str, checkpoint: Checkpoint) -> Self {
        Self {
            thread_id: thread_id.to_string(),
            checkpoint_id: checkpoint.id,
            parent_checkpoint_id: checkpoint.parent_id,
            values: checkpoint.state,
            next: checkpoint.next,
            status: checkpoint.metadata.status,
            step: checkpoint.metadata.step,
            pending_interrupt: checkpoint.metadata.pending_interrupt,
        }
    }

    /// Compact single-checkpoint display: long strings truncated, lists and
    /// mappings collapsed to their sizes.
    pub fn summary(&self) -> String {
        const TRUNCATE_AT: usize = 80;

        let mut lines = vec![
            format!("Checkpoint: {}", self.checkpoint_id),
            format!(
                "Next: {}",
                if self.next.is_empty() {
                    "END".to_string()
                } else {
                    self.next.join(", ")
                }
            ),
            format!("Status: {:?} (step {})", self.status, self.step),
            "State Values:".to_string(),
        ];

        let mut keys: Vec<&String> = self.values.keys().collect();
        keys.sort();
        for key in keys {
            let display = match &self.values[key] {
                Value::String(s) if s.chars().count() > TRUNCATE_AT => {
                    let truncated: String = s.chars().take(TRUNCATE_AT).collect();
                    format!("{truncated}...")
                }
                Value::String(s) => s.clone(),
                Value::Array(items) if key == "messages" => {
                    format!("[{} messages]", items.len())
                }
                Value::Array(items) => format!("[{} items]", items.len()),
                Value::Object(map) => format!("{{{} keys}}", map.len()),
                other => other.to_string(),
            };
            lines.push(format!("  {key}: {display}"));
        }

        lines.join("\n")
    }
}

/// An executable graph bound to a checkpoint store.
///
/// Produced by [`GraphBuilder::compile`]; cheap to clone is not a goal.
/// Share it behind an `Arc` instead, all methods take `&self`.
pub struct CompiledGraph {
    nodes: HashMap<NodeId, NodeHandler>,
    edges: HashMap<NodeId, Edge>,
    entry: NodeId,
    interrupts: InterruptController,
    schema: StateSchema,
    store: Arc<dyn CheckpointStore>,
    // Per-thread step serialization; different threads never contend.
    thread_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CompiledGraph {
    pub(crate) fn new(
        builder: GraphBuilder,
        entry: NodeId,
        interrupts: InterruptController,
        store: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            nodes: builder.nodes,
            edges: builder.edges,
            entry,
            interrupts,
            schema: builder.schema,
            store,
            thread_locks: Mutex::new(HashMap::new()),
        }
    }

    /// The entry node new threads begin at.
    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// The interrupt guard configuration.
    pub fn interrupts(&self) -> &InterruptController {
        &self.interrupts
    }

    async fn thread_lock(&self, thread_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.thread_locks.lock().await;
        locks
            .entry(thread_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Initialize a thread with its input state and return its id.
    ///
    /// `initial_state` is merged through the field reducers into an empty
    /// state and saved as the `Input` checkpoint (step -1, `next` = entry).
    /// A random id is generated when `thread_id` is `None`. A guarded entry
    /// node interrupts immediately: the input checkpoint is saved with a
    /// pending interrupt, so even the first node waits for approval.
    pub async fn create_thread(
        &self,
        thread_id: Option<String>,
        initial_state: State,
    ) -> Result<String> {
        let thread_id = thread_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let lock = self.thread_lock(&thread_id).await;
        let _guard = lock.lock().await;

        if self.store.contains_thread(&thread_id).await? {
            return Err(GraphError::ThreadExists(thread_id));
        }

        let state = merge(&State::new(), initial_state, &self.schema);
        let mut metadata = CheckpointMetadata::new(-1, CheckpointSource::Input);
        if self.interrupts.guards(&self.entry) {
            metadata = metadata.with_pending_interrupt(self.entry.clone());
        }
        self.store
            .save(&thread_id, state, vec![self.entry.clone()], metadata, None)
            .await?;

        tracing::info!(thread_id, entry = %self.entry, "thread created");
        Ok(thread_id)
    }

    /// Execute the thread's single pending node and append a checkpoint.
    ///
    /// - `next` empty → [`GraphError::TerminalThread`].
    /// - `Failed` status → [`GraphError::ThreadFailed`] until
    ///   [`update_state`](Self::update_state) clears it.
    /// - `Interrupted` status → returns [`StepOutcome::Interrupted`] without
    ///   executing anything; only [`resume`](Self::resume) moves past it.
    pub async fn step(&self, thread_id: &str) -> Result<StepOutcome> {
        let lock = self.thread_lock(thread_id).await;
        let _guard = lock.lock().await;

        let checkpoint = self.store.load(thread_id, None).await?;
        if checkpoint.next.is_empty() {
            return Err(GraphError::TerminalThread(thread_id.to_string()));
        }

        match checkpoint.metadata.status {
            ThreadStatus::Failed => Err(GraphError::ThreadFailed {
                thread_id: thread_id.to_string(),
                error: checkpoint.metadata.error.clone().unwrap_or_default(),
            }),
            ThreadStatus::Interrupted => {
                let node = checkpoint
                    .metadata
                    .pending_interrupt
                    .clone()
                    .unwrap_or_else(|| checkpoint.next[0].clone());
                Ok(StepOutcome::Interrupted { node })
            }
            ThreadStatus::Running => {
                let node = checkpoint.next[0].clone();
                self.execute_node(thread_id, &checkpoint, &node, CheckpointSource::Loop)
                    .await
            }
        }
    }

    /// Step repeatedly until the thread completes or interrupts.
    ///
    /// Exhausting `max_iterations` fails with
    /// [`GraphError::IterationBudgetExceeded`] rather than looping forever.
    pub async fn run_to_completion(
        &self,
        thread_id: &str,
        max_iterations: usize,
    ) -> Result<RunOutcome> {
        for _ in 0..max_iterations {
            match self.step(thread_id).await? {
                StepOutcome::Ran { .. } => continue,
                StepOutcome::Interrupted { node } => {
                    return Ok(RunOutcome::Interrupted { node })
                }
                StepOutcome::Complete { .. } => return Ok(RunOutcome::Complete),
            }
        }
        Err(GraphError::IterationBudgetExceeded {
            thread_id: thread_id.to_string(),
            max_iterations,
        })
    }

    /// Resolve a pending interrupt.
    ///
    /// Requires the thread to be interrupted, else
    /// [`GraphError::NoPendingInterrupt`].
    ///
    /// - `approved = true`: executes the guarded node exactly as `step`
    ///   would have without the interruption. `override_args`, when given,
    ///   is overlaid onto the pending tool call's arguments first and
    ///   persisted as an `Update` checkpoint.
    /// - `approved = false`: skips the guarded handler entirely and commits
    ///   a synthesized tool-role rejection message instead, then routes
    ///   from the guarded node's edge on the new state.
    ///
    /// Either way the interrupt guard applies afresh to whatever node
    /// routing selects next.
    pub async fn resume(
        &self,
        thread_id: &str,
        approved: bool,
        override_args: Option<Value>,
    ) -> Result<StepOutcome> {
        let lock = self.thread_lock(thread_id).await;
        let _guard = lock.lock().await;

        let checkpoint = self.store.load(thread_id, None).await?;
        let pending = match checkpoint.metadata.status {
            ThreadStatus::Interrupted => checkpoint
                .metadata
                .pending_interrupt
                .clone()
                .ok_or_else(|| GraphError::NoPendingInterrupt(thread_id.to_string()))?,
            _ => return Err(GraphError::NoPendingInterrupt(thread_id.to_string())),
        };

        if approved {
            tracing::info!(thread_id, node = %pending, "interrupt approved");
            let base = match override_args {
                Some(args) => {
                    let state = self.apply_args_override(thread_id, &checkpoint.state, &args)?;
                    let metadata = CheckpointMetadata::new(
                        checkpoint.metadata.step,
                        CheckpointSource::Update,
                    );
                    let id = self
                        .store
                        .save(
                            thread_id,
                            state,
                            checkpoint.next.clone(),
                            metadata,
                            Some(checkpoint.id),
                        )
                        .await?;
                    self.store.load(thread_id, Some(id)).await?
                }
                None => checkpoint,
            };
            self.execute_node(thread_id, &base, &pending, CheckpointSource::Resume)
                .await
        } else {
            if override_args.is_some() {
                tracing::warn!(thread_id, "override_args ignored for a rejected interrupt");
            }
            tracing::info!(thread_id, node = %pending, "interrupt rejected");
            let partial = self.interrupts.rejection_update(&checkpoint.state)?;
            let new_state = merge(&checkpoint.state, partial, &self.schema);
            self.commit_transition(
                thread_id,
                &checkpoint,
                &pending,
                new_state,
                CheckpointSource::Resume,
            )
            .await
        }
    }

    /// Latest (or a specific historical) state view of a thread.
    pub async fn get_state(
        &self,
        thread_id: &str,
        checkpoint_id: Option<CheckpointId>,
    ) -> Result<ThreadSnapshot> {
        let checkpoint = self.store.load(thread_id, checkpoint_id).await?;
        Ok(ThreadSnapshot::from_checkpoint(thread_id, checkpoint))
    }

    /// Checkpoint history, newest first.
    pub async fn get_history(
        &self,
        thread_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ThreadSnapshot>> {
        let checkpoints = self.store.history(thread_id, limit).await?;
        Ok(checkpoints
            .into_iter()
            .map(|c| ThreadSnapshot::from_checkpoint(thread_id, c))
            .collect())
    }

    /// Reflection over the thread's current state fields, for external
    /// tooling that renders or edits state without schema knowledge.
    pub async fn introspect_state(&self, thread_id: &str) -> Result<HashMap<String, FieldInfo>> {
        let checkpoint = self.store.load(thread_id, None).await?;
        Ok(introspect(&checkpoint.state))
    }

    /// Apply an external state edit as a new `Update` checkpoint.
    ///
    /// Merges `partial` through the field reducers, preserves the pending
    /// `next` nodes, and resets a `Failed` status back to `Running`; this
    /// is the documented way to clear a failure. A pending interrupt is
    /// preserved: editing state does not silently approve anything.
    pub async fn update_state(&self, thread_id: &str, partial: State) -> Result<CheckpointId> {
        let lock = self.thread_lock(thread_id).await;
        let _guard = lock.lock().await;

        let checkpoint = self.store.load(thread_id, None).await?;
        let new_state = merge(&checkpoint.state, partial, &self.schema);

        let mut metadata =
            CheckpointMetadata::new(checkpoint.metadata.step, CheckpointSource::Update);
        if checkpoint.metadata.status == ThreadStatus::Interrupted {
            if let Some(node) = checkpoint.metadata.pending_interrupt.clone() {
                metadata = metadata.with_pending_interrupt(node);
            }
        }

        let id = self
            .store
            .save(
                thread_id,
                new_state,
                checkpoint.next.clone(),
                metadata,
                Some(checkpoint.id),
            )
            .await?;
        tracing::debug!(thread_id, checkpoint_id = id, "state updated externally");
        Ok(id)
    }

    /// Time travel: branch a new checkpoint off `checkpoint_id`.
    ///
    /// The fork's parent is the historical checkpoint; its state is that
    /// checkpoint's state with `partial` merged through the reducers; its
    /// pending nodes are copied from the fork point, so stepping continues
    /// from there. Checkpoints recorded after the fork point on the
    /// original path remain loadable by id; history is never rewritten.
    pub async fn fork_from_checkpoint(
        &self,
        thread_id: &str,
        checkpoint_id: CheckpointId,
        partial: Option<State>,
    ) -> Result<CheckpointId> {
        let lock = self.thread_lock(thread_id).await;
        let _guard = lock.lock().await;

        let source = self.store.load(thread_id, Some(checkpoint_id)).await?;
        let state = match partial {
            Some(p) => merge(&source.state, p, &self.schema),
            None => source.state.clone(),
        };

        let mut metadata = CheckpointMetadata::new(source.metadata.step, CheckpointSource::Fork);
        if source.metadata.status == ThreadStatus::Interrupted {
            if let Some(node) = source.metadata.pending_interrupt.clone() {
                metadata = metadata.with_pending_interrupt(node);
            }
        }

        let id = self
            .store
            .fork(thread_id, checkpoint_id, state, metadata)
            .await?;
        tracing::info!(
            thread_id,
            checkpoint_id = id,
            fork_point = checkpoint_id,
            "forked from checkpoint"
        );
        Ok(id)
    }

    /// Run one node's handler and commit the result.
    ///
    /// A handler error produces a `Failed` checkpoint carrying the parent's
    /// state and pending nodes unchanged, never a partial commit.
    async fn execute_node(
        &self,
        thread_id: &str,
        checkpoint: &Checkpoint,
        node: &str,
        source: CheckpointSource,
    ) -> Result<StepOutcome> {
        let handler = self.nodes.get(node).ok_or_else(|| {
            GraphError::Validation(format!("node '{node}' is not declared"))
        })?;

        tracing::debug!(thread_id, node, step = checkpoint.metadata.step + 1, "executing node");
        match handler(checkpoint.state.clone()).await {
            Ok(partial) => {
                let new_state = merge(&checkpoint.state, partial, &self.schema);
                self.commit_transition(thread_id, checkpoint, node, new_state, source)
                    .await
            }
            Err(err) => {
                let message = err.to_string();
                tracing::warn!(thread_id, node, error = %message, "node handler failed");
                let metadata = CheckpointMetadata::new(checkpoint.metadata.step, source)
                    .with_error(message.clone());
                self.store
                    .save(
                        thread_id,
                        checkpoint.state.clone(),
                        checkpoint.next.clone(),
                        metadata,
                        Some(checkpoint.id),
                    )
                    .await?;
                Err(GraphError::NodeExecution {
                    node: node.to_string(),
                    error: message,
                })
            }
        }
    }

    /// Route from the executed node and append the resulting checkpoint,
    /// raising an interrupt when the routed target is guarded.
    async fn commit_transition(
        &self,
        thread_id: &str,
        parent: &Checkpoint,
        executed: &str,
        new_state: State,
        source: CheckpointSource,
    ) -> Result<StepOutcome> {
        let next_node = self.route(executed, &new_state)?;
        let step = parent.metadata.step + 1;

        // Re-checked on every pass through the edge, including loops back
        // into the same guarded node.
        if next_node != END && self.interrupts.guards(&next_node) {
            let metadata = CheckpointMetadata::new(step, source)
                .with_pending_interrupt(next_node.clone());
            self.store
                .save(
                    thread_id,
                    new_state,
                    vec![next_node.clone()],
                    metadata,
                    Some(parent.id),
                )
                .await?;
            tracing::info!(thread_id, node = %next_node, "interrupted before guarded node");
            return Ok(StepOutcome::Interrupted { node: next_node });
        }

        let next = if next_node == END {
            Vec::new()
        } else {
            vec![next_node]
        };
        let metadata = CheckpointMetadata::new(step, source);
        self.store
            .save(thread_id, new_state, next.clone(), metadata, Some(parent.id))
            .await?;

        if next.is_empty() {
            tracing::debug!(thread_id, node = executed, "thread reached terminal state");
            Ok(StepOutcome::Complete {
                node: executed.to_string(),
            })
        } else {
            Ok(StepOutcome::Ran {
                node: executed.to_string(),
                next,
            })
        }
    }

    /// Evaluate the edge bound to `node` against the post-merge state.
    ///
    /// A node without an outgoing edge is terminal. A conditional router
    /// must return one of its declared branches or [`END`].
    fn route(&self, node: &str, state: &State) -> Result<NodeId> {
        match self.edges.get(node) {
            None => Ok(END.to_string()),
            Some(Edge::Direct(to)) => Ok(to.clone()),
            Some(Edge::Conditional { router, branches }) => {
                let target = router(state);
                if target != END && !branches.contains(&target) {
                    return Err(GraphError::Validation(format!(
                        "router for '{node}' returned undeclared target '{target}'"
                    )));
                }
                Ok(target)
            }
        }
    }

    /// Overlay approved argument overrides onto the pending tool call,
    /// rewriting the last ai message in the state's message history.
    fn apply_args_override(
        &self,
        thread_id: &str,
        state: &State,
        override_args: &Value,
    ) -> Result<State> {
        let overrides = override_args.as_object().ok_or_else(|| {
            GraphError::Serialization("override_args must be a JSON object".to_string())
        })?;

        let mut messages = match state.get("messages") {
            Some(value) => deserialize_messages(value)?,
            None => Vec::new(),
        };

        let target = messages
            .iter_mut()
            .rev()
            .find(|m| m.role == MessageRole::Ai && m.has_tool_calls());
        match target {
            Some(message) => {
                if let Some(call) = message.tool_calls.first_mut() {
                    if let Value::Object(args) = &mut call.args {
                        for (key, value) in overrides {
                            args.insert(key.clone(), value.clone());
                        }
                    } else {
                        call.args = Value::Object(overrides.clone());
                    }
                }
            }
            None => {
                tracing::warn!(thread_id, "no pending tool call to override; ignoring");
                return Ok(state.clone());
            }
        }

        // This is an edit of the existing history, not a node update, so
        // the full message list replaces the field directly instead of
        // going through the append reducer.
        let mut edited = state.clone();
        edited.insert("messages".to_string(), serialize_messages(&messages)?);
        Ok(edited)
    }
}

impl std::fmt::Debug for CompiledGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("entry", &self.entry)
            .field("guarded", self.interrupts.guarded_nodes())
            .finish()
    }
}
