//! Core checkpoint data structures for state persistence and time-travel.
//!
//! A [`Checkpoint`] is an **immutable snapshot** of a thread's state taken after
//! every executed node. Checkpoints form an append-only, branchable log per
//! thread:
//!
//! - **`id`**: assigned by a per-thread monotonic logical counter, never wall
//!   time, so a single thread's checkpoints always sort correctly and writers
//!   on different threads never contend for ids.
//! - **`parent_id`**: links each checkpoint to the one it was derived from;
//!   `None` only for the root. Editing state or resuming from history always
//!   produces a *new* checkpoint whose parent is the edited/resumed-from one,
//!   so history is never rewritten.
//! - **`next`**: the node ids still pending when the snapshot was taken; an
//!   empty list means the thread is terminal.
//! - **`metadata`**: step counter, source tag, durable thread status
//!   (including a pending human-approval interrupt, which must survive
//!   process restarts).
//!
//! # Example
//!
//! ```rust
//! use agentgraph_checkpoint::{CheckpointMetadata, CheckpointSource, ThreadStatus};
//!
//! let meta = CheckpointMetadata::new(0, CheckpointSource::Loop)
//!     .with_status(ThreadStatus::Interrupted)
//!     .with_pending_interrupt("tools");
//! assert_eq!(meta.pending_interrupt.as_deref(), Some("tools"));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Checkpoint ID type.
///
/// Strictly increasing within a thread; assigned by the store's per-thread
/// logical clock. `(thread_id, CheckpointId)` is globally unique.
pub type CheckpointId = u64;

/// State snapshot values: field name to JSON value.
pub type StateValues = HashMap<String, serde_json::Value>;

/// Origin of a checkpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointSource {
    /// Created when a thread is initialized with its input state
    Input,
    /// Created after a node executed inside the scheduler loop
    Loop,
    /// Created from a manual state update
    Update,
    /// Created by branching off a historical checkpoint (time travel)
    Fork,
    /// Created while resuming a pending interrupt (approve or reject)
    Resume,
}

/// Durable execution status of a thread, carried on its latest checkpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThreadStatus {
    /// The thread can be stepped normally
    #[default]
    Running,
    /// Execution is paused before a guarded node, awaiting approve/reject
    Interrupted,
    /// A node handler failed; requires a state fix before stepping again
    Failed,
}

/// Metadata associated with a checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Step counter: -1 for the input checkpoint, then 0, 1, 2… per executed
    /// step. A checkpoint that records a failure keeps its parent's step.
    pub step: i64,

    /// How this checkpoint was produced
    pub source: CheckpointSource,

    /// Thread status as of this checkpoint
    #[serde(default)]
    pub status: ThreadStatus,

    /// Node id awaiting human approval, set only when `status` is
    /// `Interrupted`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_interrupt: Option<String>,

    /// Handler error message, set only when `status` is `Failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckpointMetadata {
    /// Create metadata with the given step and source, status `Running`.
    pub fn new(step: i64, source: CheckpointSource) -> Self {
        Self {
            step,
            source,
            status: ThreadStatus::Running,
            pending_interrupt: None,
            error: None,
        }
    }

    /// Set the thread status.
    pub fn with_status(mut self, status: ThreadStatus) -> Self {
        self.status = status;
        self
    }

    /// Mark a node as awaiting approval and set status to `Interrupted`.
    pub fn with_pending_interrupt(mut self, node: impl Into<String>) -> Self {
        self.pending_interrupt = Some(node.into());
        self.status = ThreadStatus::Interrupted;
        self
    }

    /// Record a handler failure and set status to `Failed`.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self.status = ThreadStatus::Failed;
        self
    }
}

/// Immutable snapshot of a thread's state at a point in time.
///
/// Created once by [`CheckpointStore::save`](crate::CheckpointStore::save) and
/// never mutated or deleted afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Logical-clock id, strictly increasing within the thread
    pub id: CheckpointId,

    /// Parent checkpoint id; `None` only for the thread's root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<CheckpointId>,

    /// Wall-clock timestamp, informational only; ordering comes from `id`
    pub ts: DateTime<Utc>,

    /// State field values at the time of the checkpoint
    pub state: StateValues,

    /// Pending node ids; empty means the thread is terminal
    pub next: Vec<String>,

    /// Step counter, source tag and durable status
    pub metadata: CheckpointMetadata,
}

impl Checkpoint {
    /// True when this checkpoint has no pending nodes.
    pub fn is_terminal(&self) -> bool {
        self.next.is_empty()
    }

    /// The pending interrupt node, if execution is paused here.
    pub fn pending_interrupt(&self) -> Option<&str> {
        self.metadata.pending_interrupt.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn metadata_builder_sets_status() {
        let meta = CheckpointMetadata::new(3, CheckpointSource::Loop)
            .with_pending_interrupt("tools");
        assert_eq!(meta.status, ThreadStatus::Interrupted);
        assert_eq!(meta.pending_interrupt.as_deref(), Some("tools"));

        let meta = CheckpointMetadata::new(3, CheckpointSource::Loop).with_error("boom");
        assert_eq!(meta.status, ThreadStatus::Failed);
        assert_eq!(meta.error.as_deref(), Some("boom"));
    }

    #[test]
    fn checkpoint_round_trips_through_json() {
        let mut state = StateValues::new();
        state.insert("messages".to_string(), json!([{"role": "human", "content": "hi"}]));

        let checkpoint = Checkpoint {
            id: 2,
            parent_id: Some(1),
            ts: Utc::now(),
            state,
            next: vec!["agent".to_string()],
            metadata: CheckpointMetadata::new(0, CheckpointSource::Loop),
        };

        let encoded = serde_json::to_string(&checkpoint).unwrap();
        let decoded: Checkpoint = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.id, 2);
        assert_eq!(decoded.parent_id, Some(1));
        assert_eq!(decoded.next, vec!["agent".to_string()]);
        assert_eq!(decoded.state["messages"], checkpoint.state["messages"]);
    }
}
