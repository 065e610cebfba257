//! The pluggable checkpoint storage interface.
//!
//! [`CheckpointStore`] is the seam between the graph scheduler and durable
//! storage. The scheduler only ever appends (`save`, `fork`) and reads
//! (`load`, `history`); nothing in the interface can mutate or delete an
//! existing checkpoint, which is what makes time travel safe.
//!
//! The crate ships [`InMemoryCheckpointStore`](crate::InMemoryCheckpointStore)
//! as the reference backend. Durable backends (SQLite, Postgres, Redis…)
//! implement this trait and persist the record shape:
//!
//! ```text
//! { thread_id, checkpoint_id, parent_checkpoint_id,
//!   state: { field: jsonValue }, next: [nodeId…],
//!   metadata: { step, source, status, … } }
//! ```
//!
//! # Implementing a custom backend
//!
//! ```rust,ignore
//! use agentgraph_checkpoint::{
//!     Checkpoint, CheckpointId, CheckpointMetadata, CheckpointStore, Result, StateValues,
//! };
//! use async_trait::async_trait;
//!
//! struct SqliteCheckpointStore { /* connection pool */ }
//!
//! #[async_trait]
//! impl CheckpointStore for SqliteCheckpointStore {
//!     async fn save(
//!         &self,
//!         thread_id: &str,
//!         state: StateValues,
//!         next: Vec<String>,
//!         metadata: CheckpointMetadata,
//!         parent_id: Option<CheckpointId>,
//!     ) -> Result<CheckpointId> {
//!         // INSERT with a per-thread sequence for the id
//!         # unimplemented!()
//!     }
//!     // load / history / fork / contains_thread …
//!     # async fn load(&self, _: &str, _: Option<CheckpointId>) -> Result<Checkpoint> { unimplemented!() }
//!     # async fn history(&self, _: &str, _: Option<usize>) -> Result<Vec<Checkpoint>> { unimplemented!() }
//!     # async fn fork(&self, _: &str, _: CheckpointId, _: StateValues, _: CheckpointMetadata) -> Result<CheckpointId> { unimplemented!() }
//!     # async fn contains_thread(&self, _: &str) -> Result<bool> { unimplemented!() }
//! }
//! ```

use crate::checkpoint::{Checkpoint, CheckpointId, CheckpointMetadata, StateValues};
use crate::error::Result;
use async_trait::async_trait;

/// Append-only, branchable checkpoint log, keyed by thread id.
///
/// Implementations must uphold two invariants:
///
/// 1. **Monotonic ids**: ids returned by [`save`](Self::save) and
///    [`fork`](Self::fork) are strictly increasing per thread, assigned by a
///    logical counter rather than wall time, so saves racing across threads
///    never produce out-of-order ids within any one thread.
/// 2. **Immutability**: a saved checkpoint is never modified or deleted;
///    forking appends a new checkpoint whose `parent_id` is the fork point
///    while every checkpoint after that point stays loadable by id.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Append a new checkpoint for `thread_id` and return its assigned id.
    ///
    /// Saving under a thread id with no prior history creates the thread's
    /// log; `parent_id` should be `None` exactly for that root checkpoint.
    async fn save(
        &self,
        thread_id: &str,
        state: StateValues,
        next: Vec<String>,
        metadata: CheckpointMetadata,
        parent_id: Option<CheckpointId>,
    ) -> Result<CheckpointId>;

    /// Load a checkpoint, or the latest one when `checkpoint_id` is `None`.
    async fn load(&self, thread_id: &str, checkpoint_id: Option<CheckpointId>)
        -> Result<Checkpoint>;

    /// Return the thread's checkpoints newest-first, truncated to `limit`.
    async fn history(&self, thread_id: &str, limit: Option<usize>) -> Result<Vec<Checkpoint>>;

    /// Branch off `checkpoint_id`: append a new checkpoint whose parent is
    /// the fork point, carrying `state` and the fork point's pending `next`.
    ///
    /// This is explicitly **not** a rewrite of history; checkpoints recorded
    /// after the fork point on the original path remain retrievable by id.
    async fn fork(
        &self,
        thread_id: &str,
        checkpoint_id: CheckpointId,
        state: StateValues,
        metadata: CheckpointMetadata,
    ) -> Result<CheckpointId>;

    /// Whether any checkpoint history exists for `thread_id`.
    async fn contains_thread(&self, thread_id: &str) -> Result<bool>;
}
