//! # agentgraph-checkpoint - State Persistence for Graph Execution
//!
//! **Trait-based checkpoint abstractions and an in-memory implementation**
//! for persisting and restoring graph execution state. Checkpoints enable:
//!
//! - **Time-Travel** - Inspect and branch from any prior execution point
//! - **Human-in-the-Loop** - A pending approval survives process restarts
//!   because the interrupt lives in durable metadata, not process memory
//! - **Fault Recovery** - A failed thread resumes after an external state fix
//! - **Audit Trails** - The full, append-only state evolution per thread
//!
//! ## Core Concepts
//!
//! ### CheckpointStore trait
//!
//! [`CheckpointStore`] defines the persistence interface: `save`, `load`,
//! `history`, `fork` and `contains_thread`. The scheduler in
//! `agentgraph-core` is written against this trait only; storage technology
//! is the backend's choice.
//!
//! ### Logical-clock ids
//!
//! Each thread's log owns a monotonic counter. Ids therefore sort a single
//! thread's checkpoints correctly by construction, and writers on different
//! threads never coordinate. Wall-clock timestamps are recorded but are
//! informational only.
//!
//! ### Append-only branching
//!
//! History is never rewritten. "Editing" state and "time travel" both append
//! a new checkpoint whose `parent_id` points at the checkpoint being edited
//! or resumed from; the abandoned path stays loadable by id.
//!
//! ## Quick Start
//!
//! ```rust
//! use agentgraph_checkpoint::{
//!     CheckpointMetadata, CheckpointSource, CheckpointStore, InMemoryCheckpointStore,
//! };
//! use std::collections::HashMap;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = InMemoryCheckpointStore::new();
//!
//!     let root = store
//!         .save(
//!             "thread-1",
//!             HashMap::new(),
//!             vec!["agent".to_string()],
//!             CheckpointMetadata::new(-1, CheckpointSource::Input),
//!             None,
//!         )
//!         .await?;
//!
//!     // Branch an alternate timeline off the root.
//!     let fork = store
//!         .fork(
//!             "thread-1",
//!             root,
//!             HashMap::new(),
//!             CheckpointMetadata::new(-1, CheckpointSource::Fork),
//!         )
//!         .await?;
//!     assert!(fork > root);
//!     Ok(())
//! }
//! ```

pub mod checkpoint;
pub mod error;
pub mod memory;
pub mod store;

pub use checkpoint::{
    Checkpoint, CheckpointId, CheckpointMetadata, CheckpointSource, StateValues, ThreadStatus,
};
pub use error::{CheckpointError, Result};
pub use memory::InMemoryCheckpointStore;
pub use store::CheckpointStore;
