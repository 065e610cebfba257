//! Error types for graph construction and execution.
//!
//! The taxonomy follows the engine's propagation policy:
//!
//! - Compile-time problems are [`GraphError::Validation`] and are fatal.
//! - Handler failures surface as [`GraphError::NodeExecution`] and move the
//!   thread to a durable `Failed` status. The core never retries a node;
//!   retry/backoff belongs to the caller or the tool layer.
//! - A tool-call extraction miss is **not** an error anywhere in this enum;
//!   "no tool call found" is a defined, successful outcome.
//! - Storage failures propagate via [`GraphError::Checkpoint`], fatal for
//!   the single operation that hit them.

use agentgraph_checkpoint::CheckpointError;
use thiserror::Error;

/// Errors raised by the graph engine.
#[derive(Error, Debug)]
pub enum GraphError {
    /// Graph structure validation failed at compile time
    ///
    /// An edge target, conditional branch, entry point or guarded node does
    /// not resolve to a declared node (or the terminal sentinel).
    #[error("graph validation failed: {0}")]
    Validation(String),

    /// No checkpoint history exists for the requested thread
    #[error("unknown thread: '{0}'")]
    UnknownThread(String),

    /// The thread exists but the requested checkpoint id does not
    #[error("unknown checkpoint {checkpoint_id} in thread '{thread_id}'")]
    UnknownCheckpoint {
        /// Thread that was searched
        thread_id: String,
        /// Checkpoint id that was not found
        checkpoint_id: u64,
    },

    /// `create_thread` was called with an id that already has history
    #[error("thread '{0}' already exists")]
    ThreadExists(String),

    /// `resume` was called but nothing is awaiting approval
    #[error("no pending interrupt for thread '{0}'")]
    NoPendingInterrupt(String),

    /// A node handler raised; the thread has moved to `Failed`
    ///
    /// Clearing this requires an external state fix via `update_state`,
    /// which resets the durable status to `Running`.
    #[error("node '{node}' execution failed: {error}")]
    NodeExecution {
        /// Node whose handler failed
        node: String,
        /// Error message from the handler
        error: String,
    },

    /// `step` was called on a thread whose latest checkpoint is `Failed`
    #[error("thread '{thread_id}' is in a failed state: {error}")]
    ThreadFailed {
        /// The failed thread
        thread_id: String,
        /// Error recorded by the failing step
        error: String,
    },

    /// `step` was called on a thread with no pending nodes
    #[error("thread '{0}' is terminal: no pending nodes")]
    TerminalThread(String),

    /// `run_to_completion` exhausted its loop guard
    #[error("thread '{thread_id}' exceeded the iteration budget of {max_iterations}")]
    IterationBudgetExceeded {
        /// The thread that kept looping
        thread_id: String,
        /// Budget that was exhausted
        max_iterations: usize,
    },

    /// Message round-trip (de)serialization failed
    #[error("message serialization failed: {0}")]
    Serialization(String),

    /// Storage-layer failure, fatal for this single operation
    #[error(transparent)]
    Checkpoint(CheckpointError),
}

impl From<CheckpointError> for GraphError {
    fn from(err: CheckpointError) -> Self {
        // Surface the thread/checkpoint lookups as first-class variants so
        // callers match on GraphError alone.
        match err {
            CheckpointError::UnknownThread(thread_id) => GraphError::UnknownThread(thread_id),
            CheckpointError::UnknownCheckpoint {
                thread_id,
                checkpoint_id,
            } => GraphError::UnknownCheckpoint {
                thread_id,
                checkpoint_id,
            },
            other => GraphError::Checkpoint(other),
        }
    }
}

/// Result type for graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;
