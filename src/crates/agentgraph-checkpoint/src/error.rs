//! Error types for checkpoint persistence.

use thiserror::Error;

/// Errors raised by checkpoint store operations.
#[derive(Error, Debug)]
pub enum CheckpointError {
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

    /// A checkpoint record could not be encoded or decoded
    #[error("checkpoint serialization failed: {0}")]
    Serialization(String),

    /// Storage backend I/O failure, fatal for this single operation
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Result type for checkpoint operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;
