//! In-memory reference implementation of [`CheckpointStore`].
//!
//! Suitable for demos, tests and single-process deployments where durability
//! across restarts is not required. The core scheduler never assumes this
//! backend; production deployments plug a durable store in through the same
//! trait.
//!
//! Per-thread logs are kept behind a single `tokio::sync::RwLock`. Each log
//! carries its own `next_id` counter, which is what gives checkpoint ids
//! their strictly-increasing-per-thread guarantee regardless of how saves on
//! different threads interleave.
//!
//! # Example
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
//!     let id = store
//!         .save(
//!             "thread-1",
//!             HashMap::new(),
//!             vec!["agent".to_string()],
//!             CheckpointMetadata::new(-1, CheckpointSource::Input),
//!             None,
//!         )
//!         .await?;
//!     assert_eq!(id, 1);
//!
//!     let latest = store.load("thread-1", None).await?;
//!     assert_eq!(latest.next, vec!["agent".to_string()]);
//!     Ok(())
//! }
//! ```

use crate::checkpoint::{Checkpoint, CheckpointId, CheckpointMetadata, StateValues};
use crate::error::{CheckpointError, Result};
use crate::store::CheckpointStore;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Append-only log of one thread's checkpoints plus its logical clock.
#[derive(Debug, Default)]
struct ThreadLog {
    next_id: CheckpointId,
    entries: Vec<Checkpoint>,
}

impl ThreadLog {
    fn assign_id(&mut self) -> CheckpointId {
        self.next_id += 1;
        self.next_id
    }
}

/// Thread-safe in-memory checkpoint storage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCheckpointStore {
    threads: Arc<RwLock<HashMap<String, ThreadLog>>>,
}

impl InMemoryCheckpointStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of threads with at least one checkpoint.
    pub async fn thread_count(&self) -> usize {
        self.threads.read().await.len()
    }

    /// Total number of checkpoints across all threads.
    pub async fn checkpoint_count(&self) -> usize {
        self.threads
            .read()
            .await
            .values()
            .map(|log| log.entries.len())
            .sum()
    }

    /// Drop all history. Test helper.
    pub async fn clear(&self) {
        self.threads.write().await.clear();
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(
        &self,
        thread_id: &str,
        state: StateValues,
        next: Vec<String>,
        metadata: CheckpointMetadata,
        parent_id: Option<CheckpointId>,
    ) -> Result<CheckpointId> {
        let mut threads = self.threads.write().await;
        let log = threads.entry(thread_id.to_string()).or_default();

        let id = log.assign_id();
        log.entries.push(Checkpoint {
            id,
            parent_id,
            ts: Utc::now(),
            state,
            next,
            metadata,
        });

        tracing::debug!(thread_id, checkpoint_id = id, "checkpoint saved");
        Ok(id)
    }

    async fn load(
        &self,
        thread_id: &str,
        checkpoint_id: Option<CheckpointId>,
    ) -> Result<Checkpoint> {
        let threads = self.threads.read().await;
        let log = threads
            .get(thread_id)
            .ok_or_else(|| CheckpointError::UnknownThread(thread_id.to_string()))?;

        let entry = match checkpoint_id {
            Some(id) => log.entries.iter().find(|c| c.id == id).ok_or({
                CheckpointError::UnknownCheckpoint {
                    thread_id: thread_id.to_string(),
                    checkpoint_id: id,
                }
            })?,
            // Entries are appended with increasing ids, so last is latest.
            None => log
                .entries
                .last()
                .ok_or_else(|| CheckpointError::UnknownThread(thread_id.to_string()))?,
        };

        Ok(entry.clone())
    }

    async fn history(&self, thread_id: &str, limit: Option<usize>) -> Result<Vec<Checkpoint>> {
        let threads = self.threads.read().await;
        let log = threads
            .get(thread_id)
            .ok_or_else(|| CheckpointError::UnknownThread(thread_id.to_string()))?;

        let newest_first = log.entries.iter().rev().cloned();
        Ok(match limit {
            Some(n) => newest_first.take(n).collect(),
            None => newest_first.collect(),
        })
    }

    async fn fork(
        &self,
        thread_id: &str,
        checkpoint_id: CheckpointId,
        state: StateValues,
        metadata: CheckpointMetadata,
    ) -> Result<CheckpointId> {
        let mut threads = self.threads.write().await;
        let log = threads
            .get_mut(thread_id)
            .ok_or_else(|| CheckpointError::UnknownThread(thread_id.to_string()))?;

        let next = log
            .entries
            .iter()
            .find(|c| c.id == checkpoint_id)
            .map(|c| c.next.clone())
            .ok_or(CheckpointError::UnknownCheckpoint {
                thread_id: thread_id.to_string(),
                checkpoint_id,
            })?;

        let id = log.assign_id();
        log.entries.push(Checkpoint {
            id,
            parent_id: Some(checkpoint_id),
            ts: Utc::now(),
            state,
            next,
            metadata,
        });

        tracing::debug!(
            thread_id,
            checkpoint_id = id,
            parent_id = checkpoint_id,
            "checkpoint forked"
        );
        Ok(id)
    }

    async fn contains_thread(&self, thread_id: &str) -> Result<bool> {
        Ok(self.threads.read().await.contains_key(thread_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::CheckpointSource;
    use serde_json::json;

    fn meta(step: i64) -> CheckpointMetadata {
        CheckpointMetadata::new(step, CheckpointSource::Loop)
    }

    fn state_with(key: &str, value: serde_json::Value) -> StateValues {
        let mut state = StateValues::new();
        state.insert(key.to_string(), value);
        state
    }

    #[tokio::test]
    async fn save_assigns_strictly_increasing_ids() {
        let store = InMemoryCheckpointStore::new();

        let mut previous = 0;
        for step in 0..10 {
            let id = store
                .save("t1", StateValues::new(), vec![], meta(step), None)
                .await
                .unwrap();
            assert!(id > previous);
            previous = id;
        }
    }

    #[tokio::test]
    async fn ids_stay_monotonic_per_thread_under_interleaving() {
        let store = InMemoryCheckpointStore::new();

        let mut handles = Vec::new();
        for thread in 0..4 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let thread_id = format!("thread-{thread}");
                let mut ids = Vec::new();
                for step in 0..25 {
                    let id = store
                        .save(&thread_id, StateValues::new(), vec![], meta(step), None)
                        .await
                        .unwrap();
                    ids.push(id);
                }
                ids
            }));
        }

        for handle in handles {
            let ids = handle.await.unwrap();
            for pair in ids.windows(2) {
                assert!(pair[0] < pair[1], "ids must be strictly increasing");
            }
        }
        assert_eq!(store.checkpoint_count().await, 100);
    }

    #[tokio::test]
    async fn load_latest_and_by_id() {
        let store = InMemoryCheckpointStore::new();
        let first = store
            .save("t1", state_with("n", json!(1)), vec!["agent".into()], meta(0), None)
            .await
            .unwrap();
        let second = store
            .save("t1", state_with("n", json!(2)), vec![], meta(1), Some(first))
            .await
            .unwrap();

        let latest = store.load("t1", None).await.unwrap();
        assert_eq!(latest.id, second);
        assert_eq!(latest.parent_id, Some(first));
        assert!(latest.is_terminal());

        let old = store.load("t1", Some(first)).await.unwrap();
        assert_eq!(old.state["n"], json!(1));
        assert_eq!(old.next, vec!["agent".to_string()]);
    }

    #[tokio::test]
    async fn unknown_thread_and_checkpoint_errors() {
        let store = InMemoryCheckpointStore::new();

        assert!(matches!(
            store.load("missing", None).await,
            Err(CheckpointError::UnknownThread(_))
        ));

        store
            .save("t1", StateValues::new(), vec![], meta(0), None)
            .await
            .unwrap();
        assert!(matches!(
            store.load("t1", Some(99)).await,
            Err(CheckpointError::UnknownCheckpoint { checkpoint_id: 99, .. })
        ));
        assert!(matches!(
            store
                .fork("t1", 99, StateValues::new(), meta(0))
                .await,
            Err(CheckpointError::UnknownCheckpoint { .. })
        ));
    }

    #[tokio::test]
    async fn history_is_newest_first_with_limit() {
        let store = InMemoryCheckpointStore::new();
        for step in 0..5 {
            store
                .save("t1", StateValues::new(), vec![], meta(step), None)
                .await
                .unwrap();
        }

        let all = store.history("t1", None).await.unwrap();
        assert_eq!(all.len(), 5);
        assert!(all[0].id > all[4].id);

        let limited = store.history("t1", Some(2)).await.unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].id, all[0].id);
    }

    #[tokio::test]
    async fn fork_branches_without_rewriting_history() {
        let store = InMemoryCheckpointStore::new();
        let root = store
            .save("t1", state_with("draft", json!("v1")), vec!["agent".into()], meta(0), None)
            .await
            .unwrap();
        let tip = store
            .save("t1", state_with("draft", json!("v2")), vec![], meta(1), Some(root))
            .await
            .unwrap();

        let fork = store
            .fork("t1", root, state_with("draft", json!("v1-edited")), meta(0))
            .await
            .unwrap();

        let forked = store.load("t1", Some(fork)).await.unwrap();
        assert_eq!(forked.parent_id, Some(root));
        // Fork inherits the fork point's pending nodes, not the tip's.
        assert_eq!(forked.next, vec!["agent".to_string()]);

        // The original path is still retrievable, untouched.
        let original_tip = store.load("t1", Some(tip)).await.unwrap();
        assert_eq!(original_tip.state["draft"], json!("v2"));
    }

    mod id_properties {
        use super::*;
        use proptest::prelude::*;
        use proptest::test_runner::TestCaseError;

        /// Replay an arbitrary sequence of saves and forks on one thread and
        /// check every assigned id against the previous one. Forks pick any
        /// existing checkpoint as their branch point; they must not reuse or
        /// reorder ids either.
        fn replay(ops: Vec<(bool, usize)>) -> std::result::Result<(), TestCaseError> {
            let rt = tokio::runtime::Builder::new_current_thread()
                .build()
                .expect("runtime");
            rt.block_on(async {
                let store = InMemoryCheckpointStore::new();
                let mut ids: Vec<CheckpointId> = Vec::new();
                for (is_fork, pick) in ops {
                    let id = if is_fork && !ids.is_empty() {
                        let parent = ids[pick % ids.len()];
                        store
                            .fork("t1", parent, StateValues::new(), meta(0))
                            .await
                            .unwrap()
                    } else {
                        store
                            .save("t1", StateValues::new(), vec![], meta(0), ids.last().copied())
                            .await
                            .unwrap()
                    };
                    prop_assert!(ids.last().map_or(true, |last| id > *last));
                    ids.push(id);
                }
                Ok(())
            })
        }

        proptest! {
            #[test]
            fn save_and_fork_ids_stay_strictly_increasing(
                ops in proptest::collection::vec((any::<bool>(), 0usize..64), 1..40)
            ) {
                replay(ops)?;
            }
        }
    }
}
