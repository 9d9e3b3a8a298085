//! Single-flight result cache.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::Serialize;
use weft_core::{Digest, Resolved};

use crate::error::EvaluationError;
use crate::graph::Node;

/// Result of one node computation.
pub(super) type NodeResult = Result<Resolved, EvaluationError>;

type SharedResult = Shared<BoxFuture<'static, NodeResult>>;

/// Cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Completed or in-flight entries.
    pub entries: usize,
    /// Lookups answered by an existing entry.
    pub hits: u64,
    /// Lookups that started a computation.
    pub misses: u64,
}

struct Entry {
    generation: u64,
    future: SharedResult,
}

/// Maps node digests to their in-flight or completed results.
///
/// At most one computation per digest runs at a time. Computations run as
/// spawned tasks, so a caller dropping its future never cancels the work
/// other callers wait on. Failed entries are evicted once the task ends.
#[derive(Default)]
pub(super) struct ResultCache {
    entries: Mutex<HashMap<Digest, Entry>>,
    generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResultCache {
    fn lock(&self) -> MutexGuard<'_, HashMap<Digest, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the shared result for `node`, starting `compute` if no
    /// entry exists.
    pub fn get_or_compute(
        self: &Arc<Self>,
        node: &Node,
        compute: impl FnOnce() -> BoxFuture<'static, NodeResult>,
    ) -> BoxFuture<'static, NodeResult> {
        let digest = node.digest();
        let mut entries = self.lock();
        if let Some(entry) = entries.get(&digest) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return entry.future.clone().boxed();
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let cache = Arc::clone(self);
        let computation = compute();
        let handle = tokio::spawn(async move {
            let result = computation.await;
            if result.is_err() {
                cache.evict(digest, generation);
            }
            result
        });

        let cache = Arc::clone(self);
        let node = node.clone();
        let future = async move {
            match handle.await {
                Ok(result) => result,
                Err(error) => {
                    cache.evict(digest, generation);
                    Err(EvaluationError::internal(
                        &node,
                        format!("computation aborted: {error}"),
                    ))
                }
            }
        }
        .boxed()
        .shared();

        entries.insert(
            digest,
            Entry {
                generation,
                future: future.clone(),
            },
        );
        future.boxed()
    }

    fn evict(&self, digest: Digest, generation: u64) {
        let mut entries = self.lock();
        if entries.get(&digest).is_some_and(|e| e.generation == generation) {
            entries.remove(&digest);
        }
    }

    /// Returns the counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.lock().len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Drops every entry. In-flight computations finish for their current
    /// waiters.
    pub fn clear(&self) {
        self.lock().clear();
    }
}
