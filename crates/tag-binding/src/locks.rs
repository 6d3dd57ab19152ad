//! Per-resource mutual exclusion for tag mutations.
//!
//! The remote tagging API is not safe for concurrent writes against the same
//! resource, so every create/delete for one resource id runs under that id's
//! lock. Different resource ids never contend.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, Weak};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Map size above which dead entries are purged.
const CLEANUP_THRESHOLD: usize = 256;

/// Purge at most once per this many acquisitions.
const CLEANUP_INTERVAL: usize = 64;

/// Registry of per-resource-id locks.
///
/// Entries hold weak references, so a resource id's mutex is freed once no
/// guard or waiter refers to it.
#[derive(Debug, Default)]
pub struct MutationLocks {
    locks: std::sync::Mutex<HashMap<String, Weak<Mutex<()>>>>,
    acquisitions: AtomicUsize,
}

/// Holds the lock for one resource id until dropped.
#[derive(Debug)]
pub struct MutationGuard {
    resource_id: String,
    _guard: OwnedMutexGuard<()>,
}

impl MutationGuard {
    /// Resource id this guard excludes.
    #[must_use]
    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }
}

impl MutationLocks {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `resource_id`.
    pub async fn acquire(&self, resource_id: &str) -> MutationGuard {
        let mutex = self.mutex_for(resource_id);
        debug!(resource_id = %resource_id, "Waiting for mutation lock");
        let guard = mutex.lock_owned().await;
        debug!(resource_id = %resource_id, "Mutation lock acquired");

        MutationGuard {
            resource_id: resource_id.to_string(),
            _guard: guard,
        }
    }

    /// Run `f` while holding the lock for `resource_id`.
    pub async fn with_lock<F, Fut, T>(&self, resource_id: &str, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.acquire(resource_id).await;
        f().await
    }

    /// Number of resource ids that currently have a live lock.
    #[must_use]
    pub fn active(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    fn mutex_for(&self, resource_id: &str) -> Arc<Mutex<()>> {
        let mut map = self.locks.lock().unwrap_or_else(PoisonError::into_inner);

        let mutex = map
            .get(resource_id)
            .and_then(Weak::upgrade)
            .unwrap_or_else(|| {
                let mutex = Arc::new(Mutex::new(()));
                map.insert(resource_id.to_string(), Arc::downgrade(&mutex));
                mutex
            });

        let tick = self.acquisitions.fetch_add(1, Ordering::Relaxed);
        if map.len() > CLEANUP_THRESHOLD && tick % CLEANUP_INTERVAL == 0 {
            map.retain(|_, weak| weak.strong_count() > 0);
        }

        mutex
    }

    #[cfg(test)]
    fn entry_count(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
