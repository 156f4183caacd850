//! Keyed async locks serializing first-write races

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A table of named mutexes, created on first use
///
/// Clones share the underlying table, so every holder serializes against
/// the same keys. Locks are never removed; the key space here is bounded by
/// the number of distinct dimension rows and fact tables in a run.
#[derive(Clone, Default)]
pub struct KeyedLocks {
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, creating it on first use
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut table = self.inner.lock().await;
            Arc::clone(table.entry(key.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}
