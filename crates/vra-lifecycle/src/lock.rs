//! Keyed mutual exclusion for lifecycle calls.
//!
//! One [`LockRegistry`] is owned by a [`crate::LifecycleClient`] and shared by
//! every clone of it. Calls on the same identity key run one at a time; calls
//! on different keys never wait for each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

/// Table of per-key locks, created on first use and kept for the process lifetime.
///
/// Entries are never evicted: a remote object may be recreated under the same
/// key after it was deleted, and the lock has to survive that.
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl LockRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    ///
    /// Always succeeds eventually; there is no timeout. The returned guard
    /// releases the key when dropped, including on unwind or when the owning
    /// future is dropped.
    pub async fn acquire(&self, key: &str) -> LockGuard {
        let lock = self.entry(key);

        let guard = match Arc::clone(&lock).try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                debug!(key, "waiting for in-flight operation on the same resource");
                lock.lock_owned().await
            }
        };

        LockGuard {
            key: key.to_string(),
            _guard: guard,
        }
    }

    /// Number of keys that have ever been locked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table().len()
    }

    /// Returns true if no key has been locked yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    /// Returns true if `key` has an entry.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.table().contains_key(key)
    }

    fn entry(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.table();
        Arc::clone(locks.entry(key.to_string()).or_default())
    }

    // The table only ever gains entries, so a poisoned guard is still consistent.
    fn table(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive access to one identity key.
#[derive(Debug)]
pub struct LockGuard {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl LockGuard {
    /// The key this guard holds.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn distinct_keys_do_not_block() {
        let registry = LockRegistry::new();
        let first = registry.acquire("action-1").await;
        let second = timeout(Duration::from_millis(100), registry.acquire("action-2"))
            .await
            .expect("distinct key must not wait");

        assert_eq!(first.key(), "action-1");
        assert_eq!(second.key(), "action-2");
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn same_key_waits_until_release() {
        let registry = Arc::new(LockRegistry::new());
        let held = registry.acquire("action-42").await;

        let blocked = timeout(Duration::from_millis(50), registry.acquire("action-42")).await;
        assert!(blocked.is_err(), "second acquire must wait");

        let waiter = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.acquire("action-42").await.key().to_string() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(held);
        let key = timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter must proceed after release")
            .unwrap();
        assert_eq!(key, "action-42");
    }

    #[tokio::test]
    async fn entries_are_never_evicted() {
        let registry = LockRegistry::new();
        assert!(registry.is_empty());

        drop(registry.acquire("workflow-a").await);
        drop(registry.acquire("workflow-a").await);
        drop(registry.acquire("workflow-b").await);

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("workflow-a"));
        assert!(!registry.contains("workflow-c"));
    }

    #[tokio::test]
    async fn guard_is_released_when_holder_panics() {
        let registry = Arc::new(LockRegistry::new());

        let panicking = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                let _guard = registry.acquire("cfg-1").await;
                panic!("boom");
            })
        };
        assert!(panicking.await.is_err());

        timeout(Duration::from_millis(200), registry.acquire("cfg-1"))
            .await
            .expect("lock must be free after the holder unwound");
    }

    #[tokio::test]
    async fn dropped_waiter_does_not_hold_the_key() {
        let registry = LockRegistry::new();
        let held = registry.acquire("k").await;
        let _ = timeout(Duration::from_millis(20), registry.acquire("k")).await;
        drop(held);

        timeout(Duration::from_millis(200), registry.acquire("k"))
            .await
            .expect("abandoned waiter must not keep the lock");
    }
}
