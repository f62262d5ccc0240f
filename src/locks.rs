use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Exclusive writer lock of one collection.
///
/// Held for the whole read-modify-write cycle of a mutation. It guards no
/// data of its own, so a poisoned lock is simply recovered.
#[derive(Debug, Default)]
pub struct CollectionLock {
    state: Mutex<()>,
}

impl CollectionLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self) -> MutexGuard<'_, ()> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Non-blocking acquire. `None` when another writer holds the lock.
    pub fn try_acquire(&self) -> Option<MutexGuard<'_, ()>> {
        match self.state.try_lock() {
            Ok(guard) => Some(guard),
            Err(std::sync::TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(std::sync::TryLockError::WouldBlock) => None,
        }
    }
}

/// Registry handing out one [`CollectionLock`] per collection name.
///
/// Locks are created lazily and the same `Arc` is returned for repeated
/// lookups of a name, so every handle to a collection serializes on the
/// same lock.
///
/// Entries are never evicted: one small lock per distinct collection name
/// lives for the registry's lifetime. Removing an entry while a handle
/// still holds its `Arc` would let a second lock guard the same
/// collection, so the registry only grows. Callers that accept
/// arbitrary names from outside should validate them first.
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: Mutex<HashMap<String, Arc<CollectionLock>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock_for(&self, collection: &str) -> Arc<CollectionLock> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .entry(collection.to_string())
            .or_insert_with(|| Arc::new(CollectionLock::new()))
            .clone()
    }
}
