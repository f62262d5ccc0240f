//! Storage backend seam.
//!
//! A collection is persisted as one blob of UTF-8 JSON text under a string
//! key. Backends only need to read, replace and enumerate those blobs; a
//! `write` must land completely or not at all.

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::app_response::AppResponse;

/// Key/value storage of whole collection blobs.
pub trait BlobStore: Send + Sync {
    /// Reads the blob stored under `key`. `Ok(None)` when it was never written.
    fn read(&self, key: &str) -> Result<Option<String>, AppResponse>;

    /// Replaces the blob under `key`. Readers observe either the old or the
    /// new value, never a mix.
    fn write(&self, key: &str, value: &str) -> Result<(), AppResponse>;

    /// Removes the blob under `key`. Returns true if it existed.
    fn remove(&self, key: &str) -> Result<bool, AppResponse>;

    /// Every key currently stored, in ascending order.
    fn keys(&self) -> Result<Vec<String>, AppResponse>;
}

/// Volatile backend kept in process memory.
///
/// Useful for tests and for embedding the store where durability is not
/// wanted. Each blob is replaced under a write lock, so readers never see a
/// half-written value.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<BTreeMap<String, String>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> AppResponse {
    AppResponse::StorageUnavailable("memory blob store lock poisoned".to_string())
}

impl BlobStore for MemoryBlobStore {
    fn read(&self, key: &str) -> Result<Option<String>, AppResponse> {
        let blobs = self.blobs.read().map_err(|_| poisoned())?;
        Ok(blobs.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), AppResponse> {
        let mut blobs = self.blobs.write().map_err(|_| poisoned())?;
        blobs.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, AppResponse> {
        let mut blobs = self.blobs.write().map_err(|_| poisoned())?;
        Ok(blobs.remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>, AppResponse> {
        let blobs = self.blobs.read().map_err(|_| poisoned())?;
        Ok(blobs.keys().cloned().collect())
    }
}
