//! In-memory backing store for testing.

use crate::backend::KvBackend;
use crate::error::StorageResult;
use parking_lot::RwLock;
use std::collections::HashMap;

/// An in-memory key-value backend.
///
/// This backend stores all values in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral stores that don't need persistence
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use tagstore_storage::{KvBackend, MemoryBackend};
///
/// let mut backend = MemoryBackend::new();
/// backend.set("k", b"v").unwrap();
/// assert_eq!(backend.get("k").unwrap(), Some(b"v".to_vec()));
/// ```
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend pre-populated with the given values.
    ///
    /// Useful for testing restart scenarios: take a [`MemoryBackend::data`]
    /// dump from one backend and rebuild a fresh one over the same bytes.
    #[must_use]
    pub fn with_data(data: HashMap<String, Vec<u8>>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Returns a copy of everything in the backend.
    ///
    /// Useful for testing and debugging.
    #[must_use]
    pub fn data(&self) -> HashMap<String, Vec<u8>> {
        self.data.read().clone()
    }

    /// Returns the number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if no keys are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Clears all values from the backend.
    pub fn clear(&mut self) {
        self.data.write().clear();
    }
}

impl KvBackend for MemoryBackend {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &[u8]) -> StorageResult<()> {
        self.data.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn set_many(&mut self, entries: &[(&str, Vec<u8>)]) -> StorageResult<()> {
        // One write-lock acquisition: the whole batch lands atomically.
        let mut data = self.data.write();
        for (key, value) in entries {
            data.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        self.data.write().remove(key);
        Ok(())
    }
}
