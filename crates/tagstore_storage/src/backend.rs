//! Backing store trait definition.

use crate::error::StorageResult;
use std::collections::HashMap;

/// A durable key-value backing store for tagstore.
///
/// Backends are **opaque value stores**. They provide simple operations for
/// reading and writing values by key. Tagstore owns all value format
/// interpretation - backends do not understand snapshots, entities, or
/// tombstones.
///
/// # Invariants
///
/// - `get` returns exactly the bytes previously written under that key
/// - A completed `set` is durable: the value survives process termination
/// - Reads are consistent with earlier writes within a process lifetime
/// - Backends must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::MemoryBackend`] - For testing
/// - [`super::FileBackend`] - For persistent storage
pub trait KvBackend: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// Returns `None` if the key has never been written or was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs or the stored value
    /// cannot be read back.
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Reads several keys in one call.
    ///
    /// Missing keys are absent from the returned map; this is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if any individual read fails.
    fn get_multiple(&self, keys: &[&str]) -> StorageResult<HashMap<String, Vec<u8>>> {
        let mut values = HashMap::new();
        for key in keys {
            if let Some(value) = self.get(key)? {
                values.insert((*key).to_string(), value);
            }
        }
        Ok(values)
    }

    /// Writes `value` under `key`, replacing any previous value.
    ///
    /// After this returns successfully the value is durable: it is
    /// guaranteed to survive process termination.
    ///
    /// # Errors
    ///
    /// Returns an error if the write cannot be made durable.
    fn set(&mut self, key: &str, value: &[u8]) -> StorageResult<()>;

    /// Writes several keys in one call.
    ///
    /// Backends should apply the whole batch as one write where the
    /// underlying medium allows it, so a caller persisting a multi-part
    /// snapshot never leaves a partially-written state behind. The default
    /// implementation falls back to sequential `set` calls.
    ///
    /// # Errors
    ///
    /// Returns an error if any individual write fails.
    fn set_many(&mut self, entries: &[(&str, Vec<u8>)]) -> StorageResult<()> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Removes the value stored under `key`.
    ///
    /// Removing a missing key is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn remove(&mut self, key: &str) -> StorageResult<()>;
}
