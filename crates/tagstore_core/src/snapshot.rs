//! Whole-state snapshot persistence over the backing store.

use crate::collection::Collection;
use crate::entity::{Page, Tag};
use crate::error::CoreResult;
use crate::store::EntityStore;
use crate::tombstone::TombstoneLedger;
use serde::de::DeserializeOwned;
use tagstore_storage::KvBackend;

/// Backing-store key holding the tag collection.
pub const TAGS_KEY: &str = "tags";
/// Backing-store key holding the page collection.
pub const PAGES_KEY: &str = "pages";
/// Backing-store key holding the tombstone ledger.
pub const TOMBSTONES_KEY: &str = "tombstones";

/// A decoded whole-state snapshot of the datastore.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// All tags.
    pub tags: Collection<Tag>,
    /// All pages.
    pub pages: Collection<Page>,
    /// Pending deletions.
    pub tombstones: TombstoneLedger,
}

impl Snapshot {
    /// Loads the snapshot from the backing store.
    ///
    /// Missing keys decode to empty sections, so a brand-new store loads
    /// cleanly.
    pub fn load<B: KvBackend + ?Sized>(backend: &B) -> CoreResult<Self> {
        let values = backend.get_multiple(&[TAGS_KEY, PAGES_KEY, TOMBSTONES_KEY])?;

        fn section<T: DeserializeOwned + Default>(
            values: &std::collections::HashMap<String, Vec<u8>>,
            key: &str,
        ) -> CoreResult<T> {
            match values.get(key) {
                Some(bytes) => Ok(serde_json::from_slice(bytes)?),
                None => Ok(T::default()),
            }
        }

        Ok(Self {
            tags: section(&values, TAGS_KEY)?,
            pages: section(&values, PAGES_KEY)?,
            tombstones: section(&values, TOMBSTONES_KEY)?,
        })
    }
}

/// Rehydrates the store from the backing store and marks it loaded.
pub(crate) fn rehydrate<B: KvBackend + ?Sized>(
    store: &mut EntityStore,
    backend: &B,
) -> CoreResult<()> {
    let snapshot = Snapshot::load(backend)?;
    store.restore(snapshot.tags, snapshot.pages, snapshot.tombstones);
    Ok(())
}

/// Commits every dirty section of the store to the backing store as one
/// batched write. A no-op when nothing is dirty.
///
/// Dirty flags are cleared only after the write succeeds; on failure they
/// stay set and the persisted view remains the previous snapshot.
pub(crate) fn commit<B: KvBackend + ?Sized>(
    store: &mut EntityStore,
    backend: &mut B,
) -> CoreResult<()> {
    let dirty = store.dirty();
    if !dirty.any() {
        return Ok(());
    }

    let mut entries: Vec<(&str, Vec<u8>)> = Vec::with_capacity(3);
    if dirty.tags {
        entries.push((TAGS_KEY, serde_json::to_vec(store.tags())?));
    }
    if dirty.pages {
        entries.push((PAGES_KEY, serde_json::to_vec(store.pages())?));
    }
    if dirty.tombstones {
        entries.push((TOMBSTONES_KEY, serde_json::to_vec(store.tombstones())?));
    }

    backend.set_many(&entries)?;
    store.clear_dirty();
    Ok(())
}
