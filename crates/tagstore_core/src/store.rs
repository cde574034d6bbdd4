//! In-memory authoritative entity store with dirty tracking.

use crate::collection::Collection;
use crate::entity::{domain_of, NewPage, NewTag, Page, PagePatch, Tag, TagPatch};
use crate::error::{CoreError, CoreResult};
use crate::tombstone::{Tombstone, TombstoneLedger};
use crate::types::{EntityKind, Timestamp};
use uuid::Uuid;

/// Tracks which parts of the store diverge from the persisted snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct DirtyFlags {
    pub(crate) tags: bool,
    pub(crate) pages: bool,
    pub(crate) tombstones: bool,
}

impl DirtyFlags {
    pub(crate) fn any(self) -> bool {
        self.tags || self.pages || self.tombstones
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}

/// The in-memory authoritative collections of tags and pages.
///
/// An explicit object constructed once and passed by reference into the
/// command pipeline - never process-wide shared state - so tests can
/// inject their own store.
///
/// The store tracks a `loaded` readiness flag (set after rehydration from
/// the backing store) and per-section dirty flags consumed by the snapshot
/// commit. All mutations validate first, then mutate, so a rejected
/// command leaves memory untouched.
#[derive(Debug, Default)]
pub struct EntityStore {
    tags: Collection<Tag>,
    pages: Collection<Page>,
    tombstones: TombstoneLedger,
    dirty: DirtyFlags,
    loaded: bool,
}

impl EntityStore {
    /// Creates an empty, not-yet-loaded store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once the store has been rehydrated from the backing
    /// store (or explicitly populated).
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Drops the readiness flag so the next command rehydrates from the
    /// authoritative persisted snapshot.
    pub(crate) fn mark_unloaded(&mut self) {
        self.loaded = false;
    }

    pub(crate) fn dirty(&self) -> DirtyFlags {
        self.dirty
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty.clear();
    }

    // --- reads -----------------------------------------------------------

    /// Returns the tag collection.
    #[must_use]
    pub fn tags(&self) -> &Collection<Tag> {
        &self.tags
    }

    /// Returns the page collection.
    #[must_use]
    pub fn pages(&self) -> &Collection<Page> {
        &self.pages
    }

    /// Returns the tombstone ledger.
    #[must_use]
    pub fn tombstones(&self) -> &TombstoneLedger {
        &self.tombstones
    }

    /// Gets a tag by id.
    pub fn tag(&self, id: &str) -> CoreResult<&Tag> {
        self.tags.get(id).ok_or_else(|| CoreError::tag_not_found(id))
    }

    /// Gets a page by id.
    pub fn page(&self, id: &str) -> CoreResult<&Page> {
        self.pages
            .get(id)
            .ok_or_else(|| CoreError::page_not_found(id))
    }

    // --- tag mutations ---------------------------------------------------

    /// Creates a tag. Names must be non-blank and unique (case-insensitive).
    pub fn create_tag(&mut self, new: NewTag) -> CoreResult<&Tag> {
        let name = new.name.trim().to_string();
        if name.is_empty() {
            return Err(CoreError::validation("tag name must not be blank"));
        }
        if self
            .tags
            .values()
            .any(|t| t.name.eq_ignore_ascii_case(&name))
        {
            return Err(CoreError::duplicate_tag_name(name));
        }

        let now = Timestamp::now();
        let tag = Tag {
            id: Uuid::new_v4().to_string(),
            name,
            description: new.description,
            color: new.color,
            created_at: now,
            updated_at: now,
            deleted: false,
        };
        let id = tag.id.clone();
        self.tags.insert(tag);
        self.dirty.tags = true;
        Ok(self.tags.get(&id).unwrap_or_else(|| unreachable!()))
    }

    /// Applies a partial update to a tag.
    pub fn update_tag(&mut self, id: &str, patch: TagPatch) -> CoreResult<&Tag> {
        if let Some(name) = &patch.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(CoreError::validation("tag name must not be blank"));
            }
            if self
                .tags
                .values()
                .any(|t| t.id != id && t.name.eq_ignore_ascii_case(name))
            {
                return Err(CoreError::duplicate_tag_name(name));
            }
        }

        let tag = self
            .tags
            .get_mut(id)
            .ok_or_else(|| CoreError::tag_not_found(id))?;

        if let Some(name) = patch.name {
            tag.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            tag.description = Some(description);
        }
        if let Some(color) = patch.color {
            tag.color = Some(color);
        }
        tag.updated_at = tag.updated_at.advanced_to(Timestamp::now());
        self.dirty.tags = true;
        Ok(self.tags.get(id).unwrap_or_else(|| unreachable!()))
    }

    /// Deletes a tag, strips it from every page holding it, and records a
    /// tombstone in the same logical mutation.
    pub fn delete_tag(&mut self, id: &str) -> CoreResult<()> {
        if self.tags.remove(id).is_none() {
            return Err(CoreError::tag_not_found(id));
        }
        self.dirty.tags = true;

        let now = Timestamp::now();
        for page in self.pages.values_mut() {
            if page.tags.remove(id) {
                page.updated_at = page.updated_at.advanced_to(now);
                self.dirty.pages = true;
            }
        }

        self.tombstones.record(EntityKind::Tag, id);
        self.dirty.tombstones = true;
        Ok(())
    }

    // --- page mutations --------------------------------------------------

    /// Creates a page. The URL must be non-blank; every referenced tag id
    /// must exist.
    pub fn create_page(&mut self, new: NewPage) -> CoreResult<&Page> {
        let url = new.url.trim().to_string();
        if url.is_empty() {
            return Err(CoreError::validation("page url must not be blank"));
        }
        for tag_id in &new.tags {
            if !self.tags.contains(tag_id) {
                return Err(CoreError::tag_not_found(tag_id));
            }
        }

        let now = Timestamp::now();
        let title = if new.title.trim().is_empty() {
            url.clone()
        } else {
            new.title.trim().to_string()
        };
        let page = Page {
            id: Uuid::new_v4().to_string(),
            domain: domain_of(&url),
            url,
            title,
            tags: new.tags,
            created_at: now,
            updated_at: now,
            deleted: false,
            favicon: new.favicon,
            description: new.description,
        };
        let id = page.id.clone();
        self.pages.insert(page);
        self.dirty.pages = true;
        Ok(self.pages.get(&id).unwrap_or_else(|| unreachable!()))
    }

    /// Applies a partial update to a page.
    pub fn update_page(&mut self, id: &str, patch: PagePatch) -> CoreResult<&Page> {
        if let Some(tags) = &patch.tags {
            for tag_id in tags {
                if !self.tags.contains(tag_id) {
                    return Err(CoreError::tag_not_found(tag_id));
                }
            }
        }

        let page = self
            .pages
            .get_mut(id)
            .ok_or_else(|| CoreError::page_not_found(id))?;

        if let Some(title) = patch.title {
            page.title = title;
        }
        if let Some(tags) = patch.tags {
            page.tags = tags;
        }
        if let Some(favicon) = patch.favicon {
            page.favicon = Some(favicon);
        }
        if let Some(description) = patch.description {
            page.description = Some(description);
        }
        page.updated_at = page.updated_at.advanced_to(Timestamp::now());
        self.dirty.pages = true;
        Ok(self.pages.get(id).unwrap_or_else(|| unreachable!()))
    }

    /// Deletes a page and records a tombstone in the same logical mutation.
    pub fn delete_page(&mut self, id: &str) -> CoreResult<()> {
        if self.pages.remove(id).is_none() {
            return Err(CoreError::page_not_found(id));
        }
        self.dirty.pages = true;
        self.tombstones.record(EntityKind::Page, id);
        self.dirty.tombstones = true;
        Ok(())
    }

    /// Attaches a tag to a page. Idempotent.
    pub fn tag_page(&mut self, page_id: &str, tag_id: &str) -> CoreResult<&Page> {
        if !self.tags.contains(tag_id) {
            return Err(CoreError::tag_not_found(tag_id));
        }
        let page = self
            .pages
            .get_mut(page_id)
            .ok_or_else(|| CoreError::page_not_found(page_id))?;

        if page.tags.insert(tag_id.to_string()) {
            page.updated_at = page.updated_at.advanced_to(Timestamp::now());
            self.dirty.pages = true;
        }
        Ok(self.pages.get(page_id).unwrap_or_else(|| unreachable!()))
    }

    /// Detaches a tag from a page. Idempotent.
    pub fn untag_page(&mut self, page_id: &str, tag_id: &str) -> CoreResult<&Page> {
        let page = self
            .pages
            .get_mut(page_id)
            .ok_or_else(|| CoreError::page_not_found(page_id))?;

        if page.tags.remove(tag_id) {
            page.updated_at = page.updated_at.advanced_to(Timestamp::now());
            self.dirty.pages = true;
        }
        Ok(self.pages.get(page_id).unwrap_or_else(|| unreachable!()))
    }

    // --- sync integration ------------------------------------------------

    /// Replaces both collections with merged results, as one atomic
    /// in-memory swap per collection. Marks them dirty for the next commit.
    pub fn replace_collections(&mut self, tags: Collection<Tag>, pages: Collection<Page>) {
        self.tags = tags;
        self.pages = pages;
        self.dirty.tags = true;
        self.dirty.pages = true;
    }

    /// Clears a tombstone whose deletion the remote replica has confirmed.
    ///
    /// Returns true if the tombstone was pending.
    pub fn clear_tombstone(&mut self, tombstone: &Tombstone) -> bool {
        let cleared = self.tombstones.clear(tombstone);
        if cleared {
            self.dirty.tombstones = true;
        }
        cleared
    }

    /// Populates the store from a persisted snapshot and marks it loaded.
    pub(crate) fn restore(
        &mut self,
        tags: Collection<Tag>,
        pages: Collection<Page>,
        tombstones: TombstoneLedger,
    ) {
        self.tags = tags;
        self.pages = pages;
        self.tombstones = tombstones;
        self.dirty.clear();
        self.loaded = true;
    }
}
