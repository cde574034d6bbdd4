//! The merge engine: pure last-write-wins reconciliation with tombstones.
//!
//! Reconciles two independently-evolved snapshots of one entity-type
//! collection, given the set of locally-pending deletions. Deterministic,
//! side-effect free, and idempotent: merging the merged result against the
//! same remote snapshot again changes nothing.

use std::collections::BTreeSet;
use tagstore_core::{Collection, Entity, EntityKind, Page, Tag, TombstoneLedger};

/// The result of merging both entity collections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedState {
    /// Merged tag collection.
    pub tags: Collection<Tag>,
    /// Merged page collection.
    pub pages: Collection<Page>,
}

/// Merges one entity-type collection.
///
/// For every id in the union of local and remote keys:
/// - tombstoned → excluded, whether or not the remote still echoes it
///   (anti-resurrection; the remote entity's own `deleted` flag is
///   irrelevant)
/// - remote-only, flagged deleted → excluded (remote delete propagates)
/// - remote-only, live → included from remote (newly learned)
/// - local-only → included from local (unsynced local creation; kept even
///   without a tombstone)
/// - in both, remote flagged deleted → excluded (remote delete wins over
///   any local edit)
/// - in both, both live → the version with the larger `updated_at` wins;
///   an exact tie goes to local
pub fn merge_collection<T: Entity + Clone>(
    local: &Collection<T>,
    remote: &Collection<T>,
    tombstones: &TombstoneLedger,
    kind: EntityKind,
) -> Collection<T> {
    let ids: BTreeSet<&str> = local.ids().chain(remote.ids()).collect();

    let mut merged = Collection::new();
    for id in ids {
        if tombstones.is_pending(kind, id) {
            // Locally deleted and unconfirmed: a remote echo here is
            // stale or racing, not a revival.
            continue;
        }

        match (local.get(id), remote.get(id)) {
            (None, Some(theirs)) => {
                if !theirs.is_deleted() {
                    merged.insert(theirs.clone());
                }
            }
            (Some(ours), None) => {
                merged.insert(ours.clone());
            }
            (Some(ours), Some(theirs)) => {
                if theirs.is_deleted() {
                    continue;
                }
                let winner = if theirs.updated_at() > ours.updated_at() {
                    theirs
                } else {
                    ours
                };
                merged.insert(winner.clone());
            }
            (None, None) => unreachable!("id came from the union of both key sets"),
        }
    }
    merged
}

/// Merges both entity-type collections against a remote snapshot.
pub fn merge_snapshots(
    local_tags: &Collection<Tag>,
    local_pages: &Collection<Page>,
    remote_tags: &Collection<Tag>,
    remote_pages: &Collection<Page>,
    tombstones: &TombstoneLedger,
) -> MergedState {
    MergedState {
        tags: merge_collection(local_tags, remote_tags, tombstones, EntityKind::Tag),
        pages: merge_collection(local_pages, remote_pages, tombstones, EntityKind::Page),
    }
}
