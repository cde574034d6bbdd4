//! Replica transport abstraction for sync exchanges.

use crate::error::{SyncError, SyncResult};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tagstore_core::{Collection, EntityKind, Page, Tag, Tombstone};

/// A snapshot of the remote replica's entity collections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteSnapshot {
    /// Remote tag collection.
    #[serde(default)]
    pub tags: Collection<Tag>,
    /// Remote page collection.
    #[serde(default)]
    pub pages: Collection<Page>,
}

impl RemoteSnapshot {
    /// Returns true if the snapshot holds an entity of the given kind and id.
    #[must_use]
    pub fn contains(&self, kind: EntityKind, id: &str) -> bool {
        match kind {
            EntityKind::Tag => self.tags.contains(id),
            EntityKind::Page => self.pages.contains(id),
        }
    }
}

/// Local changes pushed upstream: local-only or locally-newer entities,
/// plus pending deletions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PushSet {
    /// Tags to upsert on the remote.
    #[serde(default)]
    pub tags: Vec<Tag>,
    /// Pages to upsert on the remote.
    #[serde(default)]
    pub pages: Vec<Page>,
    /// Deletions the remote should apply.
    #[serde(default)]
    pub deletions: Vec<Tombstone>,
}

impl PushSet {
    /// Returns true if there is nothing to push.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.pages.is_empty() && self.deletions.is_empty()
    }

    /// Returns the number of entities (not deletions) in the set.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.tags.len() + self.pages.len()
    }
}

/// The remote's acknowledgment of a push.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PushAck {
    /// Deletions the remote confirmed applying. The coordinator clears
    /// the corresponding tombstones.
    #[serde(default)]
    pub confirmed_deletions: Vec<Tombstone>,
}

/// Handles the network exchange with the remote replica.
///
/// This trait abstracts the wire, allowing different implementations
/// (HTTP, an extension messaging port, mocks for testing). Framing between
/// the caller and this process is out of scope; implementations get the
/// already-decoded snapshot and push shapes.
pub trait ReplicaTransport: Send + Sync {
    /// Pulls the remote replica's current snapshot.
    fn fetch_snapshot(&self) -> SyncResult<RemoteSnapshot>;

    /// Pushes local changes upstream and returns the acknowledgment.
    fn push_changes(&self, push: &PushSet) -> SyncResult<PushAck>;

    /// Returns true if the transport can currently reach the remote.
    fn is_connected(&self) -> bool;
}

impl<T: ReplicaTransport + ?Sized> ReplicaTransport for std::sync::Arc<T> {
    fn fetch_snapshot(&self) -> SyncResult<RemoteSnapshot> {
        (**self).fetch_snapshot()
    }

    fn push_changes(&self, push: &PushSet) -> SyncResult<PushAck> {
        (**self).push_changes(push)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}

/// A scripted transport for testing the coordinator.
#[derive(Debug, Default)]
pub struct MockReplica {
    connected: AtomicBool,
    snapshots: Mutex<VecDeque<RemoteSnapshot>>,
    acks: Mutex<VecDeque<PushAck>>,
    pushes: Mutex<Vec<PushSet>>,
    fetch_calls: AtomicU64,
}

impl MockReplica {
    /// Creates a connected mock with no scripted responses.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            ..Self::default()
        }
    }

    /// Queues a snapshot to serve on the next fetch. The last queued
    /// snapshot is re-served once the queue runs dry.
    pub fn queue_snapshot(&self, snapshot: RemoteSnapshot) {
        self.snapshots.lock().push_back(snapshot);
    }

    /// Queues an acknowledgment for the next push. When none is queued,
    /// pushes are acknowledged with every requested deletion confirmed.
    pub fn queue_ack(&self, ack: PushAck) {
        self.acks.lock().push_back(ack);
    }

    /// Sets the connected state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Returns every push the coordinator sent.
    #[must_use]
    pub fn pushes(&self) -> Vec<PushSet> {
        self.pushes.lock().clone()
    }

    /// Returns how many times a snapshot was fetched.
    #[must_use]
    pub fn fetch_calls(&self) -> u64 {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

impl ReplicaTransport for MockReplica {
    fn fetch_snapshot(&self) -> SyncResult<RemoteSnapshot> {
        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        let mut snapshots = self.snapshots.lock();
        if snapshots.len() > 1 {
            Ok(snapshots.pop_front().unwrap_or_default())
        } else {
            snapshots.front().cloned().ok_or_else(|| {
                SyncError::Protocol("no mock snapshot queued".into())
            })
        }
    }

    fn push_changes(&self, push: &PushSet) -> SyncResult<PushAck> {
        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }
        self.pushes.lock().push(push.clone());

        match self.acks.lock().pop_front() {
            Some(ack) => Ok(ack),
            None => Ok(PushAck {
                confirmed_deletions: push.deletions.clone(),
            }),
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// A real in-process replica for integration tests.
///
/// Holds its own collections, serves them as snapshots, and applies
/// pushed upserts and deletions, so multi-cycle convergence can be
/// exercised without a network.
#[derive(Debug, Default)]
pub struct InMemoryReplica {
    state: RwLock<RemoteSnapshot>,
}

impl InMemoryReplica {
    /// Creates an empty replica.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a replica pre-seeded with remote state.
    #[must_use]
    pub fn with_state(snapshot: RemoteSnapshot) -> Self {
        Self {
            state: RwLock::new(snapshot),
        }
    }

    /// Returns a copy of the replica's current state.
    #[must_use]
    pub fn state(&self) -> RemoteSnapshot {
        self.state.read().clone()
    }

    /// Mutates the replica's state directly, simulating another writer.
    pub fn mutate<F: FnOnce(&mut RemoteSnapshot)>(&self, f: F) {
        f(&mut self.state.write());
    }
}

impl ReplicaTransport for InMemoryReplica {
    fn fetch_snapshot(&self) -> SyncResult<RemoteSnapshot> {
        Ok(self.state())
    }

    fn push_changes(&self, push: &PushSet) -> SyncResult<PushAck> {
        let mut state = self.state.write();
        for tag in &push.tags {
            state.tags.insert(tag.clone());
        }
        for page in &push.pages {
            state.pages.insert(page.clone());
        }
        // Deletions flag rather than remove, so replicas that still hold
        // a live copy see the delete instead of a missing id they would
        // treat as their own unsynced creation.
        for deletion in &push.deletions {
            match deletion.kind {
                EntityKind::Tag => {
                    if let Some(tag) = state.tags.get_mut(&deletion.id) {
                        tag.deleted = true;
                    }
                }
                EntityKind::Page => {
                    if let Some(page) = state.pages.get_mut(&deletion.id) {
                        page.deleted = true;
                    }
                }
            }
        }
        Ok(PushAck {
            confirmed_deletions: push.deletions.clone(),
        })
    }

    fn is_connected(&self) -> bool {
        true
    }
}
