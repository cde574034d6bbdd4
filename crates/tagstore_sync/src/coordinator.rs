//! The sync coordinator: drives pull-merge-push cycles against a replica.

use crate::config::RetryConfig;
use crate::error::{SyncError, SyncResult};
use crate::merge::merge_snapshots;
use crate::transport::{PushSet, RemoteSnapshot, ReplicaTransport};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tagstore_core::{CommandPipeline, Entity, EntityStore, Tombstone};
use tagstore_storage::KvBackend;
use tracing::{debug, info, warn};

/// Where the coordinator is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    /// No cycle has run yet, or the last one is long finished.
    Idle,
    /// Fetching the remote snapshot.
    Pulling,
    /// Reconciling and committing the merged result locally.
    Merging,
    /// Sending local changes upstream.
    Pushing,
    /// The last cycle completed.
    Synced,
    /// The last cycle failed.
    Error(String),
}

/// Running totals across cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Cycles that ran to completion.
    pub cycles_completed: u64,
    /// Cycles that failed (each retry attempt counts separately).
    pub cycles_failed: u64,
    /// Entities sent upstream.
    pub entities_pushed: u64,
    /// Deletions the remote confirmed.
    pub deletions_confirmed: u64,
    /// Message of the most recent failure.
    pub last_error: Option<String>,
}

/// What one completed cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncCycleResult {
    /// Entities sent upstream.
    pub pushed_entities: usize,
    /// Deletions sent upstream.
    pub pushed_deletions: usize,
    /// Tombstones cleared on the remote's acknowledgment.
    pub confirmed_deletions: usize,
    /// Tombstones cleared without a push because the remote had already
    /// forgotten the id.
    pub cleared_without_push: usize,
}

/// Runs sync cycles against a remote replica.
///
/// Each cycle pulls the remote snapshot, merges it with local state under
/// the pipeline's single-flight guard, commits the merged result, pushes
/// local-only and locally-newer entities plus pending deletions, and
/// clears whatever tombstones the remote acknowledged.
///
/// Cycles are single-flight: a second caller gets
/// [`SyncError::AlreadyRunning`] instead of a concurrent cycle.
pub struct SyncCoordinator<B: KvBackend, T: ReplicaTransport> {
    pipeline: Arc<CommandPipeline<B>>,
    transport: T,
    retry: RetryConfig,
    in_flight: AtomicBool,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
}

impl<B: KvBackend, T: ReplicaTransport> SyncCoordinator<B, T> {
    /// Creates a coordinator over a shared pipeline and a transport.
    pub fn new(pipeline: Arc<CommandPipeline<B>>, transport: T) -> Self {
        Self {
            pipeline,
            transport,
            retry: RetryConfig::default(),
            in_flight: AtomicBool::new(false),
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// Replaces the retry configuration.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SyncState {
        self.state.read().clone()
    }

    /// Returns a copy of the running totals.
    #[must_use]
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns true while a cycle is in flight.
    #[must_use]
    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Runs one sync cycle.
    pub fn sync(&self) -> SyncResult<SyncCycleResult> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SyncError::AlreadyRunning);
        }
        let _guard = InFlightGuard(&self.in_flight);

        match self.run_cycle() {
            Ok(result) => {
                *self.state.write() = SyncState::Synced;
                let mut stats = self.stats.write();
                stats.cycles_completed += 1;
                stats.entities_pushed += result.pushed_entities as u64;
                stats.deletions_confirmed += result.confirmed_deletions as u64;
                info!(
                    pushed = result.pushed_entities,
                    deletions = result.pushed_deletions,
                    "sync cycle completed"
                );
                Ok(result)
            }
            Err(e) => {
                *self.state.write() = SyncState::Error(e.to_string());
                let mut stats = self.stats.write();
                stats.cycles_failed += 1;
                stats.last_error = Some(e.to_string());
                warn!(error = %e, "sync cycle failed");
                Err(e)
            }
        }
    }

    /// Runs sync cycles until one succeeds or the retry budget for
    /// transient failures is exhausted.
    pub fn sync_with_retry(&self) -> SyncResult<SyncCycleResult> {
        let mut last_error = SyncError::Protocol("retry budget is zero".into());
        for attempt in 0..self.retry.max_attempts {
            let delay = self.retry.delay_for_attempt(attempt);
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }

            match self.sync() {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() => {
                    debug!(attempt, error = %e, "retrying sync");
                    last_error = e;
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error)
    }

    fn run_cycle(&self) -> SyncResult<SyncCycleResult> {
        *self.state.write() = SyncState::Pulling;
        if !self.transport.is_connected() {
            return Err(SyncError::NotConnected);
        }
        let remote = self.transport.fetch_snapshot()?;

        // Merge and commit under the same guard commands run under, so a
        // command can never interleave with the replacement.
        *self.state.write() = SyncState::Merging;
        let (push, cleared_without_push) = self
            .pipeline
            .with_store(|store| Ok(reconcile(store, &remote)))?;

        *self.state.write() = SyncState::Pushing;
        let mut result = SyncCycleResult {
            pushed_entities: push.entity_count(),
            pushed_deletions: push.deletions.len(),
            cleared_without_push,
            ..SyncCycleResult::default()
        };
        if push.is_empty() {
            return Ok(result);
        }

        let ack = self.transport.push_changes(&push)?;
        if !ack.confirmed_deletions.is_empty() {
            result.confirmed_deletions = self.pipeline.with_store(|store| {
                let mut cleared = 0;
                for tombstone in &ack.confirmed_deletions {
                    if store.clear_tombstone(tombstone) {
                        cleared += 1;
                    }
                }
                Ok(cleared)
            })?;
        }
        Ok(result)
    }
}

/// Resets the single-flight flag when the cycle unwinds, error paths
/// included.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Merges the remote snapshot into the store and computes what to push.
///
/// The push set holds entities the remote lacks or holds a strictly older
/// version of, plus deletions for tombstoned ids the remote still has.
/// Tombstones for ids the remote has already forgotten are cleared here,
/// with nothing to push.
fn reconcile(store: &mut EntityStore, remote: &RemoteSnapshot) -> (PushSet, usize) {
    let merged = merge_snapshots(
        store.tags(),
        store.pages(),
        &remote.tags,
        &remote.pages,
        store.tombstones(),
    );

    let mut push = PushSet::default();
    for tag in merged.tags.values() {
        let stale = match remote.tags.get(tag.id()) {
            None => true,
            Some(theirs) => theirs.updated_at() < tag.updated_at(),
        };
        if stale {
            push.tags.push(tag.clone());
        }
    }
    for page in merged.pages.values() {
        let stale = match remote.pages.get(page.id()) {
            None => true,
            Some(theirs) => theirs.updated_at() < page.updated_at(),
        };
        if stale {
            push.pages.push(page.clone());
        }
    }

    let mut already_gone: Vec<Tombstone> = Vec::new();
    for tombstone in store.tombstones().iter() {
        if remote.contains(tombstone.kind, &tombstone.id) {
            push.deletions.push(tombstone.clone());
        } else {
            already_gone.push(tombstone.clone());
        }
    }

    let cleared = already_gone.len();
    for tombstone in &already_gone {
        store.clear_tombstone(tombstone);
    }

    store.replace_collections(merged.tags, merged.pages);
    (push, cleared)
}
