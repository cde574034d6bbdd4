//! # Tagstore Sync
//!
//! Merge engine and sync coordination for tagstore.
//!
//! This crate provides:
//! - A pure last-write-wins merge engine with tombstone tracking
//! - A replica transport abstraction (with mock and in-memory replicas)
//! - The sync coordinator: pull, merge, write back, push, confirm
//! - A background worker fed by the command pipeline's fire-and-forget
//!   trigger channel
//! - Retry with exponential backoff
//!
//! ## Architecture
//!
//! A sync cycle is **pull-then-push**:
//! 1. Pull the remote snapshot
//! 2. Merge it with the local snapshot and the tombstone ledger, wholly
//!    in memory
//! 3. Write the merged collections back through the entity store as one
//!    atomic replacement per collection
//! 4. Push local-only and locally-newer entities plus pending deletions
//! 5. Clear tombstones the remote has confirmed
//!
//! ## Key Invariants
//!
//! - Merging is deterministic, side-effect free, and idempotent
//! - A tombstoned id never reappears from a stale remote echo
//! - Remote failures never disturb local state; the next cycle retries
//! - Sync cycles are single-flight

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod coordinator;
mod error;
mod merge;
mod transport;
mod worker;

pub use config::RetryConfig;
pub use coordinator::{SyncCoordinator, SyncCycleResult, SyncState, SyncStats};
pub use error::{SyncError, SyncResult};
pub use merge::{merge_collection, merge_snapshots, MergedState};
pub use transport::{InMemoryReplica, MockReplica, PushAck, PushSet, RemoteSnapshot, ReplicaTransport};
pub use worker::SyncWorker;
