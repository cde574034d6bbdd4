//! # Tagstore Core
//!
//! Core data layer for tagstore: a local-first tagging datastore.
//!
//! This crate provides:
//! - Entity model (tags and tagged pages) with millisecond timestamps
//! - Tombstone ledger tracking locally-confirmed deletions
//! - In-memory entity store with dirty tracking
//! - Whole-snapshot persistence over a key-value backing store
//! - The durable command pipeline (rehydrate, execute, commit, respond,
//!   async-propagate)
//!
//! ## Durability Guarantee
//!
//! A caller is told an operation succeeded only after the whole dirty state
//! has been written to the backing store. If the hosting process dies before
//! the commit step, the operation is simply lost and must be retried - the
//! persisted view is always the authoritative one.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collection;
mod entity;
mod error;
mod pipeline;
mod snapshot;
mod store;
mod tombstone;
mod types;

pub use collection::Collection;
pub use entity::{Entity, NewPage, NewTag, Page, PagePatch, Tag, TagPatch};
pub use error::{CoreError, CoreResult};
pub use pipeline::{Command, CommandPipeline, CommandResponse, SyncTrigger};
pub use snapshot::{Snapshot, PAGES_KEY, TAGS_KEY, TOMBSTONES_KEY};
pub use store::EntityStore;
pub use tombstone::{Tombstone, TombstoneLedger};
pub use types::{EntityKind, Timestamp};
