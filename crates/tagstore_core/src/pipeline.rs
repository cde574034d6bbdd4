//! The durable command pipeline.
//!
//! Every externally-requested mutation runs through the same five steps,
//! in happens-before order: rehydrate, execute, commit, respond, and
//! async-propagate. The caller is told "done" only after the commit step
//! has made the whole dirty state durable.

use crate::entity::{NewPage, NewTag, PagePatch, TagPatch};
use crate::error::{CoreError, CoreResult};
use crate::snapshot;
use crate::store::EntityStore;
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::mpsc::Sender;
use tagstore_storage::KvBackend;
use tracing::{debug, warn};

/// Fire-and-forget message asking the sync worker to run a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTrigger;

/// A caller-facing operation: `{operation, payload}` on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "operation", content = "payload", rename_all = "camelCase")]
pub enum Command {
    /// Creates a tag.
    CreateTag(NewTag),
    /// Partially updates a tag.
    UpdateTag {
        /// Tag id.
        id: String,
        /// Fields to change.
        patch: TagPatch,
    },
    /// Deletes a tag and records a tombstone.
    DeleteTag {
        /// Tag id.
        id: String,
    },
    /// Creates a page.
    CreatePage(NewPage),
    /// Partially updates a page.
    UpdatePage {
        /// Page id.
        id: String,
        /// Fields to change.
        patch: PagePatch,
    },
    /// Deletes a page and records a tombstone.
    DeletePage {
        /// Page id.
        id: String,
    },
    /// Attaches a tag to a page.
    TagPage {
        /// Page id.
        page_id: String,
        /// Tag id.
        tag_id: String,
    },
    /// Detaches a tag from a page.
    UntagPage {
        /// Page id.
        page_id: String,
        /// Tag id.
        tag_id: String,
    },
    /// Lists all tags.
    ListTags,
    /// Lists all pages.
    ListPages,
    /// Gets one tag.
    GetTag {
        /// Tag id.
        id: String,
    },
    /// Gets one page.
    GetPage {
        /// Page id.
        id: String,
    },
}

impl Command {
    /// Returns true if this command mutates state (and therefore commits
    /// and triggers sync propagation).
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            Command::ListTags | Command::ListPages | Command::GetTag { .. } | Command::GetPage { .. }
        )
    }
}

/// The caller-facing result of a command: `{success, data?, error?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    /// Whether the command was executed and (for mutations) durably
    /// committed.
    pub success: bool,
    /// Payload for successful commands that return data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Error message for failed commands.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResponse {
    /// A successful response.
    #[must_use]
    pub fn ok(data: Option<Value>) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    /// A failed response carrying the error message.
    #[must_use]
    pub fn failed(error: &CoreError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
        }
    }
}

/// Executes commands with a durability guarantee that survives abrupt
/// process termination between calls.
///
/// The store mutex serializes the whole rehydrate-execute-commit sequence,
/// so two overlapping commands can never interleave into a lost update.
///
/// # Guarantee
///
/// If the commit step completes, the mutation is durable. If the process
/// dies earlier, the operation is lost and must be retried by the caller -
/// at-most-once, with no operation log or replay.
pub struct CommandPipeline<B: KvBackend> {
    backend: Mutex<B>,
    store: Mutex<EntityStore>,
    sync_tx: Mutex<Option<Sender<SyncTrigger>>>,
}

impl<B: KvBackend> CommandPipeline<B> {
    /// Creates a pipeline over a backing store. The entity store starts
    /// cold and is rehydrated on first use.
    pub fn new(backend: B) -> Self {
        Self {
            backend: Mutex::new(backend),
            store: Mutex::new(EntityStore::new()),
            sync_tx: Mutex::new(None),
        }
    }

    /// Wires up the sync worker's trigger channel.
    ///
    /// Until this is called, successful mutations simply skip the
    /// propagation step.
    pub fn set_sync_trigger(&self, sender: Sender<SyncTrigger>) {
        *self.sync_tx.lock() = Some(sender);
    }

    /// Executes one command and returns the caller-facing response.
    ///
    /// Local-path errors (validation, business-rule, persistence) are
    /// reported synchronously in the response. Sync propagation is fired
    /// after a successful mutating commit and its outcome is invisible to
    /// the caller.
    pub fn execute(&self, command: Command) -> CommandResponse {
        let is_mutation = command.is_mutation();
        match self.run(command) {
            Ok(data) => {
                if is_mutation {
                    self.fire_sync_trigger();
                }
                CommandResponse::ok(data)
            }
            Err(e) => CommandResponse::failed(&e),
        }
    }

    fn run(&self, command: Command) -> CoreResult<Option<Value>> {
        let mut store = self.store.lock();

        // Rehydrate: a no-op when the store is already warm.
        if !store.is_loaded() {
            let backend = self.backend.lock();
            snapshot::rehydrate(&mut store, &*backend)?;
            debug!(
                tags = store.tags().len(),
                pages = store.pages().len(),
                "rehydrated entity store"
            );
        }

        // Execute: a rejected command returns here with zero writes.
        let data = dispatch(&mut store, command)?;

        // Commit: the durability barrier. Nothing-dirty commits write
        // nothing, so read commands never touch the backend.
        let mut backend = self.backend.lock();
        if let Err(e) = snapshot::commit(&mut store, &mut *backend) {
            // Memory mutated but the persisted view is authoritative;
            // force the next command to rehydrate from it.
            store.mark_unloaded();
            return Err(e);
        }

        Ok(data)
    }

    /// Runs a closure against the rehydrated store and commits whatever it
    /// dirtied, under the same single-flight guard commands use.
    ///
    /// This is the hook the sync coordinator writes merged results through.
    pub fn with_store<F, R>(&self, f: F) -> CoreResult<R>
    where
        F: FnOnce(&mut EntityStore) -> CoreResult<R>,
    {
        let mut store = self.store.lock();
        if !store.is_loaded() {
            let backend = self.backend.lock();
            snapshot::rehydrate(&mut store, &*backend)?;
        }

        let result = f(&mut store)?;

        let mut backend = self.backend.lock();
        if let Err(e) = snapshot::commit(&mut store, &mut *backend) {
            store.mark_unloaded();
            return Err(e);
        }
        Ok(result)
    }

    /// Direct access to the backing store, for tests and maintenance
    /// tooling.
    pub fn backend(&self) -> MutexGuard<'_, B> {
        self.backend.lock()
    }

    fn fire_sync_trigger(&self) {
        if let Some(sender) = &*self.sync_tx.lock() {
            // Failures here must never reach the caller; the next
            // successful mutation or periodic cycle will catch up.
            if sender.send(SyncTrigger).is_err() {
                warn!("sync worker is gone; dropping sync trigger");
            }
        }
    }
}

fn dispatch(store: &mut EntityStore, command: Command) -> CoreResult<Option<Value>> {
    match command {
        Command::CreateTag(new) => Ok(Some(serde_json::to_value(store.create_tag(new)?)?)),
        Command::UpdateTag { id, patch } => {
            Ok(Some(serde_json::to_value(store.update_tag(&id, patch)?)?))
        }
        Command::DeleteTag { id } => {
            store.delete_tag(&id)?;
            Ok(None)
        }
        Command::CreatePage(new) => Ok(Some(serde_json::to_value(store.create_page(new)?)?)),
        Command::UpdatePage { id, patch } => {
            Ok(Some(serde_json::to_value(store.update_page(&id, patch)?)?))
        }
        Command::DeletePage { id } => {
            store.delete_page(&id)?;
            Ok(None)
        }
        Command::TagPage { page_id, tag_id } => Ok(Some(serde_json::to_value(
            store.tag_page(&page_id, &tag_id)?,
        )?)),
        Command::UntagPage { page_id, tag_id } => Ok(Some(serde_json::to_value(
            store.untag_page(&page_id, &tag_id)?,
        )?)),
        Command::ListTags => {
            let tags: Vec<_> = store.tags().values().collect();
            Ok(Some(serde_json::to_value(tags)?))
        }
        Command::ListPages => {
            let pages: Vec<_> = store.pages().values().collect();
            Ok(Some(serde_json::to_value(pages)?))
        }
        Command::GetTag { id } => Ok(Some(serde_json::to_value(store.tag(&id)?)?)),
        Command::GetPage { id } => Ok(Some(serde_json::to_value(store.page(&id)?)?)),
    }
}
