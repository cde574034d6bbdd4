//! # Tagstore Storage
//!
//! Backing store trait and implementations for tagstore.
//!
//! This crate provides the lowest-level storage abstraction for tagstore.
//! Backends are **opaque key-value stores** - they do not interpret the
//! values they hold.
//!
//! ## Design Principles
//!
//! - Backends are simple key-value stores (get, set, remove)
//! - No knowledge of tagstore snapshot formats or entity shapes
//! - Read-after-write consistent within a process lifetime
//! - Must be `Send + Sync` for concurrent access
//!
//! ## Available Backends
//!
//! - [`MemoryBackend`] - For testing and ephemeral storage
//! - [`FileBackend`] - For persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use tagstore_storage::{KvBackend, MemoryBackend};
//!
//! let mut backend = MemoryBackend::new();
//! backend.set("greeting", b"hello world").unwrap();
//! let value = backend.get("greeting").unwrap();
//! assert_eq!(value.as_deref(), Some(&b"hello world"[..]));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::KvBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::MemoryBackend;
