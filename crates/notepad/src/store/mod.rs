//! # Storage Layer
//!
//! Two levels live here:
//!
//! 1. **Substrate**: [`backend::StorageBackend`], a flat key/value space of
//!    JSON documents, with [`mem_backend::MemBackend`] for tests and
//!    [`fs_backend::FsBackend`] for disk.
//! 2. **Item store**: [`item_store::ItemStore`], the in-memory records,
//!    artifacts, search index and journal, persisted as one snapshot document.
//!
//! ## One Document per Concern
//!
//! Each logical concern owns one key:
//!
//! ```text
//! notepad/state              # item store snapshot (items, artifacts, index, journal, active id)
//! drive/<path-hint or id>    # local drive adapter writes
//! autosave/latest            # newest payload per (kind, id)
//! autosave/queue             # retry queue
//! autosave/dead              # entries that ran out of attempts
//! tasks/board                # task board (via the local drive: drive/tasks/board)
//! tasks/deltas/<stamp>       # step deltas awaiting reconciliation
//! ```
//!
//! ## Snapshot Persistence
//!
//! The item store rewrites its whole snapshot after every mutation. That is
//! O(n) per write and is the ceiling on store size. It stays fine for the
//! hundreds to low thousands of records an assistant's notepad holds.
//!
//! ## Other Writers
//!
//! The snapshot carries a `generation` counter. Before mutating, the store
//! compares it with the stored one and reloads if another process wrote in
//! between. This narrows, but does not close, the read-modify-write window;
//! one writer at a time per store is the supported mode.

pub mod backend;
pub mod fs_backend;
pub mod item_store;
pub mod mem_backend;

pub use backend::{StorageBackend, StorageBackendExt};
pub use fs_backend::FsBackend;
pub use item_store::{ItemStore, StoreState, STATE_KEY};
pub use mem_backend::MemBackend;
