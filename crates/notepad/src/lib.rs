//! # Notepad
//!
//! A multi-partition document store for an assistant's notes and tasks.
//! Records live in named drives, are searchable through an inverted index,
//! move through a recycle/archive lifecycle with a timed retention sweep, and
//! leave an audit journal behind. Writes can be mirrored to remote drives,
//! with an autosave queue replaying whatever failed.
//!
//! ## Layers
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  API (api.rs)                                                │
//! │  - Thin facade: dispatch, mirror to drives, emit one Change  │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Commands (commands/*.rs)            Tasks (tasks/)          │
//! │  - Record operations                 - Board, six-path write │
//! │  - Clamp, journal, persist           - Delta reconciliation  │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Drives (drives/) + Autosave (autosave.rs)                   │
//! │  - Local authoritative drive, HTTP remotes, retry queue      │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Storage (store/)                                            │
//! │  - StorageBackend trait: MemBackend (tests), FsBackend (disk)│
//! │  - ItemStore: records, artifacts, index, journal             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything from `api.rs` inward is synchronous. Async shows up only where
//! the network does: remote drives, the fan-out's background writes, the
//! autosave flusher and the retention sweeper.
//!
//! ## Module Overview
//!
//! - [`api`]: the facade
//! - [`commands`]: record operations
//! - [`tasks`]: task board service and conflict reconciler
//! - [`drives`]: drive adapters and the fan-out
//! - [`autosave`]: durable retry queue and flush triggers
//! - [`events`]: change notification
//! - [`retention`]: retention policy and the background sweeper
//! - [`store`]: storage backends and the item store
//! - [`clamp`]: bounded ingestion
//! - [`index`]: tokenizer, inverted index and ranking
//! - [`model`]: record, artifact and journal types
//! - [`config`]: configuration loading
//! - [`clock`]: injectable time
//! - [`logging`]: tracing subscriber setup
//! - [`error`]: error types

pub mod api;
pub mod autosave;
pub mod clamp;
pub mod clock;
pub mod commands;
pub mod config;
pub mod drives;
pub mod error;
pub mod events;
#[cfg(any(test, feature = "test_utils"))]
pub mod fixtures;
pub mod index;
pub mod logging;
pub mod model;
pub mod retention;
pub mod store;
pub mod tasks;

pub use api::NotepadApi;
pub use config::NotepadConfig;
pub use error::{NotepadError, Result};
