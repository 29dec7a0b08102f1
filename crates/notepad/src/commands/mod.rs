//! # Command Layer
//!
//! One module per item-store operation. Each command is a plain function over
//! `&mut ItemStore<B>` (or `&ItemStore<B>` for reads) that returns domain
//! types, not messages.
//!
//! ## Shape of a Mutating Command
//!
//! 1. `begin()`: pick up another writer's snapshot and take a checkpoint.
//! 2. Clamp input, validate the lifecycle transition.
//! 3. Apply through the store primitives (`put_record`, `modify`,
//!    `purge_record`) so the search index is always rebuilt with the record.
//! 4. Append one journal entry.
//! 5. `persist()`. A failed write rolls the store back to the checkpoint.
//!
//! Commands never mirror to drives or notify subscribers; that is the
//! facade's job ([`crate::api`]).
//!
//! ## Testing Strategy
//!
//! Command tests run against `MemBackend` with a `ManualClock`. This is where
//! most of the behavioural coverage lives.
//!
//! ## Command Modules
//!
//! - [`create`]: create a record
//! - [`update`]: patch title, body, tags, drive or metadata
//! - [`artifacts`]: attach and list artifacts
//! - [`outcome`]: record a success/failure outcome
//! - [`recycle`]: soft-delete into the recycle bin
//! - [`restore`]: take a record back out of the recycle bin
//! - [`purge`]: irreversible delete
//! - [`archive`]: move into, and back out of, the archive drive
//! - [`get`]: fetch one record or list with a filter
//! - [`search`]: ranked keyword search
//! - [`active`]: the active-record pointer
//! - [`export`]: state export and `.tar.gz` archive
//! - [`sweep`]: retention purge of expired recycled records

pub mod active;
pub mod archive;
pub mod artifacts;
pub mod create;
pub mod export;
pub mod get;
pub mod outcome;
pub mod purge;
pub mod recycle;
pub mod restore;
pub mod search;
pub mod sweep;
pub mod update;

#[cfg(test)]
pub(crate) mod testing {
    use crate::clamp::Limits;
    use crate::clock::ManualClock;
    use crate::retention::Retention;
    use crate::store::{ItemStore, MemBackend};
    use std::sync::Arc;

    pub fn make_store() -> (ItemStore<MemBackend>, Arc<ManualClock>) {
        make_store_with(Limits::default(), Retention::default())
    }

    pub fn make_store_with(
        limits: Limits,
        retention: Retention,
    ) -> (ItemStore<MemBackend>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let store =
            ItemStore::open(Arc::new(MemBackend::new()), clock.clone(), limits, retention)
                .unwrap();
        (store, clock)
    }
}
