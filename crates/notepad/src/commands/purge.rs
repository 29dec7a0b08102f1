use crate::error::Result;
use crate::model::{JournalOp, Record};
use crate::store::{ItemStore, StorageBackend};

/// Permanently delete a record, its artifacts and its index entries.
///
/// Works on records in any state. There is no undo.
pub fn run<B: StorageBackend>(store: &mut ItemStore<B>, id: &str) -> Result<Record> {
    store.begin()?;
    let record = store.purge_record(id)?;
    store.journal(JournalOp::Purge, id, None);
    store.persist()?;
    Ok(record)
}
