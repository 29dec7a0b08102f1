use crate::error::{NotepadError, Result};
use crate::model::{JournalOp, Record};
use crate::store::{ItemStore, StorageBackend};

/// Move a record into the recycle bin.
///
/// The record stays searchable and restorable until the retention sweep
/// purges it. Archived records cannot be recycled; unarchive them first.
/// Recycling an already recycled record is a no-op and keeps the original
/// timestamp, so the retention window is not extended.
pub fn run<B: StorageBackend>(store: &mut ItemStore<B>, id: &str) -> Result<Record> {
    store.begin()?;
    let current = store.require(id)?;
    if current.is_archived() {
        return Err(NotepadError::InvalidState(format!(
            "record {} is archived and cannot be recycled",
            id
        )));
    }
    if current.is_recycled() {
        return Ok(current.clone());
    }

    let record = store.modify(id, |record, now| {
        record.recycled_at = Some(now);
        Ok(())
    })?;
    store.journal(JournalOp::Recycle, id, None);
    store.persist()?;
    Ok(record)
}
