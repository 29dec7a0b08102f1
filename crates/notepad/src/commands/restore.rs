use crate::error::Result;
use crate::model::{JournalOp, Record};
use crate::store::{ItemStore, StorageBackend};

/// Take a record out of the recycle bin. A record that is not recycled is
/// returned unchanged.
pub fn run<B: StorageBackend>(store: &mut ItemStore<B>, id: &str) -> Result<Record> {
    store.begin()?;
    let current = store.require(id)?;
    if !current.is_recycled() {
        return Ok(current.clone());
    }

    let record = store.modify(id, |record, _now| {
        record.recycled_at = None;
        Ok(())
    })?;
    store.journal(JournalOp::Restore, id, None);
    store.persist()?;
    Ok(record)
}
