use crate::error::Result;
use crate::model::{JournalOp, Record};
use crate::store::{ItemStore, StorageBackend};
use tracing::info;

/// Purge every recycled record whose retention window has elapsed.
///
/// Returns the purged records. The snapshot is only written when something
/// was purged.
pub fn run<B: StorageBackend>(store: &mut ItemStore<B>) -> Result<Vec<Record>> {
    store.begin()?;
    let now = store.now();
    let retention = *store.retention();
    let expired: Vec<String> = store
        .records()
        .filter(|r| {
            r.recycled_at
                .is_some_and(|recycled_at| retention.is_expired(recycled_at, now))
        })
        .map(|r| r.id.clone())
        .collect();

    if expired.is_empty() {
        return Ok(Vec::new());
    }

    let mut purged = Vec::with_capacity(expired.len());
    for id in &expired {
        purged.push(store.purge_record(id)?);
        store.journal(JournalOp::Purge, id, Some("retention".to_string()));
    }
    store.persist()?;
    info!(purged = purged.len(), "retention sweep purged records");
    Ok(purged)
}
