use crate::model::{Record, RecordFilter};
use crate::store::{ItemStore, StorageBackend};

pub fn run<B: StorageBackend>(store: &ItemStore<B>, id: &str) -> Option<Record> {
    store.get(id).cloned()
}

/// Records matching `filter`, most recently updated first.
pub fn list<B: StorageBackend>(store: &ItemStore<B>, filter: &RecordFilter) -> Vec<Record> {
    let mut records: Vec<Record> = store
        .records()
        .filter(|r| filter.matches(r))
        .cloned()
        .collect();
    records.sort_by(|a, b| b.updated.cmp(&a.updated).then_with(|| a.id.cmp(&b.id)));
    records
}
