use crate::clamp::RecordDraft;
use crate::error::Result;
use crate::model::{Drive, JournalOp, Record};
use crate::store::{ItemStore, StorageBackend};
use uuid::Uuid;

/// Create a record from a draft. The draft is clamped first; creation never
/// fails on oversized input. Drafts aimed at the archive drive are created
/// already archived.
pub fn run<B: StorageBackend>(store: &mut ItemStore<B>, draft: RecordDraft) -> Result<Record> {
    store.begin()?;
    let draft = store.limits().clamp_draft(draft);
    let now = store.now();
    let archived = draft.drive == Drive::Archive;

    let record = Record {
        id: Uuid::new_v4().to_string(),
        drive: draft.drive,
        title: draft.title,
        utterance: draft.utterance,
        tags: draft.tags,
        meta: draft.meta,
        created: now,
        updated: now,
        recycled_at: None,
        archived_at: archived.then_some(now),
        archived_from: archived.then_some(Drive::Working),
        outcome: None,
    };

    store.put_record(record.clone());
    store.journal(JournalOp::Create, &record.id, None);
    store.persist()?;
    Ok(record)
}
