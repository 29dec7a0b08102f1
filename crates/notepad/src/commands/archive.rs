use crate::error::{NotepadError, Result};
use crate::model::{Drive, JournalOp, Record};
use crate::store::{ItemStore, StorageBackend};

/// Move a record into [`Drive::Archive`], remembering where it came from.
///
/// Recycled records cannot be archived; restore them first. Archiving an
/// archived record is a no-op.
pub fn run<B: StorageBackend>(store: &mut ItemStore<B>, id: &str) -> Result<Record> {
    store.begin()?;
    let current = store.require(id)?;
    if current.is_recycled() {
        return Err(NotepadError::InvalidState(format!(
            "record {} is in the recycle bin and cannot be archived",
            id
        )));
    }
    if current.is_archived() {
        return Ok(current.clone());
    }

    let record = store.modify(id, |record, now| {
        record.archived_from = Some(record.drive);
        record.drive = Drive::Archive;
        record.archived_at = Some(now);
        Ok(())
    })?;
    let from = record.archived_from.unwrap_or_default();
    store.journal(JournalOp::Archive, id, Some(format!("from {}", from)));
    store.persist()?;
    Ok(record)
}

/// Move an archived record back to the drive it was archived from.
pub fn unarchive<B: StorageBackend>(store: &mut ItemStore<B>, id: &str) -> Result<Record> {
    store.begin()?;
    let current = store.require(id)?;
    if !current.is_archived() {
        return Err(NotepadError::InvalidState(format!(
            "record {} is not archived",
            id
        )));
    }

    let record = store.modify(id, |record, _now| {
        record.drive = record
            .archived_from
            .take()
            .filter(|d| *d != Drive::Archive)
            .unwrap_or_default();
        record.archived_at = None;
        Ok(())
    })?;
    store.journal(JournalOp::Restore, id, Some("unarchived".to_string()));
    store.persist()?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clamp::RecordDraft;
    use crate::commands::testing::make_store;
    use crate::commands::{create, get, recycle};
    use crate::model::{RecordFilter, RecordStatus, StatusFilter};

    #[test]
    fn archives_into_archive_drive() {
        let (mut store, _) = make_store();
        let record = create::run(
            &mut store,
            RecordDraft::new("Title", "").in_drive(Drive::Canonical),
        )
        .unwrap();
        let archived = run(&mut store, &record.id).unwrap();

        assert_eq!(archived.drive, Drive::Archive);
        assert_eq!(archived.archived_from, Some(Drive::Canonical));
        assert_eq!(archived.status(), RecordStatus::Archived);

        let listed = get::list(
            &store,
            &RecordFilter {
                status: StatusFilter::Archived,
                ..Default::default()
            },
        );
        assert_eq!(listed.len(), 1);
        assert!(get::list(&store, &RecordFilter::default()).is_empty());
    }

    #[test]
    fn unarchive_returns_to_original_drive() {
        let (mut store, _) = make_store();
        let record = create::run(
            &mut store,
            RecordDraft::new("Title", "").in_drive(Drive::Shared),
        )
        .unwrap();
        run(&mut store, &record.id).unwrap();
        let back = unarchive(&mut store, &record.id).unwrap();

        assert_eq!(back.drive, Drive::Shared);
        assert_eq!(back.status(), RecordStatus::Active);
        assert!(back.archived_from.is_none());
        let last = store.journal_entries().last().unwrap();
        assert_eq!(last.op, JournalOp::Restore);
        assert_eq!(last.notes.as_deref(), Some("unarchived"));
    }

    #[test]
    fn recycled_records_cannot_be_archived() {
        let (mut store, _) = make_store();
        let record = create::run(&mut store, RecordDraft::new("x", "")).unwrap();
        recycle::run(&mut store, &record.id).unwrap();
        assert!(matches!(
            run(&mut store, &record.id),
            Err(NotepadError::InvalidState(_))
        ));
    }

    #[test]
    fn unarchive_requires_archived_record() {
        let (mut store, _) = make_store();
        let record = create::run(&mut store, RecordDraft::new("x", "")).unwrap();
        assert!(unarchive(&mut store, &record.id).is_err());
    }
}
