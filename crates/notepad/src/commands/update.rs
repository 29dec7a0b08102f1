use crate::error::{NotepadError, Result};
use crate::model::{Drive, JournalOp, Record};
use crate::store::{ItemStore, StorageBackend};
use serde_json::Value;
use std::collections::BTreeMap;

/// A partial update. `None` fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct RecordPatch {
    pub title: Option<String>,
    pub utterance: Option<String>,
    pub tags: Option<Vec<String>>,
    pub drive: Option<Drive>,
    pub meta: Option<BTreeMap<String, Value>>,
}

impl RecordPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn utterance(utterance: impl Into<String>) -> Self {
        Self {
            utterance: Some(utterance.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.utterance.is_none()
            && self.tags.is_none()
            && self.drive.is_none()
            && self.meta.is_none()
    }
}

/// Apply a patch. Drive moves into or out of [`Drive::Archive`] must go
/// through the archive commands so the lifecycle markers stay consistent.
pub fn run<B: StorageBackend>(
    store: &mut ItemStore<B>,
    id: &str,
    patch: RecordPatch,
) -> Result<Record> {
    store.begin()?;
    if patch.is_empty() {
        return Ok(store.require(id)?.clone());
    }

    let limits = *store.limits();
    let mut changed: Vec<&str> = Vec::new();

    let record = store.modify(id, |record, _now| {
        if let Some(drive) = patch.drive {
            if drive != record.drive {
                if record.is_archived() {
                    return Err(NotepadError::InvalidState(format!(
                        "record {} is archived; unarchive it before moving drives",
                        record.id
                    )));
                }
                if drive == Drive::Archive {
                    return Err(NotepadError::InvalidState(format!(
                        "use archive to move record {} into the archive drive",
                        record.id
                    )));
                }
                record.drive = drive;
                changed.push("drive");
            }
        }
        if let Some(title) = &patch.title {
            record.title = limits.clamp_title(title);
            changed.push("title");
        }
        if let Some(utterance) = &patch.utterance {
            record.utterance = limits.clamp_text(utterance);
            changed.push("utterance");
        }
        if let Some(tags) = &patch.tags {
            record.tags = limits.clamp_tags(tags);
            changed.push("tags");
        }
        if let Some(meta) = &patch.meta {
            record.meta = limits.clamp_meta(meta);
            changed.push("meta");
        }
        Ok(())
    })?;

    store.journal(JournalOp::Update, id, Some(changed.join(",")));
    store.persist()?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clamp::RecordDraft;
    use crate::commands::testing::make_store;
    use crate::commands::{archive, create};
    use chrono::Duration;

    #[test]
    fn reindexes_on_title_change() {
        let (mut store, _) = make_store();
        let record = create::run(&mut store, RecordDraft::new("alpha note", "")).unwrap();

        run(&mut store, &record.id, RecordPatch::title("beta note")).unwrap();

        assert!(store.index().bucket("alpha").is_none());
        assert!(store.index().bucket("beta").unwrap().contains(&record.id));
        assert!(store.index().bucket("note").unwrap().contains(&record.id));
    }

    #[test]
    fn stamps_updated_and_journals_fields() {
        let (mut store, clock) = make_store();
        let record = create::run(&mut store, RecordDraft::new("t", "")).unwrap();
        clock.advance(Duration::minutes(5));

        let updated = run(
            &mut store,
            &record.id,
            RecordPatch {
                tags: Some(vec!["a".into(), "a".into(), "b".into()]),
                drive: Some(Drive::Canonical),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(updated.tags, vec!["a", "b"]);
        assert_eq!(updated.drive, Drive::Canonical);
        assert_eq!(updated.updated, record.updated + Duration::minutes(5));
        let entry = store.journal_entries().last().unwrap();
        assert_eq!(entry.op, JournalOp::Update);
        assert_eq!(entry.notes.as_deref(), Some("drive,tags"));
    }

    #[test]
    fn rejects_drive_moves_for_archived_records() {
        let (mut store, _) = make_store();
        let record = create::run(&mut store, RecordDraft::new("t", "")).unwrap();
        archive::run(&mut store, &record.id).unwrap();

        let result = run(
            &mut store,
            &record.id,
            RecordPatch {
                drive: Some(Drive::Working),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(NotepadError::InvalidState(_))));
    }

    #[test]
    fn rejects_moving_into_archive_drive() {
        let (mut store, _) = make_store();
        let record = create::run(&mut store, RecordDraft::new("t", "")).unwrap();
        let result = run(
            &mut store,
            &record.id,
            RecordPatch {
                drive: Some(Drive::Archive),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(NotepadError::InvalidState(_))));
        assert_eq!(store.get(&record.id).unwrap().drive, Drive::Working);
    }

    #[test]
    fn missing_record_is_an_error() {
        let (mut store, _) = make_store();
        let result = run(&mut store, "nope", RecordPatch::title("x"));
        assert!(matches!(result, Err(NotepadError::RecordNotFound(_))));
    }
}
