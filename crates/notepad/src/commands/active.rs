use crate::error::Result;
use crate::model::Record;
use crate::store::{ItemStore, StorageBackend};

/// Point the active pointer at `id`, or clear it with `None`.
///
/// Unknown ids are rejected. The pointer is cleared automatically when its
/// record is purged.
pub fn set<B: StorageBackend>(store: &mut ItemStore<B>, id: Option<&str>) -> Result<()> {
    store.begin()?;
    if let Some(id) = id {
        store.require(id)?;
    }
    if store.active_id() == id {
        return Ok(());
    }
    store.set_active_id(id.map(str::to_string));
    store.persist()
}

/// The active record, if the pointer is set.
pub fn get<B: StorageBackend>(store: &ItemStore<B>) -> Option<Record> {
    store.active_id().and_then(|id| store.get(id)).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clamp::RecordDraft;
    use crate::commands::testing::make_store;
    use crate::commands::{create, purge};
    use crate::error::NotepadError;

    #[test]
    fn test_set_and_get() {
        let (mut store, _) = make_store();
        assert!(get(&store).is_none());
        let record = create::run(&mut store, RecordDraft::new("focus", "")).unwrap();
        set(&mut store, Some(&record.id)).unwrap();
        assert_eq!(get(&store).unwrap().id, record.id);

        set(&mut store, None).unwrap();
        assert!(get(&store).is_none());
    }

    #[test]
    fn test_rejects_unknown_id() {
        let (mut store, _) = make_store();
        assert!(matches!(
            set(&mut store, Some("ghost")),
            Err(NotepadError::RecordNotFound(_))
        ));
    }

    #[test]
    fn test_purge_clears_pointer() {
        let (mut store, _) = make_store();
        let record = create::run(&mut store, RecordDraft::new("focus", "")).unwrap();
        set(&mut store, Some(&record.id)).unwrap();
        purge::run(&mut store, &record.id).unwrap();
        assert!(get(&store).is_none());
        assert!(store.active_id().is_none());
    }
}
