//! # API Facade
//!
//! [`NotepadApi`] is the single entry point for record operations. It is a
//! thin layer over [`crate::commands`]:
//!
//! - **Dispatches** to the command for each operation
//! - **Mirrors** every touched record to the drives as `items/<drive>/<id>`
//! - **Notifies** subscribers with exactly one [`Change`] per mutation
//!
//! Reads never emit. Mirror failures are logged and do not fail the
//! operation; the item store snapshot is already written by then.
//!
//! ## Sharing
//!
//! The facade is synchronous and takes `&mut self` for mutations. To share it
//! with the retention sweeper, wrap it in `Arc<Mutex<_>>` (see
//! [`crate::retention::spawn_sweeper`]).

use crate::autosave::AutosaveQueue;
use crate::clamp::{ArtifactDraft, RecordDraft};
use crate::clock::SharedClock;
use crate::commands;
use crate::commands::outcome::OutcomeInput;
use crate::commands::search::SearchHit;
use crate::commands::update::RecordPatch;
use crate::config::NotepadConfig;
use crate::drives::{DriveWrite, FanOut, LocalDrive, RemoteDrive};
use crate::error::Result;
use crate::events::{Change, ChangeKind, EventBus, Subscription};
use crate::model::{Artifact, Drive, Record, RecordFilter};
use crate::store::{ItemStore, StorageBackend, StoreState};
use std::io::Write;
use std::sync::Arc;
use tracing::warn;

/// Drive path a record is mirrored to.
pub fn mirror_path(record: &Record) -> String {
    format!("items/{}/{}", record.drive, record.id)
}

fn mirror_path_for(drive: Drive, id: &str) -> String {
    format!("items/{}/{}", drive, id)
}

pub struct NotepadApi<B: StorageBackend> {
    store: ItemStore<B>,
    mirror: Option<Arc<FanOut<B>>>,
    events: EventBus,
}

impl<B: StorageBackend + 'static> NotepadApi<B> {
    pub fn new(store: ItemStore<B>) -> Self {
        Self {
            store,
            mirror: None,
            events: EventBus::new(),
        }
    }

    pub fn with_mirror(mut self, fanout: Arc<FanOut<B>>) -> Self {
        self.mirror = Some(fanout);
        self
    }

    /// Build the full stack from configuration: item store, local drive,
    /// configured remote drives and the autosave queue behind them.
    pub fn from_config(
        backend: Arc<B>,
        clock: SharedClock,
        config: &NotepadConfig,
    ) -> Result<Self> {
        let store = ItemStore::open(
            Arc::clone(&backend),
            Arc::clone(&clock),
            config.limits(),
            config.retention(),
        )?;
        let queue = Arc::new(AutosaveQueue::new(
            Arc::clone(&backend),
            Arc::clone(&clock),
            config.autosave_max_attempts,
        ));
        let mut fanout = FanOut::new(LocalDrive::new(backend), clock).with_autosave(queue);
        for remote in config.remotes() {
            fanout = fanout.with_remote(Arc::new(RemoteDrive::from_config(
                remote,
                config.remote_timeout(),
            )?));
        }
        Ok(Self::new(store).with_mirror(Arc::new(fanout)))
    }

    pub fn store(&self) -> &ItemStore<B> {
        &self.store
    }

    pub fn mirror(&self) -> Option<&Arc<FanOut<B>>> {
        self.mirror.as_ref()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Change) + Send + Sync + 'static,
    {
        self.events.subscribe(listener)
    }

    // --- mutations ---

    pub fn create(&mut self, draft: RecordDraft) -> Result<Record> {
        let record = commands::create::run(&mut self.store, draft)?;
        self.mirror_record(&record, None);
        self.emit(ChangeKind::Created, vec![record.id.clone()]);
        Ok(record)
    }

    /// Loosely-typed create, for JSON coming straight from a model.
    pub fn create_from_value(&mut self, raw: &serde_json::Value) -> Result<Record> {
        let draft = self.store.limits().draft_from_value(raw);
        self.create(draft)
    }

    pub fn update(&mut self, id: &str, patch: RecordPatch) -> Result<Record> {
        let before = self.current_drive(id)?;
        let record = commands::update::run(&mut self.store, id, patch)?;
        self.mirror_record(&record, Some(before));
        self.emit(ChangeKind::Updated, vec![record.id.clone()]);
        Ok(record)
    }

    pub fn attach_artifacts(
        &mut self,
        owner_id: &str,
        drafts: Vec<ArtifactDraft>,
    ) -> Result<Vec<Artifact>> {
        let stored = commands::artifacts::attach(&mut self.store, owner_id, drafts)?;
        self.emit(ChangeKind::ArtifactsAttached, vec![owner_id.to_string()]);
        Ok(stored)
    }

    pub fn outcome(&mut self, id: &str, input: OutcomeInput) -> Result<Record> {
        let record = commands::outcome::run(&mut self.store, id, input)?;
        self.mirror_record(&record, None);
        self.emit(ChangeKind::Outcome, vec![record.id.clone()]);
        Ok(record)
    }

    pub fn recycle(&mut self, id: &str) -> Result<Record> {
        let record = commands::recycle::run(&mut self.store, id)?;
        self.mirror_record(&record, None);
        self.emit(ChangeKind::Recycled, vec![record.id.clone()]);
        Ok(record)
    }

    pub fn restore(&mut self, id: &str) -> Result<Record> {
        let record = commands::restore::run(&mut self.store, id)?;
        self.mirror_record(&record, None);
        self.emit(ChangeKind::Restored, vec![record.id.clone()]);
        Ok(record)
    }

    pub fn purge(&mut self, id: &str) -> Result<Record> {
        let record = commands::purge::run(&mut self.store, id)?;
        self.unmirror(record.drive, &record.id);
        self.emit(ChangeKind::Purged, vec![record.id.clone()]);
        Ok(record)
    }

    pub fn archive(&mut self, id: &str) -> Result<Record> {
        let before = self.current_drive(id)?;
        let record = commands::archive::run(&mut self.store, id)?;
        self.mirror_record(&record, Some(before));
        self.emit(ChangeKind::Archived, vec![record.id.clone()]);
        Ok(record)
    }

    pub fn unarchive(&mut self, id: &str) -> Result<Record> {
        let before = self.current_drive(id)?;
        let record = commands::archive::unarchive(&mut self.store, id)?;
        self.mirror_record(&record, Some(before));
        self.emit(ChangeKind::Unarchived, vec![record.id.clone()]);
        Ok(record)
    }

    pub fn set_active(&mut self, id: Option<&str>) -> Result<()> {
        commands::active::set(&mut self.store, id)?;
        self.emit(
            ChangeKind::ActiveChanged,
            id.map(str::to_string).into_iter().collect(),
        );
        Ok(())
    }

    /// Purge expired recycled records. Emits only when something was purged.
    pub fn sweep(&mut self) -> Result<Vec<String>> {
        let purged = commands::sweep::run(&mut self.store)?;
        if purged.is_empty() {
            return Ok(Vec::new());
        }
        for record in &purged {
            self.unmirror(record.drive, &record.id);
        }
        let ids: Vec<String> = purged.into_iter().map(|r| r.id).collect();
        self.emit(ChangeKind::Swept, ids.clone());
        Ok(ids)
    }

    // --- reads ---

    pub fn get(&self, id: &str) -> Option<Record> {
        commands::get::run(&self.store, id)
    }

    pub fn list(&self, filter: &RecordFilter) -> Vec<Record> {
        commands::get::list(&self.store, filter)
    }

    pub fn list_artifacts(&self, owner_id: &str) -> Vec<Artifact> {
        commands::artifacts::list(&self.store, owner_id)
    }

    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        commands::search::run(&self.store, query)
    }

    pub fn get_active(&self) -> Option<Record> {
        commands::active::get(&self.store)
    }

    pub fn export_state(&self) -> StoreState {
        commands::export::state(&self.store)
    }

    pub fn write_archive<W: Write>(&self, writer: W) -> Result<()> {
        commands::export::write_archive(&self.store, writer)
    }

    // --- helpers ---

    /// Drive of `id` as currently stored, after picking up other writers.
    fn current_drive(&mut self, id: &str) -> Result<Drive> {
        self.store.refresh_if_stale()?;
        Ok(self.store.require(id)?.drive)
    }

    fn emit(&self, kind: ChangeKind, ids: Vec<String>) {
        self.events.emit(&Change { kind, ids });
    }

    fn mirror_record(&self, record: &Record, previous_drive: Option<Drive>) {
        let Some(mirror) = &self.mirror else {
            return;
        };
        if let Some(previous) = previous_drive.filter(|d| *d != record.drive) {
            self.unmirror(previous, &record.id);
        }
        let json = match serde_json::to_value(record) {
            Ok(json) => json,
            Err(err) => {
                warn!(id = %record.id, error = %err, "could not serialize record for mirror");
                return;
            }
        };
        let write = DriveWrite::new(&record.id, json).at(mirror_path(record));
        if let Err(err) = mirror.dispatch(write) {
            warn!(id = %record.id, error = %err, "record mirror write failed");
        }
    }

    /// Remove the local mirror copy. Remotes keep theirs; the adapter
    /// contract has no delete.
    fn unmirror(&self, drive: Drive, id: &str) {
        if let Some(mirror) = &self.mirror {
            if let Err(err) = mirror.local().remove(&mirror_path_for(drive, id)) {
                warn!(id, error = %err, "could not remove record mirror");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clamp::Limits;
    use crate::clock::ManualClock;
    use crate::model::StatusFilter;
    use crate::retention::Retention;
    use crate::store::MemBackend;
    use chrono::Duration;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    struct Harness {
        api: NotepadApi<MemBackend>,
        clock: Arc<ManualClock>,
        changes: Arc<Mutex<Vec<Change>>>,
    }

    fn harness() -> Harness {
        harness_on(Arc::new(MemBackend::new()))
    }

    fn harness_on(backend: Arc<MemBackend>) -> Harness {
        let clock = Arc::new(ManualClock::default());
        let shared: SharedClock = clock.clone();
        let store = ItemStore::open(
            backend.clone(),
            shared.clone(),
            Limits::default(),
            Retention::default(),
        )
        .unwrap();
        let fanout = FanOut::new(LocalDrive::new(backend), shared);
        let api = NotepadApi::new(store).with_mirror(Arc::new(fanout));
        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&changes);
        let _sub = api.subscribe(move |c| sink.lock().unwrap().push(c.clone()));
        Harness {
            api,
            clock,
            changes,
        }
    }

    fn kinds(h: &Harness) -> Vec<ChangeKind> {
        h.changes.lock().unwrap().iter().map(|c| c.kind).collect()
    }

    #[test]
    fn test_each_mutation_emits_once_reads_emit_nothing() {
        let mut h = harness();
        let record = h.api.create(RecordDraft::new("note", "body")).unwrap();
        h.api.update(&record.id, RecordPatch::title("renamed")).unwrap();
        h.api.get(&record.id);
        h.api.search("renamed");
        h.api.list(&RecordFilter::default());
        h.api.recycle(&record.id).unwrap();
        h.api.restore(&record.id).unwrap();

        assert_eq!(
            kinds(&h),
            vec![
                ChangeKind::Created,
                ChangeKind::Updated,
                ChangeKind::Recycled,
                ChangeKind::Restored
            ]
        );
    }

    #[test]
    fn test_mirror_follows_drive_moves() {
        let mut h = harness();
        let record = h
            .api
            .create(RecordDraft::new("doc", "").in_drive(Drive::Canonical))
            .unwrap();
        let local = h.api.mirror().unwrap().local().clone();
        let path = format!("items/canonical/{}", record.id);
        let mirrored: Value = local.read_json(&path).unwrap().unwrap();
        assert_eq!(mirrored["title"], "doc");

        h.api.archive(&record.id).unwrap();
        assert!(local.read_json::<Value>(&path).unwrap().is_none());
        assert!(local
            .read_json::<Value>(&format!("items/archive/{}", record.id))
            .unwrap()
            .is_some());

        h.api.purge(&record.id).unwrap();
        assert!(local.keys("items/").unwrap().is_empty());
    }

    #[test]
    fn test_archive_unmirrors_drive_set_by_other_writer() {
        let backend = Arc::new(MemBackend::new());
        let mut first = harness_on(backend.clone());
        let record = first.api.create(RecordDraft::new("doc", "")).unwrap();

        let mut second = harness_on(backend);
        let patch = RecordPatch {
            drive: Some(Drive::Canonical),
            ..Default::default()
        };
        second.api.update(&record.id, patch).unwrap();

        first.api.archive(&record.id).unwrap();
        let local = first.api.mirror().unwrap().local().clone();
        let mirrored = local.keys("items/").unwrap();
        assert_eq!(mirrored, vec![format!("items/archive/{}", record.id)]);
    }

    #[test]
    fn test_sweep_emits_only_when_purging() {
        let mut h = harness();
        let record = h.api.create(RecordDraft::new("old", "")).unwrap();
        h.api.recycle(&record.id).unwrap();
        assert!(h.api.sweep().unwrap().is_empty());

        h.clock.advance(Duration::days(8));
        assert_eq!(h.api.sweep().unwrap(), vec![record.id.clone()]);
        let last = h.changes.lock().unwrap().last().cloned().unwrap();
        assert_eq!(last.kind, ChangeKind::Swept);
        assert_eq!(last.ids, vec![record.id]);
        assert_eq!(
            kinds(&h).iter().filter(|k| **k == ChangeKind::Swept).count(),
            1
        );
    }

    #[test]
    fn test_create_from_value_is_tolerant() {
        let mut h = harness();
        let record = h
            .api
            .create_from_value(&json!({"title": ["bad"], "utterance": "ok", "drive": "shared"}))
            .unwrap();
        assert_eq!(record.drive, Drive::Shared);
        assert_eq!(record.utterance, "ok");
        assert_eq!(
            h.api
                .list(&RecordFilter {
                    status: StatusFilter::All,
                    ..Default::default()
                })
                .len(),
            1
        );
    }

    #[test]
    fn test_set_active_emits_with_id() {
        let mut h = harness();
        let record = h.api.create(RecordDraft::new("focus", "")).unwrap();
        h.api.set_active(Some(&record.id)).unwrap();
        assert_eq!(h.api.get_active().unwrap().id, record.id);
        let last = h.changes.lock().unwrap().last().cloned().unwrap();
        assert_eq!(last.kind, ChangeKind::ActiveChanged);
        assert_eq!(last.ids, vec![record.id]);
    }
}
