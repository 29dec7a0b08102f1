//! End-to-end record and task flows on the filesystem backend.

use chrono::Duration;
use notepad::clamp::{ArtifactDraft, Limits, RecordDraft};
use notepad::clock::{ManualClock, SharedClock};
use notepad::commands::update::RecordPatch;
use notepad::drives::{DriveWrite, FanOut, LocalDrive};
use notepad::model::{Drive, JournalOp, RecordFilter, StatusFilter};
use notepad::retention::Retention;
use notepad::store::{FsBackend, ItemStore};
use notepad::tasks::{TaskRecord, TaskService};
use notepad::NotepadApi;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

struct Env {
    _dir: TempDir,
    backend: Arc<FsBackend>,
    clock: Arc<ManualClock>,
}

impl Env {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(FsBackend::new(dir.path().to_path_buf()));
        Self {
            _dir: dir,
            backend,
            clock: Arc::new(ManualClock::default()),
        }
    }

    fn shared_clock(&self) -> SharedClock {
        self.clock.clone()
    }

    fn fanout(&self) -> Arc<FanOut<FsBackend>> {
        Arc::new(FanOut::new(
            LocalDrive::new(self.backend.clone()),
            self.shared_clock(),
        ))
    }

    fn api_with(&self, limits: Limits) -> NotepadApi<FsBackend> {
        let store = ItemStore::open(
            self.backend.clone(),
            self.shared_clock(),
            limits,
            Retention::default(),
        )
        .unwrap();
        NotepadApi::new(store).with_mirror(self.fanout())
    }

    fn api(&self) -> NotepadApi<FsBackend> {
        self.api_with(Limits::default())
    }

    fn tasks(&self) -> TaskService<FsBackend> {
        TaskService::new(self.fanout(), self.shared_clock(), Limits::default())
    }
}

#[test]
fn test_ship_v1_task_toggle() {
    let env = Env::new();
    let tasks = env.tasks();
    let task = tasks
        .upsert(TaskRecord::new("Ship v1", ["Write notes", "Tag release", "Publish"]))
        .unwrap();

    let task = tasks.toggle_step(task.id(), "s2").unwrap();
    assert_eq!(task.revision, 2);
    assert!(task.step("s2").unwrap().done);

    // A second service over the same storage sees the write.
    let reread = env.tasks().get(task.id()).unwrap().unwrap();
    assert_eq!(reread.revision, 2);
}

#[test]
fn test_recycled_record_swept_after_retention() {
    let env = Env::new();
    let mut api = env.api();
    let record = api
        .create(RecordDraft::new("Scratch idea", "throwaway").with_tags(["draft"]))
        .unwrap();
    api.recycle(&record.id).unwrap();

    env.clock
        .advance(Duration::days(Retention::default().recycle_days as i64 + 1));
    let purged = api.sweep().unwrap();

    assert_eq!(purged, vec![record.id.clone()]);
    assert!(api.get(&record.id).is_none());
    assert!(!api.store().index().references(&record.id));
    assert!(api.search("scratch").is_empty());

    // Survives a reopen.
    let reopened = env.api();
    assert!(reopened.get(&record.id).is_none());
    assert!(reopened
        .store()
        .journal_entries()
        .any(|e| e.owner_id == record.id && e.op == JournalOp::Purge));
}

#[test]
fn test_foreign_delta_reconciled_on_load() {
    let env = Env::new();
    let tasks = env.tasks();
    let mut task = TaskRecord::new("Board task", ["only step"]);
    task.meta.id = "t1".into();
    task.revision = 2;
    let task = tasks.upsert(task).unwrap();
    assert_eq!(task.revision, 3);
    assert!(!task.step("s1").unwrap().done);

    env.fanout()
        .dispatch(
            DriveWrite::new(
                "t1",
                json!({"id": "t1", "rev": 5, "steps": [{"id": "s1", "d": true}]}),
            )
            .at("tasks/deltas/from-other-tab"),
        )
        .unwrap();

    let board = tasks.load().unwrap();
    let task = board.task("t1").unwrap();
    assert!(task.revision >= 6);
    assert!(task.step("s1").unwrap().done);
}

#[test]
fn test_thirteen_artifacts_capped_at_twelve() {
    let env = Env::new();
    let mut api = env.api_with(Limits {
        max_artifacts: 12,
        ..Limits::default()
    });
    let record = api.create(RecordDraft::new("Run log", "")).unwrap();
    let drafts: Vec<ArtifactDraft> = (0..13)
        .map(|i| ArtifactDraft::new(format!("artifact {}", i), "output"))
        .collect();

    let stored = api.attach_artifacts(&record.id, drafts).unwrap();
    assert_eq!(stored.len(), 12);
    assert_eq!(api.list_artifacts(&record.id).len(), 12);
    assert_eq!(env.api().list_artifacts(&record.id).len(), 12);
}

#[test]
fn test_archive_lifecycle_persists() {
    let env = Env::new();
    let mut api = env.api();
    let record = api
        .create(RecordDraft::new("Spec", "v2 draft").in_drive(Drive::Canonical))
        .unwrap();
    api.update(
        &record.id,
        RecordPatch {
            tags: Some(vec!["docs".into()]),
            ..Default::default()
        },
    )
    .unwrap();
    api.archive(&record.id).unwrap();

    let reopened = env.api();
    let archived = reopened.list(&RecordFilter {
        status: StatusFilter::Archived,
        ..Default::default()
    });
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].archived_from, Some(Drive::Canonical));
    assert_eq!(reopened.search("docs").len(), 1);

    let mut api = reopened;
    let back = api.unarchive(&record.id).unwrap();
    assert_eq!(back.drive, Drive::Canonical);
}

#[test]
fn test_two_facades_pick_up_each_others_writes() {
    let env = Env::new();
    let mut first = env.api();
    let mut second = env.api();

    let a = first.create(RecordDraft::new("from first", "")).unwrap();
    let b = second.create(RecordDraft::new("from second", "")).unwrap();

    // `second` reloaded before writing, so nothing from `first` was lost.
    let third = env.api();
    assert!(third.get(&a.id).is_some());
    assert!(third.get(&b.id).is_some());

    first.recycle(&b.id).unwrap();
    assert!(env.api().get(&b.id).unwrap().is_recycled());
}
