//! In-memory fixtures for tests, here and in downstream crates
//! (enable the `test_utils` feature).

use crate::api::NotepadApi;
use crate::clamp::{Limits, RecordDraft};
use crate::clock::{ManualClock, SharedClock};
use crate::drives::{FanOut, LocalDrive};
use crate::model::Record;
use crate::retention::Retention;
use crate::store::{ItemStore, MemBackend};
use crate::tasks::TaskService;
use std::sync::Arc;

/// A facade over a [`MemBackend`] with a [`ManualClock`] and a local mirror.
pub struct NotepadFixture {
    pub api: NotepadApi<MemBackend>,
    pub backend: Arc<MemBackend>,
    pub clock: Arc<ManualClock>,
    pub fanout: Arc<FanOut<MemBackend>>,
}

impl Default for NotepadFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl NotepadFixture {
    pub fn new() -> Self {
        Self::with_settings(Limits::default(), Retention::default())
    }

    pub fn with_settings(limits: Limits, retention: Retention) -> Self {
        let backend = Arc::new(MemBackend::new());
        let clock = Arc::new(ManualClock::default());
        let shared: SharedClock = clock.clone();
        let store = ItemStore::open(backend.clone(), shared.clone(), limits, retention)
            .expect("in-memory store opens");
        let fanout = Arc::new(FanOut::new(LocalDrive::new(backend.clone()), shared));
        let api = NotepadApi::new(store).with_mirror(fanout.clone());
        Self {
            api,
            backend,
            clock,
            fanout,
        }
    }

    pub fn with_records(mut self, count: usize) -> Self {
        for i in 0..count {
            self.api
                .create(RecordDraft::new(
                    format!("Test Record {}", i + 1),
                    format!("Content for record {}", i + 1),
                ))
                .expect("fixture record");
        }
        self
    }

    pub fn with_recycled(mut self, title: &str) -> Self {
        let record = self.record(title);
        self.api.recycle(&record.id).expect("fixture recycle");
        self
    }

    pub fn with_archived(mut self, title: &str) -> Self {
        let record = self.record(title);
        self.api.archive(&record.id).expect("fixture archive");
        self
    }

    fn record(&mut self, title: &str) -> Record {
        self.api
            .create(RecordDraft::new(title, "fixture"))
            .expect("fixture record")
    }

    /// A task service sharing this fixture's drives and clock.
    pub fn tasks(&self) -> TaskService<MemBackend> {
        TaskService::new(
            self.fanout.clone(),
            self.clock.clone(),
            *self.api.store().limits(),
        )
    }
}
