use super::backend::{StorageBackend, StorageBackendExt};
use crate::clamp::Limits;
use crate::clock::SharedClock;
use crate::error::{NotepadError, Result};
use crate::index::{record_tokens, SearchIndex};
use crate::model::{Artifact, JournalEntry, JournalOp, Record};
use crate::retention::Retention;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, warn};

/// Storage key of the item store snapshot.
pub const STATE_KEY: &str = "notepad/state";

/// Everything the item store knows, persisted as a single document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreState {
    /// Bumped on every successful persist; used to detect other writers.
    #[serde(default)]
    pub generation: u64,
    #[serde(default)]
    pub items: BTreeMap<String, Record>,
    #[serde(default)]
    pub artifacts: BTreeMap<String, Artifact>,
    #[serde(default)]
    pub index: SearchIndex,
    #[serde(default)]
    pub journal: VecDeque<JournalEntry>,
    #[serde(default)]
    pub active_id: Option<String>,
    #[serde(default)]
    pub retention: Retention,
}

#[derive(Deserialize)]
struct GenerationProbe {
    #[serde(default)]
    generation: u64,
}

/// The in-memory item store and its persistence.
///
/// Holds state and the primitives commands are built from: record
/// insertion with reindexing, cascading purge, journaling and snapshot
/// persistence. Operation logic lives in [`crate::commands`].
pub struct ItemStore<B: StorageBackend> {
    backend: Arc<B>,
    clock: SharedClock,
    limits: Limits,
    state: StoreState,
    checkpoint: Option<StoreState>,
}

impl<B: StorageBackend> ItemStore<B> {
    /// Load the snapshot from `backend`, or start empty.
    pub fn open(
        backend: Arc<B>,
        clock: SharedClock,
        limits: Limits,
        retention: Retention,
    ) -> Result<Self> {
        let mut state: StoreState = backend.read_json(STATE_KEY)?.unwrap_or_default();
        state.retention = retention;
        debug!(
            items = state.items.len(),
            generation = state.generation,
            "item store opened"
        );
        Ok(Self {
            backend,
            clock,
            limits,
            state,
            checkpoint: None,
        })
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn retention(&self) -> &Retention {
        &self.state.retention
    }

    pub fn state(&self) -> &StoreState {
        &self.state
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.state.items.get(id)
    }

    pub fn require(&self, id: &str) -> Result<&Record> {
        self.get(id)
            .ok_or_else(|| NotepadError::RecordNotFound(id.to_string()))
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.state.items.values()
    }

    pub fn index(&self) -> &SearchIndex {
        &self.state.index
    }

    pub fn journal_entries(&self) -> impl Iterator<Item = &JournalEntry> {
        self.state.journal.iter()
    }

    pub fn active_id(&self) -> Option<&str> {
        self.state.active_id.as_deref()
    }

    pub(crate) fn set_active_id(&mut self, id: Option<String>) {
        self.state.active_id = id;
    }

    /// Artifacts owned by `owner`, oldest first.
    pub fn artifacts_of(&self, owner: &str) -> Vec<&Artifact> {
        let mut artifacts: Vec<&Artifact> = self
            .state
            .artifacts
            .values()
            .filter(|a| a.owner_id == owner)
            .collect();
        artifacts.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
        artifacts
    }

    /// Insert or replace a record, rebuilding its index entries.
    pub(crate) fn put_record(&mut self, record: Record) {
        self.state.index.reindex(&record.id, record_tokens(&record));
        self.state.items.insert(record.id.clone(), record);
    }

    /// Apply `change` to a copy of the record, stamp `updated`, and store it.
    pub(crate) fn modify<F>(&mut self, id: &str, change: F) -> Result<Record>
    where
        F: FnOnce(&mut Record, DateTime<Utc>) -> Result<()>,
    {
        let now = self.now();
        let mut record = self.require(id)?.clone();
        change(&mut record, now)?;
        record.updated = now;
        self.put_record(record.clone());
        Ok(record)
    }

    pub(crate) fn insert_artifacts(&mut self, artifacts: Vec<Artifact>) {
        for artifact in artifacts {
            self.state.artifacts.insert(artifact.id.clone(), artifact);
        }
    }

    /// Remove a record with its artifacts, index entries and active pointer.
    pub(crate) fn purge_record(&mut self, id: &str) -> Result<Record> {
        let record = self
            .state
            .items
            .remove(id)
            .ok_or_else(|| NotepadError::RecordNotFound(id.to_string()))?;
        self.state.artifacts.retain(|_, a| a.owner_id != id);
        self.state.index.remove(id);
        if self.state.active_id.as_deref() == Some(id) {
            self.state.active_id = None;
        }
        Ok(record)
    }

    /// Append a journal entry, dropping the oldest beyond `journal_limit`.
    pub(crate) fn journal(&mut self, op: JournalOp, owner_id: &str, notes: Option<String>) {
        self.state.journal.push_back(JournalEntry {
            owner_id: owner_id.to_string(),
            at: self.now(),
            op,
            notes,
        });
        let limit = self.state.retention.journal_limit;
        if limit > 0 {
            while self.state.journal.len() > limit {
                self.state.journal.pop_front();
            }
        }
    }

    /// Reload the snapshot if another writer persisted since we last did.
    ///
    /// Called at the start of every mutating command. Returns true when the
    /// in-memory state was replaced.
    pub(crate) fn refresh_if_stale(&mut self) -> Result<bool> {
        let Some(raw) = self.backend.read(STATE_KEY)? else {
            return Ok(false);
        };
        let probe: GenerationProbe = serde_json::from_str(&raw)?;
        if probe.generation == self.state.generation {
            return Ok(false);
        }
        warn!(
            ours = self.state.generation,
            stored = probe.generation,
            "item store snapshot changed underneath us, reloading"
        );
        let retention = self.state.retention;
        let mut state: StoreState = serde_json::from_str(&raw)?;
        state.retention = retention;
        self.state = state;
        Ok(true)
    }

    /// Start a mutation: reload if stale, then keep a copy of the state to
    /// fall back to if [`persist`](Self::persist) fails.
    pub(crate) fn begin(&mut self) -> Result<()> {
        self.refresh_if_stale()?;
        self.checkpoint = Some(self.state.clone());
        Ok(())
    }

    /// Write the whole state as one document.
    ///
    /// On failure the in-memory state goes back to the checkpoint taken by
    /// [`begin`](Self::begin), so a failed command leaves nothing behind.
    pub(crate) fn persist(&mut self) -> Result<()> {
        self.state.generation += 1;
        match self.backend.write_json(STATE_KEY, &self.state) {
            Ok(()) => {
                self.checkpoint = None;
                Ok(())
            }
            Err(err) => {
                match self.checkpoint.take() {
                    Some(checkpoint) => self.state = checkpoint,
                    None => self.state.generation -= 1,
                }
                warn!(error = %err, "item store snapshot write failed, changes rolled back");
                Err(err)
            }
        }
    }
}
