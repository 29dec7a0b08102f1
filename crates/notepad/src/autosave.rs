//! # Autosave Queue
//!
//! Offline resilience for drive writes. Two documents back it:
//!
//! - `autosave/latest`: the newest [`SavedPayload`] per `(kind, id)`, with a
//!   version that only goes up.
//! - `autosave/queue`: entries waiting for delivery, oldest first.
//!
//! Entries are removed only after an adapter accepted them. A crash between
//! delivery and the queue rewrite delivers that entry again on the next
//! flush, so receivers must tolerate duplicates.
//!
//! A failed entry goes to the back of the queue with `tries + 1`. When
//! `max_attempts` is non-zero, entries that reach it move to `autosave/dead`
//! and are not retried.

use crate::clock::SharedClock;
use crate::drives::{DriveAdapter, DriveWrite};
use crate::error::Result;
use crate::store::{StorageBackend, StorageBackendExt};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const LATEST_KEY: &str = "autosave/latest";
pub const QUEUE_KEY: &str = "autosave/queue";
pub const DEAD_KEY: &str = "autosave/dead";

/// Kind used for drive writes that failed and were requeued.
pub const DRIVE_WRITE_KIND: &str = "drive";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedPayload {
    pub kind: String,
    pub id: String,
    pub version: u64,
    pub at: DateTime<Utc>,
    pub content: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedPayload {
    pub entry_id: String,
    pub payload: SavedPayload,
    #[serde(default)]
    pub path: Option<String>,
    /// Adapter name; `None` means every adapter passed to the flush.
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub tries: u32,
}

impl QueuedPayload {
    pub fn to_write(&self) -> DriveWrite {
        DriveWrite {
            id: self.payload.id.clone(),
            path: self.path.clone(),
            json: self.payload.content.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub attempted: usize,
    pub delivered: usize,
    pub requeued: usize,
    pub dead_lettered: usize,
}

fn latest_key(kind: &str, id: &str) -> String {
    format!("{}:{}", kind, id)
}

pub struct AutosaveQueue<B: StorageBackend> {
    backend: Arc<B>,
    clock: SharedClock,
    max_attempts: u32,
    guard: Mutex<()>,
}

impl<B: StorageBackend> AutosaveQueue<B> {
    /// `max_attempts == 0` retries forever.
    pub fn new(backend: Arc<B>, clock: SharedClock, max_attempts: u32) -> Self {
        Self {
            backend,
            clock,
            max_attempts,
            guard: Mutex::new(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.guard.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_latest(&self) -> Result<BTreeMap<String, SavedPayload>> {
        Ok(self.backend.read_json(LATEST_KEY)?.unwrap_or_default())
    }

    fn read_queue(&self) -> Result<Vec<QueuedPayload>> {
        Ok(self.backend.read_json(QUEUE_KEY)?.unwrap_or_default())
    }

    /// Record a new version and queue it for delivery to every adapter.
    pub fn snapshot(&self, kind: &str, id: &str, content: Value) -> Result<SavedPayload> {
        let path = format!("autosave/{}/{}", kind, id);
        self.enqueue(kind, id, content, Some(path), None)
    }

    /// Queue a drive write that failed on `target`.
    pub fn requeue(&self, write: &DriveWrite, target: &str) -> Result<()> {
        self.enqueue(
            DRIVE_WRITE_KIND,
            &write.id,
            write.json.clone(),
            write.path.clone(),
            Some(target.to_string()),
        )?;
        Ok(())
    }

    fn enqueue(
        &self,
        kind: &str,
        id: &str,
        content: Value,
        path: Option<String>,
        target: Option<String>,
    ) -> Result<SavedPayload> {
        let _guard = self.lock();
        let mut latest = self.read_latest()?;
        let key = latest_key(kind, id);
        let version = latest.get(&key).map_or(1, |p| p.version + 1);
        let payload = SavedPayload {
            kind: kind.to_string(),
            id: id.to_string(),
            version,
            at: self.clock.now(),
            content,
        };
        latest.insert(key, payload.clone());
        self.backend.write_json(LATEST_KEY, &latest)?;

        let mut queue = self.read_queue()?;
        queue.push(QueuedPayload {
            entry_id: Uuid::new_v4().to_string(),
            payload: payload.clone(),
            path,
            target,
            tries: 0,
        });
        self.backend.write_json(QUEUE_KEY, &queue)?;
        debug!(kind, id, version, queued = queue.len(), "autosave snapshot");
        Ok(payload)
    }

    pub fn latest(&self, kind: &str, id: &str) -> Result<Option<SavedPayload>> {
        Ok(self.read_latest()?.remove(&latest_key(kind, id)))
    }

    pub fn pending(&self) -> Result<Vec<QueuedPayload>> {
        self.read_queue()
    }

    pub fn dead_letters(&self) -> Result<Vec<QueuedPayload>> {
        Ok(self.backend.read_json(DEAD_KEY)?.unwrap_or_default())
    }

    /// Replay up to `max` queued entries.
    ///
    /// Entries with a target go to that adapter only, and stay untouched if it
    /// is not among `adapters`. Untargeted entries go to every adapter; when
    /// only some fail, a targeted entry is queued per failed adapter.
    pub async fn flush_all(
        &self,
        max: usize,
        adapters: &[Arc<dyn DriveAdapter>],
    ) -> Result<FlushReport> {
        let mut report = FlushReport::default();
        if adapters.is_empty() || max == 0 {
            return Ok(report);
        }

        let batch: Vec<QueuedPayload> = {
            let _guard = self.lock();
            self.read_queue()?
                .into_iter()
                .filter(|entry| match &entry.target {
                    Some(target) => adapters.iter().any(|a| a.name() == target),
                    None => true,
                })
                .take(max)
                .collect()
        };
        if batch.is_empty() {
            return Ok(report);
        }

        // Each entry with the names of the adapters that rejected it.
        let mut results: Vec<(QueuedPayload, Vec<String>)> = Vec::with_capacity(batch.len());
        for entry in batch {
            let write = entry.to_write();
            let mut failed = Vec::new();
            for adapter in adapters {
                if entry.target.as_deref().is_some_and(|t| t != adapter.name()) {
                    continue;
                }
                if !adapter.write(&write).await.is_ok() {
                    failed.push(adapter.name().to_string());
                }
            }
            report.attempted += 1;
            results.push((entry, failed));
        }

        let _guard = self.lock();
        let mut queue = self.read_queue()?;
        let mut dead = self.dead_letters()?;
        let done: BTreeSet<String> = results.iter().map(|(e, _)| e.entry_id.clone()).collect();
        queue.retain(|entry| !done.contains(&entry.entry_id));

        for (entry, failed) in results {
            if failed.is_empty() {
                report.delivered += 1;
                continue;
            }
            let retries: Vec<QueuedPayload> = if entry.target.is_none()
                && failed.len() < adapters.len()
            {
                failed
                    .into_iter()
                    .map(|name| QueuedPayload {
                        entry_id: Uuid::new_v4().to_string(),
                        target: Some(name),
                        tries: entry.tries + 1,
                        ..entry.clone()
                    })
                    .collect()
            } else {
                vec![QueuedPayload {
                    tries: entry.tries + 1,
                    ..entry
                }]
            };
            for retry in retries {
                if self.max_attempts > 0 && retry.tries >= self.max_attempts {
                    warn!(
                        entry = %retry.entry_id,
                        id = %retry.payload.id,
                        tries = retry.tries,
                        "autosave entry out of attempts, moved to dead letters"
                    );
                    report.dead_lettered += 1;
                    dead.push(retry);
                } else {
                    report.requeued += 1;
                    queue.push(retry);
                }
            }
        }

        self.backend.write_json(QUEUE_KEY, &queue)?;
        if report.dead_lettered > 0 {
            self.backend.write_json(DEAD_KEY, &dead)?;
        }
        debug!(
            attempted = report.attempted,
            delivered = report.delivered,
            remaining = queue.len(),
            "autosave flush"
        );
        Ok(report)
    }
}

/// Why a flush was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// Connectivity came back.
    Online,
    /// The host became visible or hidden.
    Visibility { visible: bool, online: bool },
}

impl FlushTrigger {
    pub fn should_flush(&self) -> bool {
        match self {
            FlushTrigger::Online => true,
            FlushTrigger::Visibility { visible, online } => *visible && *online,
        }
    }
}

/// Lets at most one flush through per `debounce` window.
#[derive(Debug, Clone)]
pub struct FlushGate {
    debounce: Duration,
    last: Option<Instant>,
}

impl FlushGate {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            last: None,
        }
    }

    pub fn ready(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last {
            if now.saturating_duration_since(last) < self.debounce {
                return false;
            }
        }
        self.last = Some(now);
        true
    }
}

/// Flush in response to triggers until every sender is dropped.
pub fn spawn_flusher<B>(
    queue: Arc<AutosaveQueue<B>>,
    adapters: Vec<Arc<dyn DriveAdapter>>,
    mut triggers: mpsc::Receiver<FlushTrigger>,
    batch: usize,
    debounce: Duration,
) -> JoinHandle<()>
where
    B: StorageBackend + 'static,
{
    tokio::spawn(async move {
        let mut gate = FlushGate::new(debounce);
        while let Some(trigger) = triggers.recv().await {
            if !trigger.should_flush() {
                debug!(?trigger, "flush trigger ignored");
                continue;
            }
            if !gate.ready(Instant::now()) {
                debug!(?trigger, "flush debounced");
                continue;
            }
            match queue.flush_all(batch, &adapters).await {
                Ok(report) if report.attempted > 0 => info!(
                    delivered = report.delivered,
                    requeued = report.requeued,
                    dead = report.dead_lettered,
                    "autosave flushed"
                ),
                Ok(_) => {}
                Err(err) => warn!(error = %err, "autosave flush failed"),
            }
        }
        debug!("autosave flusher stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::drives::WriteOutcome;
    use crate::store::MemBackend;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct Switchable {
        name: &'static str,
        online: AtomicBool,
        delivered: Mutex<Vec<DriveWrite>>,
        calls: AtomicUsize,
    }

    impl Switchable {
        fn new(name: &'static str, online: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                online: AtomicBool::new(online),
                delivered: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl DriveAdapter for Switchable {
        fn name(&self) -> &str {
            self.name
        }

        async fn write(&self, write: &DriveWrite) -> WriteOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.online.load(Ordering::SeqCst) {
                self.delivered.lock().unwrap().push(write.clone());
                WriteOutcome::Ok
            } else {
                WriteOutcome::failed("offline")
            }
        }
    }

    fn queue(max_attempts: u32) -> AutosaveQueue<MemBackend> {
        AutosaveQueue::new(
            Arc::new(MemBackend::new()),
            Arc::new(ManualClock::default()),
            max_attempts,
        )
    }

    #[test]
    fn test_snapshot_versions_are_monotonic() {
        let q = queue(0);
        assert_eq!(q.snapshot("note", "n1", json!("a")).unwrap().version, 1);
        assert_eq!(q.snapshot("note", "n1", json!("b")).unwrap().version, 2);
        assert_eq!(q.snapshot("note", "n2", json!("c")).unwrap().version, 1);

        let latest = q.latest("note", "n1").unwrap().unwrap();
        assert_eq!(latest.content, json!("b"));
        assert_eq!(q.pending().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_flush_delivers_and_removes() {
        let q = queue(0);
        q.snapshot("note", "n1", json!({"t": 1})).unwrap();
        let drive = Switchable::new("cloud", true);
        let adapters: Vec<Arc<dyn DriveAdapter>> = vec![drive.clone()];

        let report = q.flush_all(10, &adapters).await.unwrap();
        assert_eq!(report.delivered, 1);
        assert!(q.pending().unwrap().is_empty());
        let delivered = drive.delivered.lock().unwrap();
        assert_eq!(delivered[0].path.as_deref(), Some("autosave/note/n1"));
    }

    #[tokio::test]
    async fn test_failures_move_to_back_with_tries() {
        let q = queue(0);
        q.snapshot("note", "first", json!(1)).unwrap();
        q.snapshot("note", "second", json!(2)).unwrap();
        let drive = Switchable::new("cloud", false);
        let adapters: Vec<Arc<dyn DriveAdapter>> = vec![drive.clone()];

        let report = q.flush_all(1, &adapters).await.unwrap();
        assert_eq!(report.requeued, 1);
        let pending = q.pending().unwrap();
        assert_eq!(pending[0].payload.id, "second");
        assert_eq!(pending[1].payload.id, "first");
        assert_eq!(pending[1].tries, 1);

        drive.online.store(true, Ordering::SeqCst);
        let report = q.flush_all(10, &adapters).await.unwrap();
        assert_eq!(report.delivered, 2);
        assert!(q.pending().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dead_letter_after_max_attempts() {
        let q = queue(2);
        q.snapshot("note", "n1", json!(1)).unwrap();
        let adapters: Vec<Arc<dyn DriveAdapter>> = vec![Switchable::new("cloud", false)];

        q.flush_all(10, &adapters).await.unwrap();
        assert_eq!(q.pending().unwrap().len(), 1);
        let report = q.flush_all(10, &adapters).await.unwrap();
        assert_eq!(report.dead_lettered, 1);
        assert!(q.pending().unwrap().is_empty());
        assert_eq!(q.dead_letters().unwrap()[0].tries, 2);
    }

    #[tokio::test]
    async fn test_partial_failure_targets_failed_adapter_only() {
        let q = queue(0);
        q.snapshot("note", "n1", json!(1)).unwrap();
        let up = Switchable::new("up", true);
        let down = Switchable::new("down", false);
        let adapters: Vec<Arc<dyn DriveAdapter>> = vec![up.clone(), down.clone()];

        q.flush_all(10, &adapters).await.unwrap();
        let pending = q.pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].target.as_deref(), Some("down"));

        down.online.store(true, Ordering::SeqCst);
        q.flush_all(10, &adapters).await.unwrap();
        assert_eq!(up.calls.load(Ordering::SeqCst), 1);
        assert_eq!(down.delivered.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_targeted_entry_waits_for_its_adapter() {
        let q = queue(0);
        q.requeue(&DriveWrite::new("r1", json!({})).at("items/working/r1"), "mirror")
            .unwrap();
        let other: Vec<Arc<dyn DriveAdapter>> = vec![Switchable::new("other", true)];

        let report = q.flush_all(10, &other).await.unwrap();
        assert_eq!(report.attempted, 0);
        assert_eq!(q.pending().unwrap().len(), 1);
    }

    #[test]
    fn test_triggers_and_gate() {
        assert!(FlushTrigger::Online.should_flush());
        assert!(!FlushTrigger::Visibility { visible: true, online: false }.should_flush());
        assert!(!FlushTrigger::Visibility { visible: false, online: true }.should_flush());
        assert!(FlushTrigger::Visibility { visible: true, online: true }.should_flush());

        let mut gate = FlushGate::new(Duration::from_millis(500));
        let t0 = Instant::now();
        assert!(gate.ready(t0));
        assert!(!gate.ready(t0 + Duration::from_millis(100)));
        assert!(gate.ready(t0 + Duration::from_millis(600)));
    }

    #[tokio::test]
    async fn test_flusher_drains_on_online_trigger() {
        let q = Arc::new(queue(0));
        q.snapshot("note", "n1", json!(1)).unwrap();
        let drive = Switchable::new("cloud", true);
        let (tx, rx) = mpsc::channel(4);
        let handle = spawn_flusher(
            q.clone(),
            vec![drive.clone() as Arc<dyn DriveAdapter>],
            rx,
            8,
            Duration::from_millis(0),
        );

        tx.send(FlushTrigger::Online).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        assert!(q.pending().unwrap().is_empty());
        assert_eq!(drive.delivered.lock().unwrap().len(), 1);
    }
}
