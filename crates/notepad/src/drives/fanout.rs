use super::{DriveAdapter, DriveWrite, LocalDrive, SyncStatus, WriteOutcome, LOCAL_DRIVE};
use crate::autosave::AutosaveQueue;
use crate::clock::SharedClock;
use crate::error::Result;
use crate::store::StorageBackend;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tracing::{debug, error, warn};

type StatusMap = Arc<Mutex<BTreeMap<String, SyncStatus>>>;

/// Result of [`FanOut::write_all`], one outcome per destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanOutReport {
    pub local: WriteOutcome,
    pub remotes: Vec<(String, WriteOutcome)>,
}

impl FanOutReport {
    pub fn all_ok(&self) -> bool {
        self.local.is_ok() && self.remotes.iter().all(|(_, o)| o.is_ok())
    }
}

/// Sends each write to the local drive and every remote drive.
pub struct FanOut<B: StorageBackend> {
    local: LocalDrive<B>,
    remotes: Vec<Arc<dyn DriveAdapter>>,
    autosave: Option<Arc<AutosaveQueue<B>>>,
    status: StatusMap,
    clock: SharedClock,
}

fn record_status(status: &StatusMap, name: &str, outcome: &WriteOutcome, clock: &SharedClock) {
    status
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(name.to_string())
        .or_default()
        .record(outcome, clock.now());
}

fn requeue<B: StorageBackend>(
    autosave: Option<&Arc<AutosaveQueue<B>>>,
    write: &DriveWrite,
    target: &str,
) {
    match autosave {
        Some(queue) => {
            if let Err(err) = queue.requeue(write, target) {
                error!(
                    drive = %target,
                    id = %write.id,
                    error = %err,
                    "could not queue failed write"
                );
            }
        }
        None => warn!(drive = %target, id = %write.id, "no autosave queue attached, write dropped"),
    }
}

impl<B: StorageBackend + 'static> FanOut<B> {
    pub fn new(local: LocalDrive<B>, clock: SharedClock) -> Self {
        Self {
            local,
            remotes: Vec::new(),
            autosave: None,
            status: Arc::default(),
            clock,
        }
    }

    pub fn with_remote(mut self, remote: Arc<dyn DriveAdapter>) -> Self {
        self.remotes.push(remote);
        self
    }

    pub fn with_autosave(mut self, queue: Arc<AutosaveQueue<B>>) -> Self {
        self.autosave = Some(queue);
        self
    }

    pub fn local(&self) -> &LocalDrive<B> {
        &self.local
    }

    pub fn remotes(&self) -> &[Arc<dyn DriveAdapter>] {
        &self.remotes
    }

    pub fn autosave(&self) -> Option<&Arc<AutosaveQueue<B>>> {
        self.autosave.as_ref()
    }

    /// Write locally now, then start every remote write in the background.
    ///
    /// Only the local result is returned. Remote writes run on the current
    /// tokio runtime; a failure is recorded in [`FanOut::sync_status`] and the
    /// write is queued for replay. Outside a runtime the remote writes are
    /// queued directly.
    pub fn dispatch(&self, write: DriveWrite) -> Result<()> {
        let local = self.write_local(&write);

        if !self.remotes.is_empty() {
            match Handle::try_current() {
                Ok(handle) => {
                    let write = Arc::new(write);
                    for remote in &self.remotes {
                        let remote = Arc::clone(remote);
                        let write = Arc::clone(&write);
                        let status = Arc::clone(&self.status);
                        let clock = Arc::clone(&self.clock);
                        let autosave = self.autosave.clone();
                        handle.spawn(async move {
                            let outcome = remote.write(&write).await;
                            record_status(&status, remote.name(), &outcome, &clock);
                            if !outcome.is_ok() {
                                requeue(autosave.as_ref(), &write, remote.name());
                            }
                        });
                    }
                }
                Err(_) => {
                    debug!(id = %write.id, "no async runtime, queueing remote writes");
                    for remote in &self.remotes {
                        requeue(self.autosave.as_ref(), &write, remote.name());
                    }
                }
            }
        }

        local
    }

    /// Write to every destination and wait for all of them.
    ///
    /// Failed remote writes are also queued for replay.
    pub async fn write_all(&self, write: &DriveWrite) -> FanOutReport {
        let local = match self.write_local(write) {
            Ok(()) => WriteOutcome::Ok,
            Err(err) => WriteOutcome::failed(err.to_string()),
        };
        let mut remotes = Vec::with_capacity(self.remotes.len());
        for remote in &self.remotes {
            let outcome = remote.write(write).await;
            record_status(&self.status, remote.name(), &outcome, &self.clock);
            if !outcome.is_ok() {
                requeue(self.autosave.as_ref(), write, remote.name());
            }
            remotes.push((remote.name().to_string(), outcome));
        }
        FanOutReport { local, remotes }
    }

    /// Health per destination, keyed by drive name.
    pub fn sync_status(&self) -> BTreeMap<String, SyncStatus> {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn write_local(&self, write: &DriveWrite) -> Result<()> {
        let result = self.local.write_now(write);
        let outcome = match &result {
            Ok(()) => WriteOutcome::Ok,
            Err(err) => {
                error!(key = %write.storage_key(), error = %err, "local drive write failed");
                WriteOutcome::failed(err.to_string())
            }
        };
        record_status(&self.status, LOCAL_DRIVE, &outcome, &self.clock);
        result
    }
}
