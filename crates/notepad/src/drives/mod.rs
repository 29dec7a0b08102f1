//! # Drive Adapters
//!
//! A drive adapter is a destination for JSON documents. The local drive is the
//! authoritative sink and writes synchronously into the storage backend.
//! Remote drives post over HTTP and may fail at any time; their failures are
//! reported as values, never raised.
//!
//! [`FanOut`] sends one write to every destination: local first, then each
//! remote in the background. Failed remote writes are handed to the
//! [`crate::autosave::AutosaveQueue`] for replay.

pub mod fanout;
pub mod local;
pub mod remote;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use fanout::{FanOut, FanOutReport};
pub use local::{LocalDrive, LOCAL_DRIVE};
pub use remote::RemoteDrive;

/// Backend keys written by the local drive start with this.
pub const DRIVE_PREFIX: &str = "drive/";

/// One document headed for the drives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveWrite {
    pub id: String,
    /// Logical location; falls back to `id` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub json: Value,
}

impl DriveWrite {
    pub fn new(id: impl Into<String>, json: Value) -> Self {
        Self {
            id: id.into(),
            path: None,
            json,
        }
    }

    pub fn at(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// The logical path: `path` if set, else `id`.
    pub fn location(&self) -> &str {
        self.path.as_deref().unwrap_or(&self.id)
    }

    pub fn storage_key(&self) -> String {
        format!("{}{}", DRIVE_PREFIX, self.location())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Ok,
    Failed { error: String },
}

impl WriteOutcome {
    pub fn failed(error: impl Into<String>) -> Self {
        WriteOutcome::Failed {
            error: error.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, WriteOutcome::Ok)
    }
}

#[async_trait]
pub trait DriveAdapter: Send + Sync {
    /// Stable name; autosave entries use it to pick their target.
    fn name(&self) -> &str;

    async fn write(&self, write: &DriveWrite) -> WriteOutcome;
}

/// Health of one destination as seen by the fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub ok_count: u64,
    pub failure_count: u64,
    pub last_error: Option<String>,
    pub last_ok: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
}

impl SyncStatus {
    pub fn record(&mut self, outcome: &WriteOutcome, at: DateTime<Utc>) {
        match outcome {
            WriteOutcome::Ok => {
                self.ok_count += 1;
                self.last_ok = Some(at);
            }
            WriteOutcome::Failed { error } => {
                self.failure_count += 1;
                self.last_error = Some(error.clone());
                self.last_failure = Some(at);
            }
        }
    }

    /// True unless the most recent attempt failed.
    pub fn is_healthy(&self) -> bool {
        match (self.last_ok, self.last_failure) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(ok), Some(failed)) => ok >= failed,
        }
    }
}
