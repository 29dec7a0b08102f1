//! # Domain Model: Records, Artifacts and the Journal
//!
//! The item store persists three kinds of things:
//!
//! - [`Record`]: the base unit. Title, free-text body (`utterance`), tags,
//!   primitive metadata, lifecycle markers and an optional [`Outcome`].
//! - [`Artifact`]: an attachment owned by exactly one record.
//! - [`JournalEntry`]: an append-only audit line per mutation.
//!
//! ## Drives
//!
//! Every record lives in one [`Drive`]. Drives are fixed partitions, not
//! folders: a record moves between them (`update` with a new drive, or
//! `archive`), it is never in two at once. [`Drive::Archive`] is reserved for
//! archived records.
//!
//! ## Lifecycle
//!
//! ```text
//!            recycle              sweep (after recycle_days)
//!   Active ───────────► Recycled ───────────────────────────► purged
//!     ▲  │   ◄───────────
//!     │  │     restore
//!     │  └──────────────► Archived
//!     └──── unarchive ───┘
//! ```
//!
//! Recycled and archived are mutually exclusive. The store rejects recycling
//! an archived record and archiving a recycled one with
//! [`NotepadError::InvalidState`](crate::error::NotepadError::InvalidState).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Drive {
    /// Scratch working memory.
    #[default]
    Working,
    /// Authoritative notes.
    Canonical,
    /// Material shared with other agents or devices.
    Shared,
    /// Pointer partition for archived records.
    Archive,
}

impl Drive {
    pub const ALL: [Drive; 4] = [Drive::Working, Drive::Canonical, Drive::Shared, Drive::Archive];

    pub fn as_str(&self) -> &'static str {
        match self {
            Drive::Working => "working",
            Drive::Canonical => "canonical",
            Drive::Shared => "shared",
            Drive::Archive => "archive",
        }
    }
}

impl fmt::Display for Drive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Drive {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "working" => Ok(Drive::Working),
            "canonical" => Ok(Drive::Canonical),
            "shared" => Ok(Drive::Shared),
            "archive" => Ok(Drive::Archive),
            other => Err(format!("unknown drive: {}", other)),
        }
    }
}

/// The derived lifecycle state of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Active,
    Recycled,
    Archived,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub drive: Drive,
    pub title: String,
    pub utterance: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Primitive-only metadata (strings, numbers, booleans, null).
    #[serde(default)]
    pub meta: BTreeMap<String, Value>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recycled_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,
    /// Drive the record was archived from, so unarchive can put it back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_from: Option<Drive>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
}

impl Record {
    pub fn status(&self) -> RecordStatus {
        if self.recycled_at.is_some() {
            RecordStatus::Recycled
        } else if self.archived_at.is_some() {
            RecordStatus::Archived
        } else {
            RecordStatus::Active
        }
    }

    pub fn is_recycled(&self) -> bool {
        self.recycled_at.is_some()
    }

    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub text: String,
    /// Free-form content type ("text/markdown", "log", ...).
    #[serde(rename = "type")]
    pub kind: String,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalOp {
    Create,
    Update,
    Artifact,
    Archive,
    Recycle,
    Restore,
    Purge,
    Outcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub owner_id: String,
    pub at: DateTime<Utc>,
    pub op: JournalOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Which lifecycle states a listing includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    Active,
    Recycled,
    Archived,
    All,
}

impl StatusFilter {
    pub fn accepts(&self, status: RecordStatus) -> bool {
        match self {
            StatusFilter::Active => status == RecordStatus::Active,
            StatusFilter::Recycled => status == RecordStatus::Recycled,
            StatusFilter::Archived => status == RecordStatus::Archived,
            StatusFilter::All => true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub drive: Option<Drive>,
    pub status: StatusFilter,
    pub tag: Option<String>,
}

impl RecordFilter {
    pub fn matches(&self, record: &Record) -> bool {
        if let Some(drive) = self.drive {
            if record.drive != drive {
                return false;
            }
        }
        if !self.status.accepts(record.status()) {
            return false;
        }
        match &self.tag {
            Some(tag) => record.has_tag(tag),
            None => true,
        }
    }
}
