//! # Configuration
//!
//! Notepad configuration is loaded with [`confique`], layering sources in
//! priority order:
//!
//! 1. **Environment variables**: `NOTEPAD_RECYCLE_DAYS`, `NOTEPAD_DATA_DIR`, etc.
//! 2. **Config file**: an optional `notepad.toml` passed to [`NotepadConfig::load`].
//! 3. **Compiled defaults**: the `#[config(default = ...)]` values below.
//!
//! ## Available Settings
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `recycle_days` | `7` | Days a recycled record survives before the sweep purges it |
//! | `sweep_interval_secs` | `360` | Retention sweep period |
//! | `journal_limit` | `5000` | Journal entries kept (oldest dropped first, `0` = unbounded) |
//! | `max_title_len` | `256` | Title clamp, in chars |
//! | `max_text_len` | `20000` | Free-text clamp, in chars |
//! | `max_tags` | `16` | Tags kept per record |
//! | `max_tag_len` | `48` | Per-tag clamp, in chars |
//! | `max_artifacts` | `12` | Artifacts kept per record |
//! | `autosave_batch` | `8` | Retry-queue entries replayed per flush |
//! | `autosave_debounce_ms` | `1500` | Minimum gap between triggered flushes |
//! | `autosave_max_attempts` | `25` | Retries before an entry is dead-lettered (`0` = unbounded) |
//! | `remote_timeout_secs` | `10` | HTTP timeout for remote mirrors |
//! | `remotes` | none | `[[remotes]]` tables with `name` and `endpoint` |
//! | `data_dir` | OS data dir | Root for the filesystem backend |

use crate::clamp::Limits;
use crate::error::Result;
use crate::retention::Retention;
use confique::Config;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A remote mirror destination.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub name: String,
    pub endpoint: String,
}

/// Configuration for a notepad instance, stored in `notepad.toml`.
#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NotepadConfig {
    /// Days a recycled record is kept before the retention sweep purges it.
    #[config(default = 7, env = "NOTEPAD_RECYCLE_DAYS")]
    pub recycle_days: u64,

    #[config(default = 360, env = "NOTEPAD_SWEEP_INTERVAL_SECS")]
    pub sweep_interval_secs: u64,

    /// Maximum journal entries retained. Zero keeps everything.
    #[config(default = 5000, env = "NOTEPAD_JOURNAL_LIMIT")]
    pub journal_limit: usize,

    #[config(default = 256)]
    pub max_title_len: usize,

    #[config(default = 20000)]
    pub max_text_len: usize,

    #[config(default = 16)]
    pub max_tags: usize,

    #[config(default = 48)]
    pub max_tag_len: usize,

    #[config(default = 12)]
    pub max_artifacts: usize,

    #[config(default = 8)]
    pub autosave_batch: usize,

    #[config(default = 1500)]
    pub autosave_debounce_ms: u64,

    /// Delivery attempts before a queued write is dead-lettered. Zero retries forever.
    #[config(default = 25, env = "NOTEPAD_AUTOSAVE_MAX_ATTEMPTS")]
    pub autosave_max_attempts: u32,

    #[config(default = 10, env = "NOTEPAD_REMOTE_TIMEOUT_SECS")]
    pub remote_timeout_secs: u64,

    /// Remote mirrors. When absent, writes stay local.
    pub remotes: Option<Vec<RemoteConfig>>,

    /// Root directory for the filesystem backend.
    #[config(env = "NOTEPAD_DATA_DIR")]
    pub data_dir: Option<PathBuf>,
}

impl Default for NotepadConfig {
    fn default() -> Self {
        Self {
            recycle_days: 7,
            sweep_interval_secs: 360,
            journal_limit: 5000,
            max_title_len: 256,
            max_text_len: 20_000,
            max_tags: 16,
            max_tag_len: 48,
            max_artifacts: 12,
            autosave_batch: 8,
            autosave_debounce_ms: 1500,
            autosave_max_attempts: 25,
            remote_timeout_secs: 10,
            remotes: None,
            data_dir: None,
        }
    }
}

impl NotepadConfig {
    /// Load from the environment, then `path` (if given and present), then defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = NotepadConfig::builder().env();
        if let Some(path) = path {
            builder = builder.file(path);
        }
        Ok(builder.load()?)
    }

    pub fn limits(&self) -> Limits {
        Limits {
            max_title_len: self.max_title_len,
            max_text_len: self.max_text_len,
            max_tags: self.max_tags,
            max_tag_len: self.max_tag_len,
            max_artifacts: self.max_artifacts,
        }
    }

    pub fn retention(&self) -> Retention {
        Retention {
            recycle_days: self.recycle_days,
            journal_limit: self.journal_limit,
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs)
    }

    pub fn remotes(&self) -> &[RemoteConfig] {
        self.remotes.as_deref().unwrap_or(&[])
    }

    /// Resolve the data directory, falling back to the platform data dir.
    pub fn data_dir(&self) -> Option<PathBuf> {
        self.data_dir.clone().or_else(|| {
            directories::ProjectDirs::from("", "", "notepad-os")
                .map(|dirs| dirs.data_dir().to_path_buf())
        })
    }
}
