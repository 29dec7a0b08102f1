//! Retention policy and the background sweeper.
//!
//! Recycled records live for `recycle_days` and are then purged by
//! [`crate::commands::sweep`]. The sweep runs on a timer only; mutations never
//! trigger it, so purge latency is bounded by the sweep period.

use crate::api::NotepadApi;
use crate::store::StorageBackend;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

const MS_PER_DAY: i64 = 86_400_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retention {
    pub recycle_days: u64,
    /// Journal entries kept; 0 keeps everything.
    pub journal_limit: usize,
}

impl Default for Retention {
    fn default() -> Self {
        Self {
            recycle_days: 7,
            journal_limit: 5000,
        }
    }
}

impl Retention {
    /// True once more than `recycle_days` have passed since `recycled_at`.
    pub fn is_expired(&self, recycled_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let window = i64::try_from(self.recycle_days)
            .unwrap_or(i64::MAX)
            .saturating_mul(MS_PER_DAY);
        (now - recycled_at).num_milliseconds() > window
    }
}

/// Run the retention sweep every `period` on the current tokio runtime.
///
/// The first sweep happens one full period after spawning. Errors are logged
/// and the loop keeps going; abort the handle to stop it.
pub fn spawn_sweeper<B>(api: Arc<Mutex<NotepadApi<B>>>, period: Duration) -> JoinHandle<()>
where
    B: StorageBackend + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;
        info!(period_secs = period.as_secs(), "retention sweeper started");

        loop {
            ticker.tick().await;
            let result = api
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .sweep();
            match result {
                Ok(purged) if purged.is_empty() => debug!("retention sweep: nothing to purge"),
                Ok(_) => {}
                Err(err) => warn!(error = %err, "retention sweep failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn test_expiry_is_strictly_after_window() {
        let retention = Retention::default();
        let recycled = Utc::now();
        assert!(!retention.is_expired(recycled, recycled + ChronoDuration::days(7)));
        assert!(retention.is_expired(
            recycled,
            recycled + ChronoDuration::days(7) + ChronoDuration::milliseconds(1)
        ));
    }

    #[test]
    fn test_zero_day_window_expires_immediately_after() {
        let retention = Retention {
            recycle_days: 0,
            ..Retention::default()
        };
        let recycled = Utc::now();
        assert!(!retention.is_expired(recycled, recycled));
        assert!(retention.is_expired(recycled, recycled + ChronoDuration::seconds(1)));
    }
}
