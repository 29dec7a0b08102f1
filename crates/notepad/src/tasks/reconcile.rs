//! # Conflict Reconciler
//!
//! Other writers leave step deltas behind: `{ "id", "rev", "steps": [{ "id", "d" }] }`
//! where `d` is the step's `done` flag at revision `rev`, listed only for the
//! steps that writer changed. On load they are merged into the board:
//!
//! 1. Sort deltas by `(rev, origin, position)` so the result does not depend
//!    on discovery order.
//! 2. Skip deltas for unknown tasks, and deltas older than the task as it was
//!    before the pass (`rev < revision`). Deltas at `u64::MAX` are skipped
//!    too; no revision can follow them.
//! 3. Apply each step's `d`; unknown step ids are ignored.
//! 4. Once all deltas are in, every task that changed gets
//!    `revision = max(revision, highest applied rev) + 1`.
//!
//! Deltas at the same revision touching different steps both survive. When
//! two touch the same step, the one sorted last wins.

use super::TaskBoardSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaStep {
    pub id: String,
    pub d: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    pub id: String,
    pub rev: u64,
    #[serde(default)]
    pub steps: Vec<DeltaStep>,
}

/// A delta and where it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcedDelta {
    pub origin: String,
    pub position: usize,
    pub delta: Delta,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub applied: usize,
    pub skipped_stale: usize,
    pub skipped_unknown: usize,
    /// Deltas whose revision leaves no room for a successor.
    pub skipped_invalid: usize,
    /// Ids of tasks whose steps changed.
    pub changed_tasks: Vec<String>,
}

impl ReconcileReport {
    pub fn changed(&self) -> bool {
        !self.changed_tasks.is_empty()
    }
}

/// Parse a delta document: one delta object or an array of them.
/// Malformed entries are skipped one by one.
pub fn parse_deltas(origin: &str, raw: &Value) -> Vec<SourcedDelta> {
    let items: Vec<&Value> = match raw {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => vec![raw],
        _ => {
            warn!(origin, "delta document is neither object nor array");
            return Vec::new();
        }
    };
    items
        .into_iter()
        .enumerate()
        .filter_map(|(position, item)| match Delta::deserialize(item) {
            Ok(delta) => Some(SourcedDelta {
                origin: origin.to_string(),
                position,
                delta,
            }),
            Err(err) => {
                warn!(origin, position, error = %err, "skipping malformed delta");
                None
            }
        })
        .collect()
}

pub fn reconcile(
    board: &mut TaskBoardSnapshot,
    mut deltas: Vec<SourcedDelta>,
    now: DateTime<Utc>,
) -> ReconcileReport {
    deltas.sort_by(|a, b| {
        a.delta
            .rev
            .cmp(&b.delta.rev)
            .then_with(|| a.origin.cmp(&b.origin))
            .then_with(|| a.position.cmp(&b.position))
    });

    let mut report = ReconcileReport::default();
    let mut touched: BTreeMap<String, Touched> = BTreeMap::new();
    for sourced in deltas {
        let delta = sourced.delta;
        let Some(task) = board.task_mut(&delta.id) else {
            report.skipped_unknown += 1;
            continue;
        };
        let entry = touched.entry(delta.id.clone()).or_insert(Touched {
            base: task.revision,
            top: task.revision,
            changed: false,
        });
        if delta.rev < entry.base {
            report.skipped_stale += 1;
            continue;
        }
        if delta.rev.checked_add(1).is_none() {
            warn!(
                task = %delta.id,
                rev = delta.rev,
                origin = %sourced.origin,
                "skipping delta with out of range revision"
            );
            report.skipped_invalid += 1;
            continue;
        }
        report.applied += 1;

        for step in &delta.steps {
            if let Some(target) = task.step_mut(&step.id) {
                if target.done != step.d {
                    target.done = step.d;
                    entry.changed = true;
                }
            }
        }
        entry.top = entry.top.max(delta.rev);
        debug!(task = %delta.id, rev = delta.rev, origin = %sourced.origin, "delta applied");
    }

    for (id, entry) in touched.into_iter().filter(|(_, t)| t.changed) {
        if let Some(task) = board.task_mut(&id) {
            // `top` is an applied rev below u64::MAX, or the base when that is higher.
            task.revision = entry.top.saturating_add(1);
            task.meta.updated = now;
            report.changed_tasks.push(id);
        }
    }
    report
}

/// Per-task bookkeeping for one reconcile pass.
struct Touched {
    /// Revision before the pass; staleness is judged against this.
    base: u64,
    /// Highest revision seen: the base or an applied delta.
    top: u64,
    changed: bool,
}
