use super::reconcile::{parse_deltas, reconcile, Delta, DeltaStep};
use super::{Step, TaskBoardSnapshot, TaskRecord, TaskState};
use crate::clamp::Limits;
use crate::clock::SharedClock;
use crate::drives::{DriveWrite, FanOut};
use crate::error::{NotepadError, Result};
use crate::store::StorageBackend;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const BOARD_PATH: &str = "tasks/board";
pub const UI_HINT_PATH: &str = "ui/tasks";
pub const REGISTRY_PATH: &str = "registry/tasks";
pub const LAST_ACTIVE_PATH: &str = "pointers/last-active";
pub const DELTA_PREFIX: &str = "tasks/deltas/";
pub const AUDIT_PREFIX: &str = "audit/tasks/";

const STAMP_FORMAT: &str = "%Y%m%dT%H%M%S%3fZ";

/// Task board operations over the drive fan-out.
///
/// The board is re-read before every mutation, so several services over the
/// same storage see each other's writes. Each mutation bumps the task's
/// revision and writes six documents: the board, a UI hint, the registry
/// pointer, the last-active pointer, a step delta and an audit entry.
pub struct TaskService<B: StorageBackend> {
    fanout: Arc<FanOut<B>>,
    clock: SharedClock,
    limits: Limits,
    actor: Option<String>,
}

impl<B: StorageBackend + 'static> TaskService<B> {
    pub fn new(fanout: Arc<FanOut<B>>, clock: SharedClock, limits: Limits) -> Self {
        Self {
            fanout,
            clock,
            limits,
            actor: None,
        }
    }

    /// Name stamped into `last_actor` and the audit log.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    fn read_board(&self) -> Result<TaskBoardSnapshot> {
        Ok(self.fanout.local().read_json(BOARD_PATH)?.unwrap_or_default())
    }

    /// Read the board and fold in any outstanding step deltas.
    ///
    /// The board is rewritten only if a delta changed it. Every delta document
    /// that was read is removed afterwards, applied or not.
    pub fn load(&self) -> Result<TaskBoardSnapshot> {
        let mut board = self.read_board()?;
        let local = self.fanout.local();
        let keys = local.keys(DELTA_PREFIX)?;
        if keys.is_empty() {
            return Ok(board);
        }

        let mut deltas = Vec::new();
        for key in &keys {
            match local.read_json::<Value>(key) {
                Ok(Some(raw)) => deltas.extend(parse_deltas(key, &raw)),
                Ok(None) => {}
                Err(err) => warn!(delta = %key, error = %err, "unreadable delta skipped"),
            }
        }

        let now = self.clock.now();
        let report = reconcile(&mut board, deltas, now);
        if report.changed() {
            board.version += 1;
            board.updated = Some(now);
            self.fanout
                .dispatch(DriveWrite::new("board", serde_json::to_value(&board)?).at(BOARD_PATH))?;
            info!(
                tasks = report.changed_tasks.len(),
                applied = report.applied,
                "task board reconciled"
            );
        }
        for key in &keys {
            if let Err(err) = local.remove(key) {
                warn!(delta = %key, error = %err, "could not remove consumed delta");
            }
        }
        Ok(board)
    }

    pub fn get(&self, task_id: &str) -> Result<Option<TaskRecord>> {
        Ok(self.read_board()?.task(task_id).cloned())
    }

    /// Insert or replace a task.
    ///
    /// The stored revision becomes `max(stored, incoming) + 1`, so a brand new
    /// task is stored at revision 1.
    pub fn upsert(&self, mut task: TaskRecord) -> Result<TaskRecord> {
        let now = self.clock.now();
        let mut board = self.read_board()?;

        task.meta.title = self.limits.clamp_title(&task.meta.title);
        for step in &mut task.steps {
            step.label = self.limits.clamp_title(&step.label);
        }
        task.renumber();
        task.tags = self.limits.clamp_tags(&task.tags);

        let stored = board.task(task.id()).map(|t| (t.revision, t.meta.created));
        let previous_steps = board
            .task(task.id())
            .map(|t| t.steps.clone())
            .unwrap_or_default();
        let base = stored.map_or(0, |(rev, _)| rev).max(task.revision);
        task.revision = next_revision(task.id(), base)?;
        task.meta.created = stored.map_or(now, |(_, created)| created);
        task.meta.updated = now;
        task.last_actor = self.actor.clone();

        match board.task_mut(task.id()) {
            Some(slot) => *slot = task.clone(),
            None => board.tasks.push(task.clone()),
        }
        let steps = changed_steps(&previous_steps, &task.steps);
        self.commit(board, &task, steps, "upsert", now)?;
        Ok(task)
    }

    pub fn toggle_step(&self, task_id: &str, step_id: &str) -> Result<TaskRecord> {
        self.mutate(task_id, "toggle_step", |task| {
            let step = task
                .step_mut(step_id)
                .ok_or_else(|| step_not_found(task_id, step_id))?;
            step.done = !step.done;
            Ok(())
        })
    }

    pub fn add_step(&self, task_id: &str, label: &str) -> Result<TaskRecord> {
        let label = self.limits.clamp_title(label);
        self.mutate(task_id, "add_step", |task| {
            let id = task.next_step_id();
            task.steps.push(Step {
                id,
                label,
                done: false,
                ordinal: 0,
                outcome_hint: None,
            });
            task.renumber();
            Ok(())
        })
    }

    pub fn remove_step(&self, task_id: &str, step_id: &str) -> Result<TaskRecord> {
        self.mutate(task_id, "remove_step", |task| {
            let before = task.steps.len();
            task.steps.retain(|s| s.id != step_id);
            if task.steps.len() == before {
                return Err(step_not_found(task_id, step_id));
            }
            task.renumber();
            Ok(())
        })
    }

    pub fn set_state(&self, task_id: &str, state: TaskState) -> Result<TaskRecord> {
        self.mutate(task_id, "set_state", |task| {
            task.state = state;
            Ok(())
        })
    }

    fn mutate<F>(&self, task_id: &str, op: &str, change: F) -> Result<TaskRecord>
    where
        F: FnOnce(&mut TaskRecord) -> Result<()>,
    {
        let now = self.clock.now();
        let mut board = self.read_board()?;
        let task = board
            .task_mut(task_id)
            .ok_or_else(|| NotepadError::TaskNotFound(task_id.to_string()))?;
        let before = task.steps.clone();
        change(task)?;
        task.revision = next_revision(task_id, task.revision)?;
        task.meta.updated = now;
        task.last_actor = self.actor.clone();
        let task = task.clone();
        let steps = changed_steps(&before, &task.steps);
        self.commit(board, &task, steps, op, now)?;
        Ok(task)
    }

    /// Bump the board version and write all six documents. The delta lists
    /// only `steps`, the ones this mutation changed.
    fn commit(
        &self,
        mut board: TaskBoardSnapshot,
        task: &TaskRecord,
        steps: Vec<DeltaStep>,
        op: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        board.version += 1;
        board.updated = Some(now);

        let stamp = now.format(STAMP_FORMAT).to_string();
        let suffix = format!("{}-{}-{}", stamp, task.id(), task.revision);
        let delta = Delta {
            id: task.id().to_string(),
            rev: task.revision,
            steps,
        };
        let registry: Vec<Value> = board
            .tasks
            .iter()
            .map(|t| {
                json!({
                    "id": t.id(),
                    "title": t.meta.title,
                    "state": t.state,
                    "revision": t.revision,
                })
            })
            .collect();

        let writes = [
            (BOARD_PATH.to_string(), serde_json::to_value(&board)?),
            (
                UI_HINT_PATH.to_string(),
                json!({
                    "version": board.version,
                    "updated": now,
                    "focus": task.id(),
                    "title": task.meta.title,
                    "state": task.state,
                    "progress": { "done": task.completed_steps(), "total": task.steps.len() },
                }),
            ),
            (
                REGISTRY_PATH.to_string(),
                json!({ "version": board.version, "tasks": registry }),
            ),
            (
                LAST_ACTIVE_PATH.to_string(),
                json!({ "taskId": task.id(), "at": now, "actor": self.actor }),
            ),
            (
                format!("{}{}", DELTA_PREFIX, suffix),
                serde_json::to_value(&delta)?,
            ),
            (
                format!("{}{}", AUDIT_PREFIX, suffix),
                json!({
                    "task": task.id(),
                    "rev": task.revision,
                    "op": op,
                    "actor": self.actor,
                    "at": now,
                }),
            ),
        ];
        for (path, json) in writes {
            self.fanout.dispatch(DriveWrite::new(task.id(), json).at(path))?;
        }
        debug!(
            task = %task.id(),
            rev = task.revision,
            op,
            version = board.version,
            "task board written"
        );
        Ok(())
    }
}

fn next_revision(task_id: &str, revision: u64) -> Result<u64> {
    revision.checked_add(1).ok_or_else(|| {
        NotepadError::InvalidState(format!("task {} has no revision left", task_id))
    })
}

/// Steps in `after` that are new or whose `done` flag differs from `before`.
fn changed_steps(before: &[Step], after: &[Step]) -> Vec<DeltaStep> {
    after
        .iter()
        .filter(|step| {
            before
                .iter()
                .find(|b| b.id == step.id)
                .map_or(true, |b| b.done != step.done)
        })
        .map(|step| DeltaStep {
            id: step.id.clone(),
            d: step.done,
        })
        .collect()
}

fn step_not_found(task: &str, step: &str) -> NotepadError {
    NotepadError::StepNotFound {
        task: task.to_string(),
        step: step.to_string(),
    }
}
