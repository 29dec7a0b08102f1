//! # Task Board
//!
//! Checklist tasks live in one versioned [`TaskBoardSnapshot`] written through
//! the drive fan-out. Every task carries a `revision` that only goes up.
//!
//! - [`service`]: mutations and the six-path write
//! - [`reconcile`]: merging step deltas written by other writers

pub mod reconcile;
pub mod service;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub use reconcile::{reconcile, Delta, DeltaStep, ReconcileReport, SourcedDelta};
pub use service::TaskService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    #[default]
    Ready,
    Active,
    Blocked,
    Done,
    Archived,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Ready => "ready",
            TaskState::Active => "active",
            TaskState::Blocked => "blocked",
            TaskState::Done => "done",
            TaskState::Archived => "archived",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub done: bool,
    /// 1-based position in the task.
    pub ordinal: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome_hint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMeta {
    pub id: String,
    pub title: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
    #[serde(default)]
    pub engine_agnostic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub meta: TaskMeta,
    #[serde(default)]
    pub state: TaskState,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub revision: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_actor: Option<String>,
}

impl TaskRecord {
    /// A fresh task with steps `s1..sN`. Revision 0 and epoch timestamps
    /// until [`TaskService::upsert`] stores it and stamps the service clock.
    pub fn new<I, S>(title: impl Into<String>, step_labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let now = DateTime::<Utc>::UNIX_EPOCH;
        let steps = step_labels
            .into_iter()
            .enumerate()
            .map(|(i, label)| Step {
                id: format!("s{}", i + 1),
                label: label.into(),
                done: false,
                ordinal: i as u32 + 1,
                outcome_hint: None,
            })
            .collect();
        Self {
            meta: TaskMeta {
                id: Uuid::new_v4().to_string(),
                title: title.into(),
                created: now,
                updated: now,
                persona: None,
                engine_agnostic: true,
            },
            state: TaskState::Ready,
            steps,
            tags: Vec::new(),
            revision: 0,
            last_actor: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.meta.id
    }

    pub fn step(&self, step_id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == step_id)
    }

    pub fn step_mut(&mut self, step_id: &str) -> Option<&mut Step> {
        self.steps.iter_mut().find(|s| s.id == step_id)
    }

    /// The next `sN` id not already taken.
    pub fn next_step_id(&self) -> String {
        let max = self
            .steps
            .iter()
            .filter_map(|s| s.id.strip_prefix('s').and_then(|n| n.parse::<u64>().ok()))
            .max()
            .unwrap_or(0);
        format!("s{}", max + 1)
    }

    pub fn renumber(&mut self) {
        for (i, step) in self.steps.iter_mut().enumerate() {
            step.ordinal = i as u32 + 1;
        }
    }

    pub fn completed_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.done).count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskBoardSnapshot {
    /// Bumped on every board write.
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tasks: Vec<TaskRecord>,
}

impl TaskBoardSnapshot {
    pub fn task(&self, id: &str) -> Option<&TaskRecord> {
        self.tasks.iter().find(|t| t.meta.id == id)
    }

    pub fn task_mut(&mut self, id: &str) -> Option<&mut TaskRecord> {
        self.tasks.iter_mut().find(|t| t.meta.id == id)
    }
}
