//! Task records and the registry that owns them.
//!
//! Each task's record lives in its own `watch` channel: the item loop and
//! the command handlers mutate it through the sender, observers read or
//! subscribe. Commands validate and mutate inside one `send_if_modified`
//! closure, so a rejected command changes nothing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tokio::sync::watch;

use crate::error::TaskError;

pub type TaskId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Running,
    Paused,
    Stopped,
    Completed,
    Error,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Paused => "PAUSED",
            TaskStatus::Stopped => "STOPPED",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Error => "ERROR",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Stopped | TaskStatus::Completed | TaskStatus::Error
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full observable state of one download task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub items: Vec<String>,
    pub status: TaskStatus,
    pub progress_percent: u8,
    pub completed_count: usize,
    pub failed_count: usize,
    pub log: Vec<String>,
    pub pause_requested: bool,
    pub stop_requested: bool,
}

impl TaskRecord {
    fn new(id: TaskId, items: Vec<String>) -> Self {
        Self {
            id,
            items,
            status: TaskStatus::Pending,
            progress_percent: 0,
            completed_count: 0,
            failed_count: 0,
            log: Vec::new(),
            pause_requested: false,
            stop_requested: false,
        }
    }

    pub fn processed(&self) -> usize {
        self.completed_count + self.failed_count
    }
}

pub(crate) type TaskHandle = Arc<watch::Sender<TaskRecord>>;

/// Registry of task id -> record channel.
#[derive(Default)]
pub struct TaskStore {
    next_id: AtomicU64,
    tasks: RwLock<HashMap<TaskId, TaskHandle>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new PENDING task.
    pub(crate) fn insert(&self, items: Vec<String>) -> (TaskId, TaskHandle) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, _rx) = watch::channel(TaskRecord::new(id, items));
        let handle = Arc::new(tx);
        self.tasks.write().unwrap().insert(id, Arc::clone(&handle));
        (id, handle)
    }

    fn handle(&self, id: TaskId) -> Result<TaskHandle, TaskError> {
        self.tasks
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(TaskError::NotFound(id))
    }

    pub fn get(&self, id: TaskId) -> Result<TaskRecord, TaskError> {
        Ok(self.handle(id)?.borrow().clone())
    }

    pub fn subscribe(&self, id: TaskId) -> Result<watch::Receiver<TaskRecord>, TaskError> {
        Ok(self.handle(id)?.subscribe())
    }

    pub fn ids(&self) -> Vec<TaskId> {
        let mut ids: Vec<_> = self.tasks.read().unwrap().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Apply `f` if `valid` holds for the current record; otherwise reject
    /// with `InvalidStateTransition` and leave the record untouched.
    fn command(
        &self,
        id: TaskId,
        command: &'static str,
        valid: impl Fn(&TaskRecord) -> bool,
        f: impl FnOnce(&mut TaskRecord),
    ) -> Result<(), TaskError> {
        let handle = self.handle(id)?;
        let mut outcome = Ok(());
        handle.send_if_modified(|r| {
            if valid(r) {
                f(r);
                true
            } else {
                outcome = Err(TaskError::InvalidStateTransition {
                    id,
                    command,
                    status: r.status.as_str(),
                });
                false
            }
        });
        if outcome.is_ok() {
            tracing::info!(task = id, command, "task command accepted");
        }
        outcome
    }

    /// RUNNING -> PAUSED. Takes effect before the next item starts.
    pub fn pause(&self, id: TaskId) -> Result<(), TaskError> {
        self.command(
            id,
            "pause",
            |r| r.status == TaskStatus::Running && !r.stop_requested,
            |r| {
                r.pause_requested = true;
                r.status = TaskStatus::Paused;
                r.log.push("pause requested".to_string());
            },
        )
    }

    /// PAUSED -> RUNNING.
    pub fn resume(&self, id: TaskId) -> Result<(), TaskError> {
        self.command(
            id,
            "resume",
            |r| r.status == TaskStatus::Paused && !r.stop_requested,
            |r| {
                r.pause_requested = false;
                r.status = TaskStatus::Running;
                r.log.push("resumed".to_string());
            },
        )
    }

    /// Request a stop from RUNNING or PAUSED; overrides a pending pause.
    /// The loop reports STOPPED at its next checkpoint.
    pub fn stop(&self, id: TaskId) -> Result<(), TaskError> {
        self.command(
            id,
            "stop",
            |r| matches!(r.status, TaskStatus::Running | TaskStatus::Paused),
            |r| {
                if !r.stop_requested {
                    r.log.push("stop requested".to_string());
                }
                r.stop_requested = true;
                r.pause_requested = false;
            },
        )
    }

    /// Drop a terminal task from the registry.
    pub fn forget(&self, id: TaskId) -> Result<TaskRecord, TaskError> {
        let mut tasks = self.tasks.write().unwrap();
        let handle = tasks.get(&id).ok_or(TaskError::NotFound(id))?;
        let record = handle.borrow().clone();
        if !record.status.is_terminal() {
            return Err(TaskError::InvalidStateTransition {
                id,
                command: "forget",
                status: record.status.as_str(),
            });
        }
        tasks.remove(&id);
        Ok(record)
    }
}
