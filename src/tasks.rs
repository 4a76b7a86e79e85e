//! Background task orchestrator.
//!
//! Runs long operations (sync) off the request path with a single-flight
//! guarantee per task name: while one execution is running, further
//! starts report `AlreadyRunning` instead of spawning a duplicate.
//! Status is process-lifetime only; a restart abandons any in-flight run.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Running,
    Completed,
    Failed,
}

/// Point-in-time view of one task. Overwritten by the next start of the
/// same name; no history is kept.
#[derive(Debug, Clone, Serialize)]
pub struct TaskSnapshot {
    pub state: TaskState,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub result: Option<Value>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// An execution of this name is already in flight; no second one was
    /// spawned. A normal outcome, not an error.
    AlreadyRunning,
}

/// Single-flight task table. Clone shares the table.
#[derive(Clone, Default)]
pub struct TaskManager {
    tasks: Arc<Mutex<HashMap<String, TaskSnapshot>>>,
}

impl TaskManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<String, TaskSnapshot>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start `operation` under `name` unless one is already running.
    ///
    /// The status transition to Running happens under the table lock;
    /// the operation itself runs on its own tokio task and never holds
    /// that lock. On return the entry transitions to Completed with the
    /// result, or to Failed with the stringified error. Faults never
    /// propagate to the caller's task.
    pub fn start<F>(&self, name: &str, operation: F) -> StartOutcome
    where
        F: Future<Output = Result<Value>> + Send + 'static,
    {
        {
            let mut tasks = self.guard();
            if let Some(existing) = tasks.get(name) {
                if existing.state == TaskState::Running {
                    debug!(task = name, "Task already running, not starting another");
                    return StartOutcome::AlreadyRunning;
                }
            }
            tasks.insert(
                name.to_string(),
                TaskSnapshot {
                    state: TaskState::Running,
                    start_time: Utc::now(),
                    end_time: None,
                    result: None,
                    error: None,
                },
            );
        }

        let tasks = Arc::clone(&self.tasks);
        let name = name.to_string();
        tokio::spawn(async move {
            let outcome = operation.await;
            let mut tasks = tasks.lock().unwrap_or_else(|e| e.into_inner());
            let Some(entry) = tasks.get_mut(&name) else {
                return;
            };
            entry.end_time = Some(Utc::now());
            match outcome {
                Ok(result) => {
                    entry.state = TaskState::Completed;
                    entry.result = Some(result);
                    debug!(task = %name, "Task completed");
                }
                Err(e) => {
                    entry.state = TaskState::Failed;
                    entry.error = Some(format!("{e:#}"));
                    warn!(task = %name, error = %e, "Task failed");
                }
            }
        });

        StartOutcome::Started
    }

    /// Non-blocking status read. `None` means the name was never started
    /// this process lifetime.
    pub fn status(&self, name: &str) -> Option<TaskSnapshot> {
        self.guard().get(name).cloned()
    }

    /// All task snapshots, for diagnostics.
    pub fn all(&self) -> HashMap<String, TaskSnapshot> {
        self.guard().clone()
    }
}
