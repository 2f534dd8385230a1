//! Analysis task records and the store that holds them.
//!
//! A task is written only by the worker that owns its id. Readers may poll
//! concurrently. Once a task reaches `completed` or `failed` it is frozen.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::ChartError;
use crate::model::MatchRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisTask {
    pub id: Uuid,
    pub status: TaskStatus,
    /// 0-100.
    pub progress: u8,
    pub message: String,
    pub result: Option<Vec<MatchRow>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AnalysisTask {
    fn new(id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: TaskStatus::Pending,
            progress: 0,
            message: "queued".to_string(),
            result: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update applied by [`TaskStore::update`]. `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub status: Option<TaskStatus>,
    pub progress: Option<u8>,
    pub message: Option<String>,
    pub result: Option<Vec<MatchRow>>,
}

impl TaskUpdate {
    pub fn processing(progress: u8, message: impl Into<String>) -> Self {
        Self {
            status: Some(TaskStatus::Processing),
            progress: Some(progress),
            message: Some(message.into()),
            result: None,
        }
    }

    pub fn completed(rows: Vec<MatchRow>, message: impl Into<String>) -> Self {
        Self {
            status: Some(TaskStatus::Completed),
            progress: Some(100),
            message: Some(message.into()),
            result: Some(rows),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(TaskStatus::Failed),
            message: Some(message.into()),
            ..Default::default()
        }
    }
}

/// Storage for analysis tasks, keyed by id.
pub trait TaskStore: Send + Sync {
    /// Create a new `pending` task with a fresh id.
    fn create(&self) -> AnalysisTask;

    fn get(&self, id: Uuid) -> Option<AnalysisTask>;

    /// Apply `update` and return the new state.
    ///
    /// Fails with [`ChartError::TaskFinalized`] if the task is already terminal.
    fn update(&self, id: Uuid, update: TaskUpdate) -> Result<AnalysisTask, ChartError>;
}

/// Process-local task store. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<Uuid, AnalysisTask>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TaskStore for InMemoryTaskStore {
    fn create(&self) -> AnalysisTask {
        let task = AnalysisTask::new(Uuid::new_v4());
        self.tasks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(task.id, task.clone());
        debug!(task_id = %task.id, "task created");
        task
    }

    fn get(&self, id: Uuid) -> Option<AnalysisTask> {
        self.tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    fn update(&self, id: Uuid, update: TaskUpdate) -> Result<AnalysisTask, ChartError> {
        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
        let task = tasks.get_mut(&id).ok_or(ChartError::TaskNotFound(id))?;
        if task.status.is_terminal() {
            return Err(ChartError::TaskFinalized(id));
        }

        if let Some(status) = update.status {
            task.status = status;
        }
        if let Some(progress) = update.progress {
            task.progress = progress.min(100);
        }
        if let Some(message) = update.message {
            task.message = message;
        }
        if let Some(result) = update.result {
            task.result = Some(result);
        }
        task.updated_at = Utc::now();

        debug!(task_id = %id, status = ?task.status, progress = task.progress, "task updated");
        Ok(task.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_starts_pending() {
        let store = InMemoryTaskStore::new();
        let task = store.create();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.progress, 0);
        assert!(task.result.is_none());
        assert_eq!(store.get(task.id), Some(task));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn update_applies_only_given_fields() {
        let store = InMemoryTaskStore::new();
        let id = store.create().id;

        let task = store.update(id, TaskUpdate::processing(20, "matching")).unwrap();
        assert_eq!(task.status, TaskStatus::Processing);
        assert_eq!(task.progress, 20);

        let task = store
            .update(
                id,
                TaskUpdate {
                    message: Some("still matching".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(task.progress, 20);
        assert_eq!(task.message, "still matching");
    }

    #[test]
    fn progress_is_clamped() {
        let store = InMemoryTaskStore::new();
        let id = store.create().id;
        let task = store.update(id, TaskUpdate::processing(250, "x")).unwrap();
        assert_eq!(task.progress, 100);
    }

    #[test]
    fn terminal_tasks_are_frozen() {
        let store = InMemoryTaskStore::new();
        let id = store.create().id;
        let done = store
            .update(id, TaskUpdate::completed(vec![MatchRow::default()], "done"))
            .unwrap();
        assert_eq!(done.progress, 100);
        assert_eq!(done.result.as_ref().map(Vec::len), Some(1));

        let err = store.update(id, TaskUpdate::failed("late")).unwrap_err();
        assert_eq!(err, ChartError::TaskFinalized(id));
        assert_eq!(store.get(id).unwrap().status, TaskStatus::Completed);
    }

    #[test]
    fn unknown_task_is_an_error() {
        let store = InMemoryTaskStore::new();
        let id = Uuid::new_v4();
        assert!(store.get(id).is_none());
        assert_eq!(
            store.update(id, TaskUpdate::failed("x")).unwrap_err(),
            ChartError::TaskNotFound(id)
        );
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::Processing).unwrap(),
            "\"processing\""
        );
    }
}
