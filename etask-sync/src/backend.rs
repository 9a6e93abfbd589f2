//! The backend collaborator: a CRUD API over tasks and their subtasks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use etask_core::{Priority, Task, TaskStatus};
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

/// Filters for listing tasks. Empty means "everything visible to the caller".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskQuery {
    pub user_id: Option<u64>,
    pub search: Option<String>,
}

/// Fields for a task the backend has not assigned an id to yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: TaskStatus,
    pub priority: Priority,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub manual_progress: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<u64>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            status: TaskStatus::ToDo,
            priority: Priority::Medium,
            due_date: None,
            manual_progress: 0,
            user_id: None,
        }
    }
}

/// Field edits for `update_task`. `None` leaves a field alone; for the due
/// date, `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<DateTime<Utc>>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
    }

    /// `task` with this patch's fields written over it.
    pub fn applied_to(&self, task: &Task) -> Task {
        let mut out = task.clone();
        if let Some(title) = &self.title {
            out.title = title.clone();
        }
        if let Some(description) = &self.description {
            out.description = description.clone();
        }
        if let Some(status) = self.status {
            out.status = status;
        }
        if let Some(priority) = self.priority {
            out.priority = priority;
        }
        if let Some(due) = self.due_date {
            out.due_date = due;
        }
        out
    }
}

/// Subtask calls answer with the whole parent task. Status and progress
/// patches answer with no body.
#[async_trait]
pub trait TaskBackend: Send + Sync {
    fn backend_tag(&self) -> &'static str {
        "unknown"
    }

    async fn list_tasks(&self, query: &TaskQuery) -> Result<Vec<Task>, BackendError>;
    async fn get_task(&self, id: u64) -> Result<Task, BackendError>;
    async fn create_task(&self, draft: &NewTask) -> Result<Task, BackendError>;
    async fn update_task(&self, id: u64, patch: &TaskPatch) -> Result<Task, BackendError>;
    async fn delete_task(&self, id: u64) -> Result<(), BackendError>;

    async fn patch_status(&self, id: u64, status: TaskStatus) -> Result<(), BackendError>;
    async fn patch_progress(&self, id: u64, progress: u8) -> Result<(), BackendError>;
    async fn toggle_importance(&self, id: u64) -> Result<Task, BackendError>;

    async fn toggle_subtask(&self, task_id: u64, subtask_id: u64) -> Result<Task, BackendError>;
    async fn create_subtask(&self, task_id: u64, title: &str) -> Result<Task, BackendError>;
    async fn update_subtask(
        &self,
        task_id: u64,
        subtask_id: u64,
        title: &str,
    ) -> Result<Task, BackendError>;
    async fn delete_subtask(&self, task_id: u64, subtask_id: u64) -> Result<Task, BackendError>;
}
