//! In-process backend holding tasks in memory.
//!
//! Used for JSON snapshot files and for tests, with failure injection per
//! operation.

use async_trait::async_trait;
use chrono::Utc;
use etask_core::{Subtask, Task, TaskStatus, progress::clamp_percent};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;

use crate::backend::{NewTask, TaskBackend, TaskPatch, TaskQuery};
use crate::error::BackendError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Get,
    Create,
    Update,
    Delete,
    PatchStatus,
    PatchProgress,
    ToggleImportance,
    ToggleSubtask,
    CreateSubtask,
    UpdateSubtask,
    DeleteSubtask,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    tasks: Mutex<Vec<Task>>,
    // Pending injected failures per operation.
    failures: Mutex<HashMap<Operation, usize>>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks: Mutex::new(tasks),
            ..Self::default()
        }
    }

    /// Make the next call to `op` fail.
    pub async fn fail_next(&self, op: Operation) {
        *self.failures.lock().await.entry(op).or_default() += 1;
    }

    /// While offline, every call fails.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    pub async fn tasks(&self) -> Vec<Task> {
        self.tasks.lock().await.clone()
    }

    async fn check(&self, op: Operation) -> Result<(), BackendError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.offline.load(Ordering::Relaxed) {
            return Err(BackendError::Rejected(format!("{op:?}: backend offline")));
        }
        let mut failures = self.failures.lock().await;
        if let Some(n) = failures.get_mut(&op).filter(|n| **n > 0) {
            *n -= 1;
            return Err(BackendError::Rejected(format!("{op:?}: injected failure")));
        }
        Ok(())
    }

    async fn edit<F>(&self, op: Operation, id: u64, f: F) -> Result<Task, BackendError>
    where
        F: FnOnce(&mut Task) -> Result<(), BackendError> + Send,
    {
        self.check(op).await?;
        let mut tasks = self.tasks.lock().await;
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| BackendError::NotFound(format!("task {id}")))?;
        f(task)?;
        task.updated_at = Utc::now();
        Ok(task.clone())
    }
}

fn subtask_mut(task: &mut Task, subtask_id: u64) -> Result<&mut Subtask, BackendError> {
    let task_id = task.id;
    task.subtask_mut(subtask_id)
        .ok_or_else(|| BackendError::NotFound(format!("subtask {subtask_id} of task {task_id}")))
}

#[async_trait]
impl TaskBackend for MemoryBackend {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn list_tasks(&self, query: &TaskQuery) -> Result<Vec<Task>, BackendError> {
        self.check(Operation::List).await?;
        let tasks = self.tasks.lock().await;
        let needle = query.search.as_deref().unwrap_or("").to_lowercase();
        Ok(tasks
            .iter()
            .filter(|t| query.user_id.is_none() || t.user_id == query.user_id)
            .filter(|t| {
                needle.is_empty()
                    || t.title.to_lowercase().contains(&needle)
                    || t.description.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect())
    }

    async fn get_task(&self, id: u64) -> Result<Task, BackendError> {
        self.check(Operation::Get).await?;
        self.tasks
            .lock()
            .await
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("task {id}")))
    }

    async fn create_task(&self, draft: &NewTask) -> Result<Task, BackendError> {
        self.check(Operation::Create).await?;
        if draft.title.trim().is_empty() {
            return Err(BackendError::Rejected("title is required".to_string()));
        }
        let mut tasks = self.tasks.lock().await;
        let id = tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        let mut task = Task::new(id, draft.title.clone(), Utc::now())
            .with_status(draft.status)
            .with_priority(draft.priority)
            .with_description(draft.description.clone())
            .with_manual_progress(draft.manual_progress);
        task.due_date = draft.due_date;
        task.user_id = draft.user_id;
        tasks.push(task.clone());
        Ok(task)
    }

    async fn update_task(&self, id: u64, patch: &TaskPatch) -> Result<Task, BackendError> {
        let patch = patch.clone();
        self.edit(Operation::Update, id, move |t| {
            *t = patch.applied_to(t);
            Ok(())
        })
        .await
    }

    async fn delete_task(&self, id: u64) -> Result<(), BackendError> {
        self.check(Operation::Delete).await?;
        let mut tasks = self.tasks.lock().await;
        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        if tasks.len() == before {
            return Err(BackendError::NotFound(format!("task {id}")));
        }
        Ok(())
    }

    async fn patch_status(&self, id: u64, status: TaskStatus) -> Result<(), BackendError> {
        self.edit(Operation::PatchStatus, id, move |t| {
            t.status = status;
            Ok(())
        })
        .await?;
        Ok(())
    }

    async fn patch_progress(&self, id: u64, progress: u8) -> Result<(), BackendError> {
        self.edit(Operation::PatchProgress, id, move |t| {
            t.manual_progress = i32::from(clamp_percent(i32::from(progress)));
            Ok(())
        })
        .await?;
        Ok(())
    }

    async fn toggle_importance(&self, id: u64) -> Result<Task, BackendError> {
        self.edit(Operation::ToggleImportance, id, |t| {
            t.priority = t.priority.toggled_importance();
            Ok(())
        })
        .await
    }

    async fn toggle_subtask(&self, task_id: u64, subtask_id: u64) -> Result<Task, BackendError> {
        self.edit(Operation::ToggleSubtask, task_id, move |t| {
            let s = subtask_mut(t, subtask_id)?;
            s.is_completed = !s.is_completed;
            Ok(())
        })
        .await
    }

    async fn create_subtask(&self, task_id: u64, title: &str) -> Result<Task, BackendError> {
        self.check(Operation::CreateSubtask).await?;
        if title.trim().is_empty() {
            return Err(BackendError::Rejected("subtask title is required".to_string()));
        }
        let mut tasks = self.tasks.lock().await;
        // Subtask ids are unique across the whole store.
        let next_id = tasks
            .iter()
            .flat_map(|t| t.subtasks.iter().map(|s| s.id))
            .max()
            .unwrap_or(0)
            + 1;
        let task = tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| BackendError::NotFound(format!("task {task_id}")))?;
        let order = task.next_subtask_order();
        task.subtasks.push(Subtask::new(next_id, title, order));
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn update_subtask(
        &self,
        task_id: u64,
        subtask_id: u64,
        title: &str,
    ) -> Result<Task, BackendError> {
        let title = title.to_string();
        self.edit(Operation::UpdateSubtask, task_id, move |t| {
            subtask_mut(t, subtask_id)?.title = title;
            Ok(())
        })
        .await
    }

    async fn delete_subtask(&self, task_id: u64, subtask_id: u64) -> Result<Task, BackendError> {
        self.edit(Operation::DeleteSubtask, task_id, move |t| {
            subtask_mut(t, subtask_id)?;
            t.subtasks.retain(|s| s.id != subtask_id);
            Ok(())
        })
        .await
    }
}
