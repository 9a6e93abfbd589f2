//! Mutations on a single task and the per-mutation state machine.
//!
//! ```text
//! Pending { snapshot, optimistic } --commit--> Committed(server or optimistic)
//!                                  --roll_back--> RolledBack(snapshot)
//! ```
//!
//! The snapshot is the task exactly as it was before the optimistic write, so
//! a rollback restores it byte for byte.

use etask_core::progress::clamp_percent;
use etask_core::{Subtask, Task, TaskStatus};

use crate::backend::{TaskBackend, TaskPatch};
use crate::error::{BackendError, SyncError};

#[derive(Debug, Clone, PartialEq)]
pub enum TaskMutation {
    Update(TaskPatch),
    SetStatus(TaskStatus),
    SetProgress(i32),
    ToggleSubtask { subtask_id: u64 },
    AddSubtask { title: String },
    RenameSubtask { subtask_id: u64, title: String },
    DeleteSubtask { subtask_id: u64 },
    ToggleImportant,
}

impl TaskMutation {
    pub fn kind(&self) -> &'static str {
        match self {
            TaskMutation::Update(_) => "update",
            TaskMutation::SetStatus(_) => "set_status",
            TaskMutation::SetProgress(_) => "set_progress",
            TaskMutation::ToggleSubtask { .. } => "toggle_subtask",
            TaskMutation::AddSubtask { .. } => "add_subtask",
            TaskMutation::RenameSubtask { .. } => "rename_subtask",
            TaskMutation::DeleteSubtask { .. } => "delete_subtask",
            TaskMutation::ToggleImportant => "toggle_important",
        }
    }

    /// What the user is told when the backend refuses this mutation.
    pub fn failure_message(&self) -> &'static str {
        match self {
            TaskMutation::Update(_) => "Failed to update task",
            TaskMutation::SetStatus(_) => "Failed to update task status",
            TaskMutation::SetProgress(_) => "Failed to update progress",
            TaskMutation::ToggleSubtask { .. } => "Failed to update subtask",
            TaskMutation::AddSubtask { .. } => "Failed to add subtask",
            TaskMutation::RenameSubtask { .. } => "Failed to rename subtask",
            TaskMutation::DeleteSubtask { .. } => "Failed to delete subtask",
            TaskMutation::ToggleImportant => "Failed to update importance",
        }
    }

    /// The task as it should look locally before the backend answers.
    pub fn apply_to(&self, task: &Task) -> Result<Task, SyncError> {
        let missing = |subtask_id| SyncError::SubtaskNotFound {
            task_id: task.id,
            subtask_id,
        };

        let out = match self {
            TaskMutation::Update(patch) => patch.applied_to(task),
            TaskMutation::SetStatus(status) => {
                let mut t = task.clone();
                t.status = *status;
                t
            }
            TaskMutation::SetProgress(pct) => {
                let mut t = task.clone();
                t.manual_progress = i32::from(clamp_percent(*pct));
                t
            }
            TaskMutation::ToggleSubtask { subtask_id } => {
                let mut t = task.clone();
                let s = t.subtask_mut(*subtask_id).ok_or_else(|| missing(*subtask_id))?;
                s.is_completed = !s.is_completed;
                t
            }
            TaskMutation::AddSubtask { title } => {
                let mut t = task.clone();
                // Placeholder id; replaced by the backend's entity on commit.
                let id = t.subtasks.iter().map(|s| s.id).max().unwrap_or(0) + 1;
                let order = t.next_subtask_order();
                t.subtasks.push(Subtask::new(id, title.clone(), order));
                t
            }
            TaskMutation::RenameSubtask { subtask_id, title } => {
                let mut t = task.clone();
                t.subtask_mut(*subtask_id)
                    .ok_or_else(|| missing(*subtask_id))?
                    .title = title.clone();
                t
            }
            TaskMutation::DeleteSubtask { subtask_id } => {
                if task.subtask(*subtask_id).is_none() {
                    return Err(missing(*subtask_id));
                }
                let mut t = task.clone();
                t.subtasks.retain(|s| s.id != *subtask_id);
                t
            }
            TaskMutation::ToggleImportant => {
                let mut t = task.clone();
                t.priority = t.priority.toggled_importance();
                t
            }
        };
        Ok(out)
    }

    /// Issue the backend call. `Ok(None)` means the backend answered without
    /// an entity and the optimistic value stands.
    pub async fn send(
        &self,
        backend: &dyn TaskBackend,
        task_id: u64,
    ) -> Result<Option<Task>, BackendError> {
        match self {
            TaskMutation::Update(patch) => backend.update_task(task_id, patch).await.map(Some),
            TaskMutation::SetStatus(status) => {
                backend.patch_status(task_id, *status).await.map(|_| None)
            }
            TaskMutation::SetProgress(pct) => backend
                .patch_progress(task_id, clamp_percent(*pct))
                .await
                .map(|_| None),
            TaskMutation::ToggleSubtask { subtask_id } => {
                backend.toggle_subtask(task_id, *subtask_id).await.map(Some)
            }
            TaskMutation::AddSubtask { title } => {
                backend.create_subtask(task_id, title).await.map(Some)
            }
            TaskMutation::RenameSubtask { subtask_id, title } => backend
                .update_subtask(task_id, *subtask_id, title)
                .await
                .map(Some),
            TaskMutation::DeleteSubtask { subtask_id } => {
                backend.delete_subtask(task_id, *subtask_id).await.map(Some)
            }
            TaskMutation::ToggleImportant => backend.toggle_importance(task_id).await.map(Some),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationState {
    Pending { snapshot: Task, optimistic: Task },
    Committed(Task),
    RolledBack(Task),
}

impl MutationState {
    pub fn begin(current: &Task, mutation: &TaskMutation) -> Result<Self, SyncError> {
        Ok(MutationState::Pending {
            snapshot: current.clone(),
            optimistic: mutation.apply_to(current)?,
        })
    }

    /// The value local state should show while in this state.
    pub fn visible(&self) -> &Task {
        match self {
            MutationState::Pending { optimistic, .. } => optimistic,
            MutationState::Committed(t) | MutationState::RolledBack(t) => t,
        }
    }

    pub fn is_settled(&self) -> bool {
        !matches!(self, MutationState::Pending { .. })
    }

    /// Backend accepted. Its entity wins over the optimistic value when present.
    pub fn commit(self, server: Option<Task>) -> Self {
        match self {
            MutationState::Pending { optimistic, .. } => {
                MutationState::Committed(server.unwrap_or(optimistic))
            }
            settled => settled,
        }
    }

    /// Backend refused. Restore the pre-mutation snapshot.
    pub fn roll_back(self) -> Self {
        match self {
            MutationState::Pending { snapshot, .. } => MutationState::RolledBack(snapshot),
            settled => settled,
        }
    }
}
