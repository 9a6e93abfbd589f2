//! A consumer's local copy of the task list and the optimistic mutation driver.
//!
//! The session owns its `TaskView`. Mutations in flight only hold a weak
//! handle to it: once the session is dropped, late responses are discarded
//! instead of written.

use etask_core::{Preferences, Task, TaskStatus, is_done_by_subtasks};
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::backend::{NewTask, TaskBackend, TaskQuery};
use crate::error::{BackendError, SyncError};
use crate::mutation::{MutationState, TaskMutation};

/// Transient user-facing message about a failed action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub task_id: u64,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct TaskView {
    tasks: Vec<Task>,
    notices: Vec<Notice>,
}

impl TaskView {
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: u64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Overwrite the task with the same id in place. Returns false if it is
    /// no longer in the view.
    fn replace(&mut self, task: Task) -> bool {
        match self.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(slot) => {
                *slot = task;
                true
            }
            None => false,
        }
    }

    fn notify(&mut self, task_id: u64, message: &str) {
        self.notices.push(Notice {
            task_id,
            message: message.to_string(),
        });
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Backend accepted. `reconciled` is true when its entity replaced the
    /// optimistic value.
    Committed { reconciled: bool },
    /// Backend refused; the snapshot is back in place.
    RolledBack { message: String },
    /// The view was dropped before the backend answered.
    Discarded,
}

impl Outcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Outcome::Committed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationReport {
    pub outcome: Outcome,
    /// Set when the mutation triggered the auto-complete follow-up.
    pub auto_complete: Option<Outcome>,
}

pub struct TaskSession {
    view: Arc<Mutex<TaskView>>,
    backend: Arc<dyn TaskBackend>,
    prefs: Preferences,
}

impl TaskSession {
    pub fn new(backend: Arc<dyn TaskBackend>, prefs: Preferences) -> Self {
        Self {
            view: Arc::new(Mutex::new(TaskView::default())),
            backend,
            prefs,
        }
    }

    pub fn prefs(&self) -> Preferences {
        self.prefs
    }

    /// Replace local state with a fresh backend listing.
    pub async fn load(&self, query: &TaskQuery) -> Result<usize, BackendError> {
        let tasks = self.backend.list_tasks(query).await?;
        let n = tasks.len();
        self.seed(tasks).await;
        debug!(backend = self.backend.backend_tag(), tasks = n, "loaded task view");
        Ok(n)
    }

    pub async fn seed(&self, tasks: Vec<Task>) {
        self.view.lock().await.tasks = tasks;
    }

    pub async fn tasks(&self) -> Vec<Task> {
        self.view.lock().await.tasks.clone()
    }

    pub async fn task(&self, id: u64) -> Option<Task> {
        self.view.lock().await.get(id).cloned()
    }

    pub async fn take_notices(&self) -> Vec<Notice> {
        std::mem::take(&mut self.view.lock().await.notices)
    }

    /// A handle that can run mutations without keeping the view alive.
    pub fn mutator(&self) -> Mutator {
        Mutator {
            view: Arc::downgrade(&self.view),
            backend: Arc::clone(&self.backend),
            prefs: self.prefs,
        }
    }

    pub async fn apply(
        &self,
        task_id: u64,
        mutation: TaskMutation,
    ) -> Result<MutationReport, SyncError> {
        self.mutator().apply(task_id, mutation).await
    }

    /// Not optimistic: the task only appears once the backend has assigned it
    /// an id.
    pub async fn create(&self, draft: &NewTask) -> Result<Task, BackendError> {
        match self.backend.create_task(draft).await {
            Ok(task) => {
                self.view.lock().await.tasks.push(task.clone());
                info!(task_id = task.id, "task created");
                Ok(task)
            }
            Err(e) => {
                warn!(error = %e, "task create failed");
                self.view.lock().await.notify(0, "Failed to create task");
                Err(e)
            }
        }
    }

    /// Optimistic removal; on failure the task goes back where it was.
    pub async fn delete(&self, task_id: u64) -> Result<Outcome, SyncError> {
        let (index, snapshot) = {
            let mut view = self.view.lock().await;
            let index = view
                .tasks
                .iter()
                .position(|t| t.id == task_id)
                .ok_or(SyncError::TaskNotFound(task_id))?;
            (index, view.tasks.remove(index))
        };

        match self.backend.delete_task(task_id).await {
            Ok(()) => {
                info!(task_id, "task deleted");
                Ok(Outcome::Committed { reconciled: false })
            }
            Err(e) => {
                let message = "Failed to delete task";
                warn!(task_id, error = %e, "{message}, restoring");
                let mut view = self.view.lock().await;
                let at = index.min(view.tasks.len());
                view.tasks.insert(at, snapshot);
                view.notify(task_id, message);
                Ok(Outcome::RolledBack {
                    message: message.to_string(),
                })
            }
        }
    }
}

#[derive(Clone)]
pub struct Mutator {
    view: Weak<Mutex<TaskView>>,
    backend: Arc<dyn TaskBackend>,
    prefs: Preferences,
}

impl Mutator {
    /// Run one mutation through the optimistic protocol. A committed subtask
    /// toggle that leaves every subtask checked chains a `SetStatus(Completed)`
    /// with its own rollback scope when auto-complete is on.
    pub async fn apply(
        &self,
        task_id: u64,
        mutation: TaskMutation,
    ) -> Result<MutationReport, SyncError> {
        let toggles_subtask = matches!(mutation, TaskMutation::ToggleSubtask { .. });
        let (outcome, settled) = self.run(task_id, mutation).await?;

        let mut report = MutationReport {
            outcome,
            auto_complete: None,
        };

        let Some(task) = settled else {
            return Ok(report);
        };
        if toggles_subtask
            && self.prefs.auto_complete
            && task.status != TaskStatus::Completed
            && is_done_by_subtasks(&task)
        {
            debug!(task_id, "all subtasks done, auto-completing");
            // The toggle has committed; a failed follow-up never fails it.
            let follow_up = match self
                .run(task_id, TaskMutation::SetStatus(TaskStatus::Completed))
                .await
            {
                Ok((outcome, _)) => outcome,
                Err(e) => {
                    debug!(task_id, error = %e, "auto-complete skipped");
                    Outcome::Discarded
                }
            };
            report.auto_complete = Some(follow_up);
        }

        Ok(report)
    }

    /// Returns the outcome and, when committed and still in the view, the task
    /// as it now stands.
    async fn run(
        &self,
        task_id: u64,
        mutation: TaskMutation,
    ) -> Result<(Outcome, Option<Task>), SyncError> {
        let state = {
            let Some(view) = self.view.upgrade() else {
                debug!(task_id, kind = mutation.kind(), "view dropped before mutation");
                return Ok((Outcome::Discarded, None));
            };
            let mut view = view.lock().await;
            let current = view.get(task_id).ok_or(SyncError::TaskNotFound(task_id))?;
            let state = MutationState::begin(current, &mutation)?;
            view.replace(state.visible().clone());
            state
        };
        debug!(task_id, kind = mutation.kind(), "optimistic write applied");

        let response = mutation.send(self.backend.as_ref(), task_id).await;

        let Some(view) = self.view.upgrade() else {
            debug!(task_id, kind = mutation.kind(), "view dropped, discarding response");
            return Ok((Outcome::Discarded, None));
        };
        let mut view = view.lock().await;

        match response {
            Ok(server) => {
                let reconciled = server.is_some();
                let state = state.commit(server);
                let task = state.visible().clone();
                let in_view = view.replace(task.clone());
                info!(task_id, kind = mutation.kind(), reconciled, "mutation committed");
                if !in_view {
                    debug!(task_id, "task left the view while in flight");
                    return Ok((Outcome::Committed { reconciled }, None));
                }
                Ok((Outcome::Committed { reconciled }, Some(task)))
            }
            Err(e) => {
                let message = mutation.failure_message();
                warn!(task_id, kind = mutation.kind(), error = %e, "{message}, rolling back");
                let state = state.roll_back();
                view.replace(state.visible().clone());
                view.notify(task_id, message);
                Ok((
                    Outcome::RolledBack {
                        message: message.to_string(),
                    },
                    None,
                ))
            }
        }
    }
}
