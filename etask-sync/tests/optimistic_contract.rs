use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use etask_core::{Preferences, Priority, Subtask, Task, TaskStatus, compute_progress};
use etask_sync::{
    BackendError, MemoryBackend, NewTask, Operation, Outcome, SyncError, TaskBackend,
    TaskMutation, TaskPatch, TaskQuery, TaskSession,
};
use std::sync::Arc;
use tokio::sync::Semaphore;

fn base_task(id: u64) -> Task {
    Task::new(id, format!("task {id}"), Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap())
}

async fn session_with(tasks: Vec<Task>, prefs: Preferences) -> (Arc<MemoryBackend>, TaskSession) {
    let backend = Arc::new(MemoryBackend::with_tasks(tasks));
    let session = TaskSession::new(backend.clone(), prefs);
    session.load(&TaskQuery::default()).await.unwrap();
    (backend, session)
}

#[tokio::test]
async fn failed_progress_change_rolls_back_to_snapshot() {
    let original = base_task(1).with_manual_progress(40);
    let (backend, session) = session_with(vec![original.clone()], Preferences::default()).await;
    backend.fail_next(Operation::PatchProgress).await;

    let report = session.apply(1, TaskMutation::SetProgress(60)).await.unwrap();

    assert_eq!(
        report.outcome,
        Outcome::RolledBack {
            message: "Failed to update progress".to_string()
        }
    );
    assert_eq!(session.task(1).await.unwrap(), original);
    let notices = session.take_notices().await;
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].message, "Failed to update progress");
    assert!(session.take_notices().await.is_empty());
}

#[tokio::test]
async fn bodyless_patch_keeps_optimistic_value() {
    let (_, session) = session_with(vec![base_task(1)], Preferences::default()).await;

    let report = session
        .apply(1, TaskMutation::SetStatus(TaskStatus::InProgress))
        .await
        .unwrap();

    assert_eq!(report.outcome, Outcome::Committed { reconciled: false });
    assert_eq!(session.task(1).await.unwrap().status, TaskStatus::InProgress);
}

#[tokio::test]
async fn server_entity_replaces_optimistic_value() {
    let original = base_task(1);
    let (_, session) = session_with(vec![original.clone()], Preferences::default()).await;

    let report = session.apply(1, TaskMutation::ToggleImportant).await.unwrap();

    assert_eq!(report.outcome, Outcome::Committed { reconciled: true });
    let now = session.task(1).await.unwrap();
    assert_eq!(now.priority, Priority::High);
    // Server-computed timestamp came back with the entity.
    assert!(now.updated_at > original.updated_at);
}

#[tokio::test]
async fn completing_last_subtask_auto_completes_task() {
    let task = base_task(1)
        .with_subtask(Subtask::new(1, "a", 0).completed())
        .with_subtask(Subtask::new(2, "b", 1));
    let (backend, session) = session_with(vec![task], Preferences::default()).await;

    let report = session
        .apply(1, TaskMutation::ToggleSubtask { subtask_id: 2 })
        .await
        .unwrap();

    assert!(report.outcome.is_committed());
    assert_eq!(report.auto_complete, Some(Outcome::Committed { reconciled: false }));
    let local = session.task(1).await.unwrap();
    assert_eq!(local.status, TaskStatus::Completed);
    assert_eq!(compute_progress(&local), 100);
    assert_eq!(backend.get_task(1).await.unwrap().status, TaskStatus::Completed);
}

#[tokio::test]
async fn auto_complete_disabled_leaves_status_alone() {
    let task = base_task(1).with_subtask(Subtask::new(1, "a", 0));
    let prefs = Preferences {
        auto_complete: false,
        ..Preferences::default()
    };
    let (_, session) = session_with(vec![task], prefs).await;

    let report = session
        .apply(1, TaskMutation::ToggleSubtask { subtask_id: 1 })
        .await
        .unwrap();

    assert!(report.auto_complete.is_none());
    let local = session.task(1).await.unwrap();
    assert_eq!(local.status, TaskStatus::ToDo);
    assert_eq!(compute_progress(&local), 100);
}

#[tokio::test]
async fn failed_auto_complete_keeps_the_subtask_toggle() {
    let task = base_task(1).with_subtask(Subtask::new(1, "a", 0));
    let (backend, session) = session_with(vec![task], Preferences::default()).await;
    backend.fail_next(Operation::PatchStatus).await;

    let report = session
        .apply(1, TaskMutation::ToggleSubtask { subtask_id: 1 })
        .await
        .unwrap();

    assert!(report.outcome.is_committed());
    assert!(matches!(report.auto_complete, Some(Outcome::RolledBack { .. })));
    let local = session.task(1).await.unwrap();
    assert!(local.subtasks[0].is_completed);
    assert_eq!(local.status, TaskStatus::ToDo);
    assert_eq!(
        session.take_notices().await[0].message,
        "Failed to update task status"
    );
}

#[tokio::test]
async fn failed_toggle_does_not_trigger_auto_complete() {
    let task = base_task(1).with_subtask(Subtask::new(1, "a", 0));
    let (backend, session) = session_with(vec![task.clone()], Preferences::default()).await;
    backend.fail_next(Operation::ToggleSubtask).await;

    let report = session
        .apply(1, TaskMutation::ToggleSubtask { subtask_id: 1 })
        .await
        .unwrap();

    assert!(matches!(report.outcome, Outcome::RolledBack { .. }));
    assert!(report.auto_complete.is_none());
    assert_eq!(session.task(1).await.unwrap(), task);
}

#[tokio::test]
async fn update_patch_reconciles_due_date_clear() {
    let task = base_task(1).with_due(Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap());
    let (_, session) = session_with(vec![task], Preferences::default()).await;

    let patch = TaskPatch {
        title: Some("renamed".to_string()),
        due_date: Some(None),
        ..TaskPatch::default()
    };
    session.apply(1, TaskMutation::Update(patch)).await.unwrap();

    let local = session.task(1).await.unwrap();
    assert_eq!(local.title, "renamed");
    assert!(local.due_date.is_none());
}

#[tokio::test]
async fn unknown_task_or_subtask_fails_before_sending() {
    let (backend, session) = session_with(vec![base_task(1)], Preferences::default()).await;
    let calls = backend.calls();

    assert!(matches!(
        session.apply(99, TaskMutation::ToggleImportant).await,
        Err(SyncError::TaskNotFound(99))
    ));
    assert!(matches!(
        session
            .apply(1, TaskMutation::ToggleSubtask { subtask_id: 5 })
            .await,
        Err(SyncError::SubtaskNotFound { .. })
    ));
    assert_eq!(backend.calls(), calls);
}

#[tokio::test]
async fn failed_delete_restores_task_at_its_position() {
    let (backend, session) =
        session_with(vec![base_task(1), base_task(2), base_task(3)], Preferences::default()).await;
    backend.fail_next(Operation::Delete).await;

    let outcome = session.delete(2).await.unwrap();

    assert!(matches!(outcome, Outcome::RolledBack { .. }));
    let ids: Vec<u64> = session.tasks().await.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);

    assert!(session.delete(2).await.unwrap().is_committed());
    let ids: Vec<u64> = session.tasks().await.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![1, 3]);
}

#[tokio::test]
async fn create_appends_backend_entity() {
    let (backend, session) = session_with(vec![base_task(4)], Preferences::default()).await;

    let created = session.create(&NewTask::titled("new")).await.unwrap();
    assert_eq!(created.id, 5);
    assert_eq!(session.tasks().await.len(), 2);

    backend.fail_next(Operation::Create).await;
    assert!(session.create(&NewTask::titled("again")).await.is_err());
    assert_eq!(session.tasks().await.len(), 2);
    assert_eq!(session.take_notices().await[0].message, "Failed to create task");
}

#[tokio::test]
async fn mutations_on_different_tasks_run_concurrently() {
    let (_, session) = session_with(vec![base_task(1), base_task(2)], Preferences::default()).await;

    let (a, b) = tokio::join!(
        session.apply(1, TaskMutation::SetProgress(30)),
        session.apply(2, TaskMutation::ToggleImportant),
    );

    assert!(a.unwrap().outcome.is_committed());
    assert!(b.unwrap().outcome.is_committed());
    assert_eq!(session.task(1).await.unwrap().manual_progress, 30);
    assert_eq!(session.task(2).await.unwrap().priority, Priority::High);
}

/// Holds every subtask toggle until the test releases a permit.
struct GatedBackend {
    inner: MemoryBackend,
    gate: Semaphore,
}

impl GatedBackend {
    fn new(tasks: Vec<Task>) -> Self {
        Self {
            inner: MemoryBackend::with_tasks(tasks),
            gate: Semaphore::new(0),
        }
    }

    fn release(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl TaskBackend for GatedBackend {
    async fn list_tasks(&self, query: &TaskQuery) -> Result<Vec<Task>, BackendError> {
        self.inner.list_tasks(query).await
    }
    async fn get_task(&self, id: u64) -> Result<Task, BackendError> {
        self.inner.get_task(id).await
    }
    async fn create_task(&self, draft: &NewTask) -> Result<Task, BackendError> {
        self.inner.create_task(draft).await
    }
    async fn update_task(&self, id: u64, patch: &TaskPatch) -> Result<Task, BackendError> {
        self.inner.update_task(id, patch).await
    }
    async fn delete_task(&self, id: u64) -> Result<(), BackendError> {
        self.inner.delete_task(id).await
    }
    async fn patch_status(&self, id: u64, status: TaskStatus) -> Result<(), BackendError> {
        self.inner.patch_status(id, status).await
    }
    async fn patch_progress(&self, id: u64, progress: u8) -> Result<(), BackendError> {
        self.inner.patch_progress(id, progress).await
    }
    async fn toggle_importance(&self, id: u64) -> Result<Task, BackendError> {
        self.inner.toggle_importance(id).await
    }
    async fn toggle_subtask(&self, task_id: u64, subtask_id: u64) -> Result<Task, BackendError> {
        self.gate
            .acquire()
            .await
            .map_err(|e| BackendError::Rejected(e.to_string()))?
            .forget();
        self.inner.toggle_subtask(task_id, subtask_id).await
    }
    async fn create_subtask(&self, task_id: u64, title: &str) -> Result<Task, BackendError> {
        self.inner.create_subtask(task_id, title).await
    }
    async fn update_subtask(
        &self,
        task_id: u64,
        subtask_id: u64,
        title: &str,
    ) -> Result<Task, BackendError> {
        self.inner.update_subtask(task_id, subtask_id, title).await
    }
    async fn delete_subtask(&self, task_id: u64, subtask_id: u64) -> Result<Task, BackendError> {
        self.inner.delete_subtask(task_id, subtask_id).await
    }
}

async fn wait_until<F>(session: &TaskSession, mut done: F)
where
    F: FnMut(&Task) -> bool,
{
    for _ in 0..1000 {
        if session.task(1).await.as_ref().is_some_and(&mut done) {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never reached");
}

#[tokio::test]
async fn dropped_view_discards_late_response() {
    let backend = Arc::new(GatedBackend::new(vec![
        base_task(1).with_subtask(Subtask::new(1, "a", 0)),
    ]));
    let session = TaskSession::new(backend.clone(), Preferences::default());
    session.load(&TaskQuery::default()).await.unwrap();

    let mutator = session.mutator();
    let in_flight = tokio::spawn(async move {
        mutator
            .apply(1, TaskMutation::ToggleSubtask { subtask_id: 1 })
            .await
    });

    // Optimistic write lands before the backend answers.
    wait_until(&session, |t| t.subtasks[0].is_completed).await;

    drop(session);
    backend.release();

    let report = in_flight.await.unwrap().unwrap();
    assert_eq!(report.outcome, Outcome::Discarded);
    assert!(report.auto_complete.is_none());
    // The backend still applied it; only the local write was skipped.
    assert!(backend.inner.get_task(1).await.unwrap().subtasks[0].is_completed);
}

#[tokio::test]
async fn same_field_race_last_response_wins() {
    let backend = Arc::new(GatedBackend::new(vec![
        base_task(1)
            .with_subtask(Subtask::new(1, "a", 0))
            .with_subtask(Subtask::new(2, "b", 1)),
    ]));
    let prefs = Preferences {
        auto_complete: false,
        ..Preferences::default()
    };
    let session = TaskSession::new(backend.clone(), prefs);
    session.load(&TaskQuery::default()).await.unwrap();

    let first = session.mutator();
    let second = session.mutator();
    let a = tokio::spawn(async move {
        first
            .apply(1, TaskMutation::ToggleSubtask { subtask_id: 1 })
            .await
    });
    wait_until(&session, |t| t.subtasks[0].is_completed).await;
    let b = tokio::spawn(async move {
        second
            .apply(1, TaskMutation::ToggleSubtask { subtask_id: 1 })
            .await
    });
    wait_until(&session, |t| !t.subtasks[0].is_completed).await;

    backend.release();
    assert!(a.await.unwrap().unwrap().outcome.is_committed());
    // First response reconciled: the server had toggled once.
    assert!(session.task(1).await.unwrap().subtasks[0].is_completed);

    backend.release();
    assert!(b.await.unwrap().unwrap().outcome.is_committed());
    assert!(!session.task(1).await.unwrap().subtasks[0].is_completed);
}

#[tokio::test]
async fn reload_during_toggle_keeps_the_committed_result() {
    let backend = Arc::new(GatedBackend::new(vec![
        base_task(1).with_subtask(Subtask::new(1, "a", 0)),
    ]));
    let session = TaskSession::new(backend.clone(), Preferences::default());
    session.load(&TaskQuery::default()).await.unwrap();

    let mutator = session.mutator();
    let in_flight = tokio::spawn(async move {
        mutator
            .apply(1, TaskMutation::ToggleSubtask { subtask_id: 1 })
            .await
    });
    wait_until(&session, |t| t.subtasks[0].is_completed).await;

    // A filtered reload drops task 1 from the view before the backend answers.
    session.seed(vec![base_task(2)]).await;
    backend.release();

    let report = in_flight.await.unwrap().unwrap();
    assert!(report.outcome.is_committed());
    assert!(report.auto_complete.is_none());
    assert!(session.task(1).await.is_none());
    assert!(backend.inner.get_task(1).await.unwrap().subtasks[0].is_completed);
    assert_eq!(
        backend.inner.get_task(1).await.unwrap().status,
        TaskStatus::ToDo
    );
}
