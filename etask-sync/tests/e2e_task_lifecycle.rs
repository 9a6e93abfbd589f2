//! Walk one task from creation to auto-completion and check every view agrees.

use etask_core::{
    Bucket, CalendarContext, Preferences, TaskStatus, WeekStart, classify, compute_progress,
    explain_progress, tasks_for_date,
};
use etask_core::time::parse_timezone;
use etask_sync::{MemoryBackend, NewTask, TaskMutation, TaskQuery, TaskSession};
use std::sync::Arc;

fn in_tab(tasks: &[etask_core::Task], bucket: Bucket, id: u64) -> bool {
    classify(tasks, bucket).iter().any(|t| t.id == id)
}

#[tokio::test]
async fn manual_then_subtasks_then_auto_complete() {
    let backend = Arc::new(MemoryBackend::new());
    let session = TaskSession::new(backend.clone(), Preferences::default());
    session.load(&TaskQuery::default()).await.unwrap();

    let created = session.create(&NewTask::titled("Plan offsite")).await.unwrap();
    let id = created.id;

    let tasks = session.tasks().await;
    assert!(in_tab(&tasks, Bucket::Todo, id));
    assert_eq!(compute_progress(&tasks[0]), 0);

    // The undated task created today shows in today's calendar cell.
    let ctx = CalendarContext::at(
        created.created_at,
        parse_timezone("UTC").unwrap(),
        WeekStart::Sunday,
    );
    assert_eq!(tasks_for_date(&tasks, ctx.today, &ctx).len(), 1);
    assert!(tasks_for_date(&tasks, ctx.today.succ_opt().unwrap(), &ctx).is_empty());

    session.apply(id, TaskMutation::SetProgress(45)).await.unwrap();
    let tasks = session.tasks().await;
    assert_eq!(compute_progress(&tasks[0]), 45);
    assert!(in_tab(&tasks, Bucket::Todo, id));

    for title in ["Book venue", "Send invites"] {
        session
            .apply(id, TaskMutation::AddSubtask { title: title.to_string() })
            .await
            .unwrap();
    }
    let task = session.task(id).await.unwrap();
    let first = task.sorted_subtasks()[0].id;
    let second = task.sorted_subtasks()[1].id;

    session
        .apply(id, TaskMutation::ToggleSubtask { subtask_id: first })
        .await
        .unwrap();
    let task = session.task(id).await.unwrap();
    assert_eq!(compute_progress(&task), 50);
    assert_eq!(explain_progress(&task), "50% based on subtasks (1/2 completed)");
    assert_eq!(task.status, TaskStatus::ToDo);

    let report = session
        .apply(id, TaskMutation::ToggleSubtask { subtask_id: second })
        .await
        .unwrap();
    assert!(report.auto_complete.is_some());

    let tasks = session.tasks().await;
    assert_eq!(tasks[0].status, TaskStatus::Completed);
    assert_eq!(compute_progress(&tasks[0]), 100);
    assert!(!in_tab(&tasks, Bucket::Todo, id));
    assert!(in_tab(&tasks, Bucket::Completed, id));
    assert!(!in_tab(&tasks, Bucket::Important, id));

    // A fresh listing from the backend derives the same values.
    let reloaded = backend.tasks().await;
    assert_eq!(compute_progress(&reloaded[0]), 100);
    assert_eq!(reloaded[0].status, TaskStatus::Completed);
}

#[tokio::test]
async fn starred_task_stays_in_important_after_completion() {
    let backend = Arc::new(MemoryBackend::new());
    let session = TaskSession::new(backend, Preferences::default());
    let task = session.create(&NewTask::titled("Renew passport")).await.unwrap();

    session.apply(task.id, TaskMutation::ToggleImportant).await.unwrap();
    session
        .apply(task.id, TaskMutation::SetStatus(TaskStatus::Completed))
        .await
        .unwrap();

    let tasks = session.tasks().await;
    assert!(in_tab(&tasks, Bucket::Completed, task.id));
    assert!(in_tab(&tasks, Bucket::Important, task.id));
}
