//! Derived progress: one percentage reconciled from status, subtasks and the
//! manual slider.
//!
//! Precedence is strict: a completed status wins, then the subtask ratio, then
//! the manual value clamped into range.

use crate::task::{Task, TaskStatus};

/// Which input decided a task's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressSource {
    Completed,
    Subtasks { done: usize, total: usize },
    Manual,
}

pub fn progress_source(task: &Task) -> ProgressSource {
    if task.status == TaskStatus::Completed {
        return ProgressSource::Completed;
    }
    if !task.subtasks.is_empty() {
        return ProgressSource::Subtasks {
            done: task.completed_subtasks(),
            total: task.subtasks.len(),
        };
    }
    ProgressSource::Manual
}

/// Completion percentage in `0..=100`.
pub fn compute_progress(task: &Task) -> u8 {
    match progress_source(task) {
        ProgressSource::Completed => 100,
        ProgressSource::Subtasks { done, total } => ratio_percent(done, total),
        ProgressSource::Manual => clamp_percent(task.manual_progress),
    }
}

/// Human-readable account of which rule produced `compute_progress`.
pub fn explain_progress(task: &Task) -> String {
    match progress_source(task) {
        ProgressSource::Completed => "Task is completed".to_string(),
        ProgressSource::Subtasks { done, total } => format!(
            "{}% based on subtasks ({}/{} completed)",
            ratio_percent(done, total),
            done,
            total
        ),
        ProgressSource::Manual => format!(
            "{}% set manually",
            clamp_percent(task.manual_progress)
        ),
    }
}

/// True when every subtask is checked (and there is at least one). This is the
/// trigger for the auto-complete policy.
pub fn is_done_by_subtasks(task: &Task) -> bool {
    !task.subtasks.is_empty() && task.subtasks.iter().all(|s| s.is_completed)
}

pub fn clamp_percent(value: i32) -> u8 {
    value.clamp(0, 100) as u8
}

// Round half up in integer arithmetic: floor((200*done + total) / (2*total)).
fn ratio_percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let done = done.min(total) as u64;
    let total = total as u64;
    ((200 * done + total) / (2 * total)) as u8
}
