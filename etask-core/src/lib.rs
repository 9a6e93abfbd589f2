//! etask-core: task model and the pure derivations every eTask view reads.

pub mod calendar;
pub mod classify;
pub mod error;
pub mod prefs;
pub mod progress;
pub mod task;
pub mod time;

pub use calendar::{
    CalendarContext, CalendarView, bucket_dates, month_grid, navigate, overdue, tasks_for_date,
    view_dates, week_grid,
};
pub use classify::{Bucket, bucket_counts, classify, search};
pub use error::ParseError;
pub use prefs::{Preferences, WeekStart};
pub use progress::{ProgressSource, compute_progress, explain_progress, is_done_by_subtasks};
pub use task::{Priority, Subtask, Task, TaskStatus};
