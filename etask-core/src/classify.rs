//! Tab buckets for the task list.
//!
//! Each bucket is an independent predicate over a single task, so a task can
//! sit in several tabs at once (a starred to-do shows under both "To-Do" and
//! "Important"). Filtering never reorders.

use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;
use crate::task::{Task, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    All,
    Todo,
    InProgress,
    Completed,
    Important,
    Notes,
}

impl Bucket {
    pub const TABS: [Bucket; 6] = [
        Bucket::All,
        Bucket::Todo,
        Bucket::InProgress,
        Bucket::Completed,
        Bucket::Important,
        Bucket::Notes,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Bucket::All => "all",
            Bucket::Todo => "todo",
            Bucket::InProgress => "inprogress",
            Bucket::Completed => "completed",
            Bucket::Important => "important",
            Bucket::Notes => "notes",
        }
    }

    pub fn matches(self, task: &Task) -> bool {
        match self {
            Bucket::All => true,
            Bucket::Todo => task.status == TaskStatus::ToDo,
            Bucket::InProgress => task.status == TaskStatus::InProgress,
            Bucket::Completed => task.status == TaskStatus::Completed,
            Bucket::Important => task.priority.is_important(),
            Bucket::Notes => task.has_notes(),
        }
    }

    /// Compatibility lookup: an unrecognised name selects every task instead
    /// of failing. Use `str::parse` to reject unknown names.
    pub fn parse_lenient(name: &str) -> Bucket {
        name.parse().unwrap_or_else(|_| {
            tracing::debug!(bucket = name, "unknown bucket, showing all tasks");
            Bucket::All
        })
    }
}

impl FromStr for Bucket {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Bucket::All),
            "todo" => Ok(Bucket::Todo),
            "inprogress" => Ok(Bucket::InProgress),
            "completed" => Ok(Bucket::Completed),
            "important" => Ok(Bucket::Important),
            "notes" => Ok(Bucket::Notes),
            _ => Err(ParseError::UnknownBucket(s.to_string())),
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub fn classify<'a, I>(tasks: I, bucket: Bucket) -> Vec<&'a Task>
where
    I: IntoIterator<Item = &'a Task>,
{
    tasks.into_iter().filter(|t| bucket.matches(t)).collect()
}

/// Case-insensitive substring match on title or description. A blank query
/// keeps everything.
pub fn search<'a, I>(tasks: I, query: &str) -> Vec<&'a Task>
where
    I: IntoIterator<Item = &'a Task>,
{
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return tasks.into_iter().collect();
    }
    tasks
        .into_iter()
        .filter(|t| {
            t.title.to_lowercase().contains(&needle)
                || t.description.to_lowercase().contains(&needle)
        })
        .collect()
}

/// Badge counts for every tab, in `Bucket::TABS` order.
pub fn bucket_counts(tasks: &[Task]) -> Vec<(Bucket, usize)> {
    Bucket::TABS
        .iter()
        .map(|b| (*b, tasks.iter().filter(|t| b.matches(t)).count()))
        .collect()
}
