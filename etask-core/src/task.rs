//! Task model as served by the eTask backend.
//!
//! The backend owns these entities; this crate only reads snapshots of them and
//! derives values (progress, buckets, calendar cells) from those snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TaskStatus {
    ToDo = 0,
    InProgress = 1,
    Completed = 2,
}

impl TaskStatus {
    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::ToDo => "To-Do",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Completed => "Completed",
        }
    }
}

impl From<TaskStatus> for u8 {
    fn from(s: TaskStatus) -> Self {
        s as u8
    }
}

impl TryFrom<u8> for TaskStatus {
    type Error = ParseError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(TaskStatus::ToDo),
            1 => Ok(TaskStatus::InProgress),
            2 => Ok(TaskStatus::Completed),
            _ => Err(ParseError::CodeOutOfRange { kind: "status", code }),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "todo" | "to-do" | "0" => Ok(TaskStatus::ToDo),
            "inprogress" | "in-progress" | "in_progress" | "1" => Ok(TaskStatus::InProgress),
            "completed" | "done" | "2" => Ok(TaskStatus::Completed),
            _ => Err(ParseError::UnknownStatus(s.to_string())),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Priority {
    Low = 0,
    Medium = 1,
    /// Also the "important" / starred flag.
    High = 2,
}

impl Priority {
    pub fn is_important(self) -> bool {
        self == Priority::High
    }

    /// The priority after flipping the star: High goes back to Medium,
    /// anything else becomes High.
    pub fn toggled_importance(self) -> Self {
        match self {
            Priority::High => Priority::Medium,
            Priority::Low | Priority::Medium => Priority::High,
        }
    }
}

impl From<Priority> for u8 {
    fn from(p: Priority) -> Self {
        p as u8
    }
}

impl TryFrom<u8> for Priority {
    type Error = ParseError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Priority::Low),
            1 => Ok(Priority::Medium),
            2 => Ok(Priority::High),
            _ => Err(ParseError::CodeOutOfRange { kind: "priority", code }),
        }
    }
}

impl FromStr for Priority {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "0" => Ok(Priority::Low),
            "medium" | "1" => Ok(Priority::Medium),
            "high" | "2" => Ok(Priority::High),
            _ => Err(ParseError::UnknownPriority(s.to_string())),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        };
        f.write_str(s)
    }
}

/// Checklist item owned by exactly one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub is_completed: bool,
    /// Display position; authoritative over array position.
    #[serde(default)]
    pub order: i32,
}

impl Subtask {
    pub fn new(id: u64, title: impl Into<String>, order: i32) -> Self {
        Self {
            id,
            title: title.into(),
            is_completed: false,
            order,
        }
    }

    pub fn completed(mut self) -> Self {
        self.is_completed = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: u64,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,

    pub status: TaskStatus,
    pub priority: Priority,

    /// No due date means "no deadline", which the calendar treats specially.
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,

    /// Only meaningful while `subtasks` is empty. Not range-checked here.
    #[serde(default)]
    pub manual_progress: i32,

    #[serde(default, deserialize_with = "null_as_default")]
    pub subtasks: Vec<Subtask>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<u64>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(id: u64, title: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            title: title.into(),
            description: String::new(),
            status: TaskStatus::ToDo,
            priority: Priority::Medium,
            due_date: None,
            manual_progress: 0,
            subtasks: Vec::new(),
            user_id: None,
            created_at,
            updated_at: created_at,
        }
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_due(mut self, due: DateTime<Utc>) -> Self {
        self.due_date = Some(due);
        self
    }

    pub fn with_manual_progress(mut self, pct: i32) -> Self {
        self.manual_progress = pct;
        self
    }

    pub fn with_subtask(mut self, subtask: Subtask) -> Self {
        self.subtasks.push(subtask);
        self
    }

    pub fn subtask(&self, subtask_id: u64) -> Option<&Subtask> {
        self.subtasks.iter().find(|s| s.id == subtask_id)
    }

    pub fn subtask_mut(&mut self, subtask_id: u64) -> Option<&mut Subtask> {
        self.subtasks.iter_mut().find(|s| s.id == subtask_id)
    }

    /// Subtasks in display order: by `order`, ties broken by id.
    pub fn sorted_subtasks(&self) -> Vec<&Subtask> {
        let mut out: Vec<&Subtask> = self.subtasks.iter().collect();
        out.sort_by_key(|s| (s.order, s.id));
        out
    }

    /// `order` value for a subtask appended after every existing one.
    pub fn next_subtask_order(&self) -> i32 {
        self.subtasks
            .iter()
            .map(|s| s.order)
            .max()
            .map_or(0, |m| m + 1)
    }

    pub fn completed_subtasks(&self) -> usize {
        self.subtasks.iter().filter(|s| s.is_completed).count()
    }

    pub fn has_notes(&self) -> bool {
        !self.description.is_empty()
    }
}

// The backend sends `null` for empty collections on some routes.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
