use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, Utc};
use clap::Subcommand;
use etask_core::{
    Bucket, CalendarContext, CalendarView, Priority, Task, TaskStatus, bucket_counts,
    bucket_dates, classify, compute_progress, explain_progress, navigate, overdue, search,
    time::parse_local_due_to_utc, view_dates,
};
use etask_sync::{
    HttpBackend, MemoryBackend, MutationReport, NewTask, Outcome, TaskBackend, TaskMutation,
    TaskPatch, TaskQuery, TaskSession,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::calendar::{render_cells, tasks_to_ics};
use crate::config::Config;
use crate::state::{read_snapshot, write_snapshot};

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// List tasks in a tab, with progress and per-tab counts
    List {
        /// all, todo, inprogress, completed, important, notes
        #[arg(long, default_value = "all")]
        bucket: String,

        /// Reject unknown bucket names instead of showing everything
        #[arg(long, default_value_t = false)]
        strict: bool,

        /// Case-insensitive match on title or description
        #[arg(long)]
        search: Option<String>,

        /// Only tasks owned by this user (defaults to config backend.user_id)
        #[arg(long)]
        user: Option<u64>,
    },

    /// Show one task with its subtasks and how its progress is derived
    Show { id: u64 },

    /// Print tasks per calendar cell
    Calendar {
        #[arg(long, default_value = "month")]
        view: CalendarView,

        /// Focus date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Move the focus by N days/weeks/months first
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        shift: i32,
    },

    /// Open tasks whose due day has passed
    Overdue,

    /// Write the calendar range as iCalendar to stdout
    ExportIcs {
        #[arg(long, default_value = "month")]
        view: CalendarView,

        #[arg(long)]
        date: Option<NaiveDate>,

        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        shift: i32,
    },

    /// Create a task
    Add {
        title: String,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        priority: Option<Priority>,

        /// "YYYY-MM-DD" or "YYYY-MM-DD HH:MM" in the configured timezone
        #[arg(long)]
        due: Option<String>,
    },

    /// Edit task fields
    Edit {
        id: u64,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        priority: Option<Priority>,

        #[arg(long, conflicts_with = "clear_due")]
        due: Option<String>,

        #[arg(long, default_value_t = false)]
        clear_due: bool,
    },

    /// Delete a task
    Delete { id: u64 },

    /// Set the status: todo, inprogress, completed
    SetStatus { id: u64, status: TaskStatus },

    /// Set the manual progress percentage
    SetProgress {
        id: u64,
        #[arg(allow_hyphen_values = true)]
        percent: i32,
    },

    /// Flip the important star
    Star { id: u64 },

    /// Check or uncheck a subtask
    ToggleSubtask { id: u64, subtask: u64 },

    /// Append a subtask
    AddSubtask { id: u64, title: String },

    /// Rename a subtask
    RenameSubtask { id: u64, subtask: u64, title: String },

    /// Remove a subtask
    DeleteSubtask { id: u64, subtask: u64 },
}

impl TaskCommand {
    fn mutates(&self) -> bool {
        !matches!(
            self,
            TaskCommand::List { .. }
                | TaskCommand::Show { .. }
                | TaskCommand::Calendar { .. }
                | TaskCommand::Overdue
                | TaskCommand::ExportIcs { .. }
        )
    }
}

enum Source {
    Snapshot {
        path: PathBuf,
        backend: Arc<MemoryBackend>,
    },
    Remote,
}

pub async fn run(cmd: TaskCommand, cfg: &Config, snapshot: Option<PathBuf>) -> Result<()> {
    let (source, backend): (Source, Arc<dyn TaskBackend>) = match snapshot {
        Some(path) => {
            debug!(path = %path.display(), "using snapshot backend");
            let memory = Arc::new(MemoryBackend::with_tasks(read_snapshot(&path)?));
            (
                Source::Snapshot {
                    path,
                    backend: memory.clone(),
                },
                memory,
            )
        }
        None => {
            debug!(base_url = %cfg.backend.base_url, "using HTTP backend");
            let http = HttpBackend::new(cfg.backend.base_url.clone(), cfg.backend.token())
                .context("build HTTP backend")?;
            (Source::Remote, Arc::new(http))
        }
    };

    let tz = cfg.preferences.tz()?;
    let prefs = cfg.preferences.preferences();
    let ctx = CalendarContext::at(Utc::now(), tz, prefs.week_start);

    let user_id = match &cmd {
        TaskCommand::List { user: Some(u), .. } => Some(*u),
        _ => cfg.backend.user_filter(),
    };
    let session = TaskSession::new(backend, prefs);
    session
        .load(&TaskQuery {
            user_id,
            search: None,
        })
        .await
        .context("load tasks")?;

    let mutates = cmd.mutates();
    let result = execute(cmd, &session, &ctx).await;

    if mutates {
        for notice in session.take_notices().await {
            eprintln!("! {} (task #{})", notice.message, notice.task_id);
        }
        if let Source::Snapshot { path, backend } = &source {
            write_snapshot(path, &backend.tasks().await)?;
        }
    }
    result
}

async fn execute(cmd: TaskCommand, session: &TaskSession, ctx: &CalendarContext) -> Result<()> {
    match cmd {
        TaskCommand::List {
            bucket,
            strict,
            search: query,
            ..
        } => {
            let bucket = if strict {
                bucket.parse::<Bucket>()?
            } else {
                Bucket::parse_lenient(&bucket)
            };
            let tasks = session.tasks().await;
            let found = search(&tasks, query.as_deref().unwrap_or(""));
            let rows = classify(found, bucket);

            let counts: Vec<String> = bucket_counts(&tasks)
                .iter()
                .map(|(b, n)| format!("{b}:{n}"))
                .collect();
            println!("{}\n", counts.join("  "));
            if rows.is_empty() {
                println!("(no tasks in {bucket})");
            }
            for t in rows {
                println!("{}", task_row(t));
            }
        }

        TaskCommand::Show { id } => {
            let t = session
                .task(id)
                .await
                .with_context(|| format!("task {id} not found"))?;
            println!("{}", task_row(&t));
            if !t.description.is_empty() {
                println!("\n{}\n", t.description);
            }
            if let Some(due) = t.due_date {
                println!("Due: {}", due.with_timezone(&ctx.tz).format("%Y-%m-%d %H:%M"));
            }
            println!("Progress: {}", explain_progress(&t));
            for s in t.sorted_subtasks() {
                let mark = if s.is_completed { "x" } else { " " };
                println!("  [{mark}] {} (#{})", s.title, s.id);
            }
        }

        TaskCommand::Calendar { view, date, shift } => {
            let focus = navigate(date.unwrap_or(ctx.today), view, shift);
            let tasks = session.tasks().await;
            let dates = view_dates(view, focus, ctx.week_start);
            let cells = bucket_dates(&tasks, &dates, ctx);
            println!("{} view around {}\n", view, focus);
            print!("{}", render_cells(&cells, view, ctx));
        }

        TaskCommand::Overdue => {
            let tasks = session.tasks().await;
            let late = overdue(&tasks, ctx);
            if late.is_empty() {
                println!("Nothing overdue.");
            }
            for t in late {
                println!("{}", task_row(t));
            }
        }

        TaskCommand::ExportIcs { view, date, shift } => {
            let focus = navigate(date.unwrap_or(ctx.today), view, shift);
            let tasks = session.tasks().await;
            let dates = view_dates(view, focus, ctx.week_start);
            print!("{}", tasks_to_ics(&tasks, &dates, ctx));
        }

        TaskCommand::Add {
            title,
            description,
            priority,
            due,
        } => {
            let mut draft = NewTask::titled(title);
            draft.description = description.unwrap_or_default();
            draft.priority = priority.unwrap_or(Priority::Medium);
            draft.due_date = due.map(|d| parse_local_due_to_utc(&d, ctx.tz)).transpose()?;
            let t = session.create(&draft).await?;
            println!("Created {}", task_row(&t));
        }

        TaskCommand::Edit {
            id,
            title,
            description,
            priority,
            due,
            clear_due,
        } => {
            let due_date = match (due, clear_due) {
                (_, true) => Some(None),
                (Some(d), false) => Some(Some(parse_local_due_to_utc(&d, ctx.tz)?)),
                (None, false) => None,
            };
            let patch = TaskPatch {
                title,
                description,
                status: None,
                priority,
                due_date,
            };
            if patch.is_empty() {
                bail!("nothing to edit; pass --title, --description, --priority, --due or --clear-due");
            }
            mutate(session, id, TaskMutation::Update(patch)).await?;
        }

        TaskCommand::Delete { id } => {
            let outcome = session.delete(id).await?;
            finish(id, &MutationReport { outcome, auto_complete: None }, None)?;
        }

        TaskCommand::SetStatus { id, status } => {
            mutate(session, id, TaskMutation::SetStatus(status)).await?;
        }
        TaskCommand::SetProgress { id, percent } => {
            mutate(session, id, TaskMutation::SetProgress(percent)).await?;
        }
        TaskCommand::Star { id } => {
            mutate(session, id, TaskMutation::ToggleImportant).await?;
        }
        TaskCommand::ToggleSubtask { id, subtask } => {
            mutate(session, id, TaskMutation::ToggleSubtask { subtask_id: subtask }).await?;
        }
        TaskCommand::AddSubtask { id, title } => {
            mutate(session, id, TaskMutation::AddSubtask { title }).await?;
        }
        TaskCommand::RenameSubtask { id, subtask, title } => {
            mutate(
                session,
                id,
                TaskMutation::RenameSubtask {
                    subtask_id: subtask,
                    title,
                },
            )
            .await?;
        }
        TaskCommand::DeleteSubtask { id, subtask } => {
            mutate(session, id, TaskMutation::DeleteSubtask { subtask_id: subtask }).await?;
        }
    }

    Ok(())
}

async fn mutate(session: &TaskSession, id: u64, mutation: TaskMutation) -> Result<()> {
    let report = session.apply(id, mutation).await?;
    let after = session.task(id).await;
    finish(id, &report, after.as_ref())
}

fn finish(id: u64, report: &MutationReport, after: Option<&Task>) -> Result<()> {
    match &report.outcome {
        Outcome::Committed { .. } => match after {
            Some(t) => println!("Updated {}", task_row(t)),
            None => println!("Done (task #{id})"),
        },
        Outcome::RolledBack { message } => bail!("{message} (task #{id}); local change reverted"),
        Outcome::Discarded => println!("Response discarded (task #{id})"),
    }
    match &report.auto_complete {
        Some(Outcome::Committed { .. }) => println!("All subtasks done; marked completed."),
        Some(Outcome::RolledBack { message }) => eprintln!("! Auto-complete failed: {message}"),
        Some(Outcome::Discarded) | None => {}
    }
    Ok(())
}

fn task_row(t: &Task) -> String {
    let star = if t.priority.is_important() { "*" } else { " " };
    format!(
        "#{:<4} {star} [{:<11}] {:>3}%  {}",
        t.id,
        t.status.label(),
        compute_progress(t),
        t.title
    )
}
