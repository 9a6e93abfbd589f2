//! Calendar bucketing: which tasks land in which day cell.
//!
//! A task with a due date shows on that (local) day only. A task without one
//! shows on today's cell, and only if it was also created today; older undated
//! tasks never reach the calendar.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};
use chrono_tz::Tz;
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;
use crate::prefs::WeekStart;
use crate::task::{Task, TaskStatus};
use crate::time::local_day;

/// Cells in a month grid: six full weeks.
pub const MONTH_GRID_DAYS: usize = 42;

/// Everything the bucketer needs to know about "now" and the user's locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarContext {
    pub today: NaiveDate,
    pub tz: Tz,
    pub week_start: WeekStart,
}

impl CalendarContext {
    pub fn at(now: DateTime<Utc>, tz: Tz, week_start: WeekStart) -> Self {
        Self {
            today: local_day(now, tz),
            tz,
            week_start,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalendarView {
    Day,
    Week,
    #[default]
    Month,
}

impl FromStr for CalendarView {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(CalendarView::Day),
            "week" => Ok(CalendarView::Week),
            "month" => Ok(CalendarView::Month),
            _ => Err(ParseError::UnknownView(s.to_string())),
        }
    }
}

impl fmt::Display for CalendarView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CalendarView::Day => "day",
            CalendarView::Week => "week",
            CalendarView::Month => "month",
        };
        f.write_str(s)
    }
}

pub fn is_on_day(task: &Task, day: NaiveDate, ctx: &CalendarContext) -> bool {
    match task.due_date {
        Some(due) => local_day(due, ctx.tz) == day,
        None => day == ctx.today && local_day(task.created_at, ctx.tz) == ctx.today,
    }
}

pub fn tasks_for_date<'a, I>(tasks: I, day: NaiveDate, ctx: &CalendarContext) -> Vec<&'a Task>
where
    I: IntoIterator<Item = &'a Task>,
{
    tasks
        .into_iter()
        .filter(|t| is_on_day(t, day, ctx))
        .collect()
}

/// One `(day, tasks)` cell per date, in the order given.
pub fn bucket_dates<'a>(
    tasks: &'a [Task],
    dates: &[NaiveDate],
    ctx: &CalendarContext,
) -> Vec<(NaiveDate, Vec<&'a Task>)> {
    dates
        .iter()
        .map(|d| (*d, tasks_for_date(tasks, *d, ctx)))
        .collect()
}

/// Open tasks whose due day is already behind us.
pub fn overdue<'a>(tasks: &'a [Task], ctx: &CalendarContext) -> Vec<&'a Task> {
    tasks
        .iter()
        .filter(|t| t.status != TaskStatus::Completed)
        .filter(|t| t.due_date.is_some_and(|due| local_day(due, ctx.tz) < ctx.today))
        .collect()
}

/// The configured first day of the week on or before `day`.
pub fn start_of_week(day: NaiveDate, week_start: WeekStart) -> NaiveDate {
    let first = week_start.weekday().num_days_from_monday();
    let offset = (day.weekday().num_days_from_monday() + 7 - first) % 7;
    day - Days::new(u64::from(offset))
}

pub fn week_grid(focus: NaiveDate, week_start: WeekStart) -> Vec<NaiveDate> {
    consecutive_days(start_of_week(focus, week_start), 7)
}

/// 42 days starting at the week boundary on/before the 1st of `focus`'s month.
pub fn month_grid(focus: NaiveDate, week_start: WeekStart) -> Vec<NaiveDate> {
    let first = focus.with_day(1).unwrap_or(focus);
    consecutive_days(start_of_week(first, week_start), MONTH_GRID_DAYS)
}

pub fn view_dates(view: CalendarView, focus: NaiveDate, week_start: WeekStart) -> Vec<NaiveDate> {
    match view {
        CalendarView::Day => vec![focus],
        CalendarView::Week => week_grid(focus, week_start),
        CalendarView::Month => month_grid(focus, week_start),
    }
}

/// Move the focus `steps` days, weeks or months (negative goes back). Month
/// steps clamp to the target month's length, so Jan 31 + 1 month is Feb 28/29.
pub fn navigate(focus: NaiveDate, view: CalendarView, steps: i32) -> NaiveDate {
    let n = steps.unsigned_abs();
    let moved = match (view, steps >= 0) {
        (CalendarView::Day, true) => focus.checked_add_days(Days::new(u64::from(n))),
        (CalendarView::Day, false) => focus.checked_sub_days(Days::new(u64::from(n))),
        (CalendarView::Week, true) => focus.checked_add_days(Days::new(7 * u64::from(n))),
        (CalendarView::Week, false) => focus.checked_sub_days(Days::new(7 * u64::from(n))),
        (CalendarView::Month, true) => focus.checked_add_months(Months::new(n)),
        (CalendarView::Month, false) => focus.checked_sub_months(Months::new(n)),
    };
    moved.unwrap_or(focus)
}

fn consecutive_days(start: NaiveDate, count: usize) -> Vec<NaiveDate> {
    start.iter_days().take(count).collect()
}
