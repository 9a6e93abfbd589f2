use chrono::{Datelike, Days, NaiveDate};
use etask_core::{CalendarContext, CalendarView, Task, bucket_dates, compute_progress};

/// Print one line per day cell, listing the tasks that land on it.
pub fn render_cells(cells: &[(NaiveDate, Vec<&Task>)], view: CalendarView, ctx: &CalendarContext) -> String {
    let mut s = String::new();
    let focus_month = cells
        .get(cells.len() / 2)
        .map(|(d, _)| d.month())
        .unwrap_or_default();

    for (day, tasks) in cells {
        // Month grids pad with neighbouring months; skip their empty cells.
        if view == CalendarView::Month && day.month() != focus_month && tasks.is_empty() {
            continue;
        }
        let marker = if *day == ctx.today { "*" } else { " " };
        let line = format!("{marker}{} {}", day.format("%a %Y-%m-%d"), summary(tasks.len()));
        s.push_str(line.trim_end());
        s.push('\n');
        for t in tasks {
            s.push_str(&format!(
                "    #{} {} [{}] {}%\n",
                t.id,
                t.title,
                t.status,
                compute_progress(t)
            ));
        }
    }
    s
}

fn summary(n: usize) -> String {
    match n {
        0 => String::new(),
        1 => "(1 task)".to_string(),
        n => format!("({n} tasks)"),
    }
}

/// Emit an iCalendar with one all-day VEVENT per task per cell it lands in.
///
/// UIDs are stable per task and day so re-imports update instead of duplicate.
pub fn tasks_to_ics(tasks: &[Task], dates: &[NaiveDate], ctx: &CalendarContext) -> String {
    let mut s = String::new();
    s.push_str("BEGIN:VCALENDAR\nVERSION:2.0\nPRODID:-//eTask//EN\n");

    for (day, cell) in bucket_dates(tasks, dates, ctx) {
        let next = day.checked_add_days(Days::new(1)).unwrap_or(day);
        for t in cell {
            s.push_str("BEGIN:VEVENT\n");
            s.push_str(&format!("UID:etask-{}-{}@etask\n", t.id, day.format("%Y%m%d")));
            s.push_str(&format!("DTSTART;VALUE=DATE:{}\n", day.format("%Y%m%d")));
            s.push_str(&format!("DTEND;VALUE=DATE:{}\n", next.format("%Y%m%d")));
            s.push_str(&format!("SUMMARY:{}\n", escape_ics(&t.title)));
            let description = format!(
                "Status: {}\nPriority: {}\nProgress: {}%\n{}",
                t.status,
                t.priority,
                compute_progress(t),
                t.description
            );
            s.push_str(&format!("DESCRIPTION:{}\n", escape_ics(description.trim_end())));
            s.push_str("END:VEVENT\n");
        }
    }

    s.push_str("END:VCALENDAR\n");
    s
}

fn escape_ics(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace(',', "\\,")
        .replace(';', "\\;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use etask_core::{WeekStart, week_grid};

    fn ctx() -> CalendarContext {
        CalendarContext {
            today: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            tz: chrono_tz::UTC,
            week_start: WeekStart::Sunday,
        }
    }

    fn tasks() -> Vec<Task> {
        let created = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        vec![
            Task::new(1, "Dentist; bring forms", created)
                .with_due(Utc.with_ymd_and_hms(2025, 3, 12, 15, 0, 0).unwrap()),
            Task::new(2, "Someday", created),
        ]
    }

    #[test]
    fn ics_has_one_all_day_event_per_dated_task() {
        let c = ctx();
        let ics = tasks_to_ics(&tasks(), &week_grid(c.today, c.week_start), &c);
        assert_eq!(ics.matches("BEGIN:VEVENT").count(), 1);
        assert!(ics.contains("UID:etask-1-20250312@etask"));
        assert!(ics.contains("DTSTART;VALUE=DATE:20250312"));
        assert!(ics.contains("DTEND;VALUE=DATE:20250313"));
        assert!(ics.contains("SUMMARY:Dentist\\; bring forms"));
        assert!(ics.ends_with("END:VCALENDAR\n"));
    }

    #[test]
    fn week_render_marks_today_and_lists_tasks() {
        let c = ctx();
        let all = tasks();
        let cells = bucket_dates(&all, &week_grid(c.today, c.week_start), &c);
        let out = render_cells(&cells, CalendarView::Week, &c);
        assert_eq!(out.lines().filter(|l| !l.starts_with("    ")).count(), 7);
        assert!(out.contains("*Mon 2025-03-10"));
        assert!(out.contains(" Wed 2025-03-12 (1 task)"));
        assert!(out.contains("    #1 Dentist; bring forms [To-Do] 0%"));
    }
}
