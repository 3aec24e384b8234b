use std::io::{self, IsTerminal, Write};

use chrono::NaiveDate;
use unicode_width::UnicodeWidthStr;

use crate::calendar::{self, CalendarCell, MonthGrid};
use crate::config::Config;
use crate::datetime::{format_iso_date, format_long_date, month_name, relative_date_label};
use crate::event::{CalendarEvent, EventKind};
use crate::filter::TaskStats;
use crate::goal::{Goal, ProgressTier};
use crate::settings::AppSettings;
use crate::task::{Priority, Task};

const SHORT_ID_LEN: usize = 8;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        Self { color: cfg.color }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, tasks))]
    pub fn print_task_table(&mut self, tasks: &[Task], today: NaiveDate) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let rows = tasks.iter().map(|task| self.task_row(task, today)).collect();
        write_table(&mut out, task_headers(), rows)?;
        Ok(())
    }

    fn task_row(&self, task: &Task, today: NaiveDate) -> Vec<String> {
        let id = self.paint(short_id(&task.id), "33");
        let done = if task.completed { "x" } else { " " }.to_string();
        let priority = match task.priority {
            Priority::High => self.paint(task.priority.as_str(), "31"),
            Priority::Medium => self.paint(task.priority.as_str(), "33"),
            Priority::Low => task.priority.as_str().to_string(),
        };
        let due = task
            .due_date
            .map(|date| {
                let text = format_iso_date(date);
                if date < today && !task.completed {
                    self.paint(&text, "31")
                } else {
                    text
                }
            })
            .unwrap_or_default();
        let tags = task
            .tags
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|tag| format!("#{tag}"))
            .collect::<Vec<_>>()
            .join(" ");

        vec![id, done, priority, due, task.title.clone(), tags]
    }

    #[tracing::instrument(skip(self, task))]
    pub fn print_task_info(&mut self, task: &Task) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "id        {}", task.id)?;
        writeln!(out, "title     {}", task.title)?;
        writeln!(out, "status    {}", if task.completed { "completed" } else { "active" })?;
        writeln!(out, "priority  {}", task.priority)?;
        if let Some(description) = task.description.as_deref() {
            writeln!(out, "desc      {description}")?;
        }
        if let Some(due) = task.due_date {
            writeln!(out, "due       {}", format_iso_date(due))?;
        }
        if let Some(tags) = task.tags.as_deref() {
            writeln!(out, "tags      {}", tags.join(", "))?;
        }
        writeln!(out, "created   {}", task.created_at.to_rfc3339())?;

        Ok(())
    }

    #[tracing::instrument(skip(self, events))]
    pub fn print_event_table(
        &mut self,
        events: &[CalendarEvent],
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let headers = vec![
            "ID".to_string(),
            "Date".to_string(),
            "When".to_string(),
            "Type".to_string(),
            "Title".to_string(),
        ];
        let rows = events
            .iter()
            .map(|event| {
                vec![
                    self.paint(short_id(&event.id), "33"),
                    format_iso_date(event.date),
                    relative_date_label(event.date, today),
                    self.paint(event.kind.as_str(), kind_color(event.kind)),
                    event.title.clone(),
                ]
            })
            .collect();
        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    /// Month grid with a `*` marker on days that carry events.
    #[tracing::instrument(skip(self, grid, events))]
    pub fn print_month_grid(
        &mut self,
        grid: &MonthGrid,
        events: &[CalendarEvent],
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{} {}", month_name(grid.month), grid.year)?;
        let labels = calendar::weekday_labels(grid.week_start)
            .iter()
            .map(|label| format!("{label:>4}"))
            .collect::<String>();
        writeln!(out, "{labels}")?;

        for week in grid.weeks() {
            let mut line = String::new();
            for cell in week {
                line.push_str(&self.grid_cell(*cell, events, today));
            }
            writeln!(out, "{line}")?;
        }
        Ok(())
    }

    fn grid_cell(&self, cell: CalendarCell, events: &[CalendarEvent], today: NaiveDate) -> String {
        let Some(date) = cell.date() else {
            return "    ".to_string();
        };
        let marker = if calendar::events_for_date(events, date).is_empty() {
            ' '
        } else {
            '*'
        };
        let day = format!("{:>3}", chrono::Datelike::day(&date));
        let day = if date == today {
            self.paint(&day, "7")
        } else if calendar::is_weekend(date) {
            self.paint(&day, "2")
        } else {
            day
        };
        format!("{day}{marker}")
    }

    pub fn print_settings(&mut self, settings: &AppSettings) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "dark-mode     {}", if settings.dark_mode { "on" } else { "off" })?;
        writeln!(out, "default-view  {}", settings.default_view)?;
        writeln!(out, "week-start    {}", settings.week_start)?;
        Ok(())
    }

    pub fn print_task_stats(&mut self, stats: &TaskStats) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(
            out,
            "Tasks: {} completed of {} ({} active)",
            stats.completed, stats.total, stats.active
        )?;
        Ok(())
    }

    #[tracing::instrument(skip(self, goals))]
    pub fn print_goal_table(&mut self, goals: &[Goal]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let headers = vec![
            "Progress".to_string(),
            "Target".to_string(),
            "Title".to_string(),
        ];
        let rows = goals
            .iter()
            .map(|goal| {
                let progress = format!("{:>3}%", goal.progress);
                let progress = match goal.tier() {
                    ProgressTier::High => self.paint(&progress, "32"),
                    ProgressTier::Medium => self.paint(&progress, "33"),
                    ProgressTier::Low => progress,
                };
                vec![
                    progress,
                    goal.target_date.map(format_long_date).unwrap_or_default(),
                    goal.title.clone(),
                ]
            })
            .collect();
        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    pub fn print_line(&mut self, line: &str) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{line}")?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn task_headers() -> Vec<String> {
    vec![
        "ID".to_string(),
        "Done".to_string(),
        "Pri".to_string(),
        "Due".to_string(),
        "Title".to_string(),
        "Tags".to_string(),
    ]
}

fn kind_color(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Exam => "31",
        EventKind::Deadline => "33",
        EventKind::Task => "34",
        EventKind::Reminder => "35",
    }
}

fn short_id(id: &str) -> &str {
    id.get(..SHORT_ID_LEN).unwrap_or(id)
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_columns_align_on_visible_width() {
        let mut buf = Vec::new();
        write_table(
            &mut buf,
            vec!["ID".to_string(), "Title".to_string()],
            vec![
                vec!["\x1b[33mab\x1b[0m".to_string(), "Économie".to_string()],
                vec!["abcd".to_string(), "x".to_string()],
            ],
        )
        .expect("write table");

        let text = String::from_utf8(buf).expect("utf8");
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "ID   Title    ");
        assert_eq!(lines[1], "---- -------- ");
        assert_eq!(strip_ansi(lines[2]), "ab   Économie ");
        assert_eq!(lines[3], "abcd x        ");
    }

    #[test]
    fn short_ids_truncate_only_long_values() {
        assert_eq!(short_id("123"), "123");
        assert_eq!(short_id("0123456789abcdef"), "01234567");
    }
}
