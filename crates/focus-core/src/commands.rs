use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, anyhow, bail};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use tracing::{debug, info, instrument};

use crate::calendar::{self, month_grid, upcoming_events};
use crate::cli::{Command, EventCommand, SettingField, SettingsCommand, TaskCommand, TaskFieldArgs};
use crate::config::Config;
use crate::datastore::{DataStore, KeyValueStore, Snapshot};
use crate::datetime::{parse_iso_date, relative_date_label};
use crate::event::{CalendarEvent, EventDraft, EventKind};
use crate::filter::{
    PriorityFilter, StatusFilter, TaskQuery, filter_tasks, partition_by_completion, task_stats,
};
use crate::goal::{self, Goal, GoalKind};
use crate::render::Renderer;
use crate::settings::{Page, SettingUpdate};
use crate::task::{Task, TaskDraft};

#[instrument(skip(store, cfg, renderer))]
pub fn dispatch<S: KeyValueStore>(
    store: &mut DataStore<S>,
    cfg: &Config,
    renderer: &mut Renderer,
    command: Option<Command>,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let today = cfg.timezone.date_of(now);
    let Some(command) = command else {
        let page = store.load_settings().default_view;
        debug!(%page, "no command given; showing default view");
        return show_page(store, cfg, renderer, page, today);
    };

    match command {
        Command::Task(cmd) => run_task_command(store, renderer, cmd, now, today),
        Command::Event(cmd) => run_event_command(store, renderer, cmd, now, today),
        Command::Calendar { year, month, shift } => {
            let year = year.unwrap_or_else(|| today.year());
            let month = month.unwrap_or_else(|| today.month());
            let anchor = NaiveDate::from_ymd_opt(year, month, 1)
                .ok_or_else(|| anyhow!("invalid month {year}-{month:02}"))?;
            let anchor = calendar::shift_months(anchor, shift)
                .ok_or_else(|| anyhow!("month out of range: {year}-{month:02} shifted by {shift}"))?;
            show_calendar(store, renderer, anchor.year(), anchor.month(), today)
        }
        Command::Upcoming { limit } => {
            let limit = limit.unwrap_or(cfg.upcoming_limit);
            let upcoming = upcoming_events(&store.load_events(), today, limit);
            if upcoming.is_empty() {
                return renderer.print_line("No upcoming events.");
            }
            renderer.print_event_table(&upcoming, today)
        }
        Command::Dashboard => show_dashboard(store, cfg, renderer, today),
        Command::Goals { file } => show_goals(renderer, file.as_deref()),
        Command::Settings(SettingsCommand::Show) => renderer.print_settings(&store.load_settings()),
        Command::Settings(SettingsCommand::Set(field)) => {
            let settings = store.load_settings().apply(setting_update(field));
            store.save_settings(&settings)?;
            info!(?settings, "settings updated");
            renderer.print_settings(&settings)
        }
        Command::Config => {
            for (key, value) in cfg.entries() {
                renderer.print_line(&format!("{key} = {value}"))?;
            }
            Ok(())
        }
        Command::Reset { yes } => {
            if !yes {
                bail!("reset removes every task, event and setting; rerun with --yes");
            }
            store.reset()?;
            renderer.print_line("All data reset.")
        }
        Command::Export => {
            let snapshot = store.export_snapshot();
            let mut out = io::stdout().lock();
            serde_json::to_writer_pretty(&mut out, &snapshot)?;
            writeln!(out)?;
            Ok(())
        }
        Command::Import { path } => {
            let snapshot = read_snapshot(&path)?;
            store.import_snapshot(&snapshot)?;
            renderer.print_line(&format!(
                "Imported {} tasks and {} events.",
                snapshot.tasks.len(),
                snapshot.events.len()
            ))
        }
    }
}

pub fn setting_update(field: SettingField) -> SettingUpdate {
    match field {
        SettingField::DarkMode { enabled } => SettingUpdate::DarkMode(enabled),
        SettingField::DefaultView { page } => SettingUpdate::DefaultView(page),
        SettingField::WeekStart { start } => SettingUpdate::WeekStart(start),
    }
}

fn show_page<S: KeyValueStore>(
    store: &mut DataStore<S>,
    cfg: &Config,
    renderer: &mut Renderer,
    page: Page,
    today: NaiveDate,
) -> anyhow::Result<()> {
    match page {
        Page::Dashboard => show_dashboard(store, cfg, renderer, today),
        Page::Tasks => list_tasks(store, renderer, &TaskQuery::default(), today),
        Page::Goals => show_goals(renderer, None),
        Page::Calendar => show_calendar(store, renderer, today.year(), today.month(), today),
        Page::Settings => renderer.print_settings(&store.load_settings()),
    }
}

#[instrument(skip(store, renderer))]
fn run_task_command<S: KeyValueStore>(
    store: &mut DataStore<S>,
    renderer: &mut Renderer,
    cmd: TaskCommand,
    now: DateTime<Utc>,
    today: NaiveDate,
) -> anyhow::Result<()> {
    match cmd {
        TaskCommand::Add { title, fields } => {
            let draft = TaskDraft {
                title,
                description: fields.description,
                priority: fields.priority.unwrap_or_default(),
                due_date: fields.due,
                tags: fields.tags,
            };
            let task = add_task(store, &draft, now)?;
            renderer.print_line(&format!("Created task {}.", task.id))
        }
        TaskCommand::List {
            search,
            status,
            priority,
        } => {
            let query = TaskQuery {
                search,
                status,
                priority,
            };
            list_tasks(store, renderer, &query, today)
        }
        TaskCommand::Info { id } => {
            let tasks = store.load_tasks();
            let idx = resolve_index(&tasks, &id, |task| task.id.as_str(), "task")?;
            renderer.print_task_info(&tasks[idx])
        }
        TaskCommand::Done { id } => {
            let task = toggle_task(store, &id)?;
            let verb = if task.completed { "Completed" } else { "Reopened" };
            renderer.print_line(&format!("{verb} task '{}'.", task.title))
        }
        TaskCommand::Edit { id, title, fields } => {
            let task = edit_task(store, &id, title, fields)?;
            renderer.print_line(&format!("Updated task '{}'.", task.title))
        }
        TaskCommand::Delete { id } => {
            let task = delete_task(store, &id)?;
            renderer.print_line(&format!("Deleted task '{}'.", task.title))
        }
    }
}

pub fn add_task<S: KeyValueStore>(
    store: &mut DataStore<S>,
    draft: &TaskDraft,
    now: DateTime<Utc>,
) -> anyhow::Result<Task> {
    let task = Task::create(draft, now).context("task not created")?;
    let mut tasks = store.load_tasks();
    tasks.push(task.clone());
    store.save_tasks(&tasks)?;
    info!(id = %task.id, "added task");
    Ok(task)
}

pub fn toggle_task<S: KeyValueStore>(store: &mut DataStore<S>, id: &str) -> anyhow::Result<Task> {
    let mut tasks = store.load_tasks();
    let idx = resolve_index(&tasks, id, |task| task.id.as_str(), "task")?;
    tasks[idx].toggle_completed();
    let task = tasks[idx].clone();
    store.save_tasks(&tasks)?;
    info!(id = %task.id, completed = task.completed, "toggled task");
    Ok(task)
}

pub fn edit_task<S: KeyValueStore>(
    store: &mut DataStore<S>,
    id: &str,
    title: Option<String>,
    fields: TaskFieldArgs,
) -> anyhow::Result<Task> {
    let mut tasks = store.load_tasks();
    let idx = resolve_index(&tasks, id, |task| task.id.as_str(), "task")?;

    let mut draft = tasks[idx].to_draft();
    if let Some(title) = title {
        draft.title = title;
    }
    if let Some(description) = fields.description {
        draft.description = Some(description);
    }
    if let Some(priority) = fields.priority {
        draft.priority = priority;
    }
    if let Some(due) = fields.due {
        draft.due_date = Some(due);
    }
    if let Some(tags) = fields.tags {
        draft.tags = Some(tags);
    }

    tasks[idx]
        .apply_draft(&draft)
        .context("task not updated")?;
    let task = tasks[idx].clone();
    store.save_tasks(&tasks)?;
    info!(id = %task.id, "edited task");
    Ok(task)
}

pub fn delete_task<S: KeyValueStore>(store: &mut DataStore<S>, id: &str) -> anyhow::Result<Task> {
    let mut tasks = store.load_tasks();
    let idx = resolve_index(&tasks, id, |task| task.id.as_str(), "task")?;
    let task = tasks.remove(idx);
    store.save_tasks(&tasks)?;
    info!(id = %task.id, "deleted task");
    Ok(task)
}

fn list_tasks<S: KeyValueStore>(
    store: &DataStore<S>,
    renderer: &mut Renderer,
    query: &TaskQuery,
    today: NaiveDate,
) -> anyhow::Result<()> {
    let tasks = store.load_tasks();
    let filtered = filter_tasks(&tasks, query);
    if filtered.is_empty() {
        let hint = if query.is_unfiltered() {
            "No tasks yet. Create one with `focus task add`."
        } else {
            "No tasks found. Try adjusting your filters or search term."
        };
        return renderer.print_line(hint);
    }

    let (active, completed) = partition_by_completion(&filtered);
    if !active.is_empty() {
        renderer.print_line(&format!("Active Tasks ({})", active.len()))?;
        renderer.print_task_table(&active, today)?;
    }
    if !completed.is_empty() {
        if !active.is_empty() {
            renderer.print_line("")?;
        }
        renderer.print_line(&format!("Completed ({})", completed.len()))?;
        renderer.print_task_table(&completed, today)?;
    }
    Ok(())
}

#[instrument(skip(store, renderer))]
fn run_event_command<S: KeyValueStore>(
    store: &mut DataStore<S>,
    renderer: &mut Renderer,
    cmd: EventCommand,
    now: DateTime<Utc>,
    today: NaiveDate,
) -> anyhow::Result<()> {
    match cmd {
        EventCommand::Add {
            title,
            date,
            kind,
            description,
        } => {
            let event = add_event(store, &title, &date, kind, description, now)?;
            renderer.print_line(&format!(
                "Created {} '{}' on {}.",
                event.kind, event.title, event.date
            ))
        }
        EventCommand::List { date } => {
            let events = store.load_events();
            let events = match date {
                Some(raw) => {
                    let date = parse_iso_date(&raw)
                        .ok_or_else(|| anyhow!("invalid date {raw:?}; expected YYYY-MM-DD"))?;
                    calendar::events_for_date(&events, date)
                }
                None => events,
            };
            if events.is_empty() {
                return renderer.print_line("No events.");
            }
            renderer.print_event_table(&events, today)
        }
        EventCommand::Delete { id, yes } => {
            if !yes {
                bail!("deleting an event cannot be undone; rerun with --yes");
            }
            let event = delete_event(store, &id)?;
            renderer.print_line(&format!("Deleted event '{}'.", event.title))
        }
    }
}

pub fn add_event<S: KeyValueStore>(
    store: &mut DataStore<S>,
    title: &str,
    date: &str,
    kind: EventKind,
    description: Option<String>,
    now: DateTime<Utc>,
) -> anyhow::Result<CalendarEvent> {
    let draft = EventDraft {
        title: title.to_string(),
        date: Some(date.to_string()),
        kind,
        description,
    };
    let event = CalendarEvent::create(&draft, now).context("event not created")?;
    let mut events = store.load_events();
    events.push(event.clone());
    store.save_events(&events)?;
    info!(id = %event.id, date = %event.date, "added event");
    Ok(event)
}

pub fn delete_event<S: KeyValueStore>(
    store: &mut DataStore<S>,
    id: &str,
) -> anyhow::Result<CalendarEvent> {
    let mut events = store.load_events();
    let idx = resolve_index(&events, id, |event| event.id.as_str(), "event")?;
    let event = events.remove(idx);
    store.save_events(&events)?;
    info!(id = %event.id, "deleted event");
    Ok(event)
}

fn show_calendar<S: KeyValueStore>(
    store: &DataStore<S>,
    renderer: &mut Renderer,
    year: i32,
    month: u32,
    today: NaiveDate,
) -> anyhow::Result<()> {
    let settings = store.load_settings();
    let grid = month_grid(year, month, settings.week_start)
        .ok_or_else(|| anyhow!("invalid month {year}-{month:02}"))?;
    let events = store.load_events();
    renderer.print_month_grid(&grid, &events, today)?;

    let in_month = events
        .into_iter()
        .filter(|event| event.date.year() == year && event.date.month() == month)
        .collect::<Vec<_>>();
    if !in_month.is_empty() {
        renderer.print_line("")?;
        renderer.print_event_table(&in_month, today)?;
    }
    Ok(())
}

fn show_dashboard<S: KeyValueStore>(
    store: &DataStore<S>,
    cfg: &Config,
    renderer: &mut Renderer,
    today: NaiveDate,
) -> anyhow::Result<()> {
    let tasks = store.load_tasks();
    let events = store.load_events();
    let settings = store.load_settings();

    renderer.print_task_stats(&task_stats(&tasks))?;

    let week_start = calendar::start_of_week(today, settings.week_start);
    let week_end = week_start + Duration::days(7);
    let this_week = events
        .iter()
        .filter(|event| event.date >= week_start && event.date < week_end)
        .count();
    renderer.print_line(&format!("Events this week: {this_week}"))?;

    let due_today = filter_tasks(
        &tasks,
        &TaskQuery {
            status: StatusFilter::Active,
            priority: PriorityFilter::All,
            ..TaskQuery::default()
        },
    )
    .into_iter()
    .filter(|task| task.due_date.is_some_and(|due| due <= today))
    .collect::<Vec<_>>();
    if !due_today.is_empty() {
        renderer.print_line("")?;
        renderer.print_line(&format!("Due now ({})", due_today.len()))?;
        renderer.print_task_table(&due_today, today)?;
    }

    let upcoming = upcoming_events(&events, today, cfg.dashboard_limit);
    renderer.print_line("")?;
    if upcoming.is_empty() {
        return renderer.print_line("No upcoming events.");
    }
    renderer.print_line("Upcoming")?;
    for event in upcoming {
        renderer.print_line(&format!(
            "  {:<10} {:<9} {}",
            relative_date_label(event.date, today),
            event.kind,
            event.title
        ))?;
    }
    Ok(())
}

fn show_goals(renderer: &mut Renderer, file: Option<&Path>) -> anyhow::Result<()> {
    let Some(path) = file else {
        return renderer.print_line("No goals loaded; pass --file with a JSON list of goals.");
    };
    let goals = read_goals(path)?;

    renderer.print_line(&format!(
        "Goals: {}  overall {}%  near completion {}",
        goals.len(),
        goal::overall_progress(&goals),
        goal::count_near_completion(&goals)
    ))?;

    for (label, kind) in [("Short-term", GoalKind::ShortTerm), ("Long-term", GoalKind::LongTerm)] {
        let subset = goal::goals_of_kind(&goals, kind);
        if subset.is_empty() {
            continue;
        }
        renderer.print_line("")?;
        renderer.print_line(&format!(
            "{label} Goals ({})  {}%",
            subset.len(),
            goal::overall_progress(&subset)
        ))?;
        renderer.print_goal_table(&subset)?;
    }
    Ok(())
}

fn read_goals(path: &Path) -> anyhow::Result<Vec<Goal>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading {}", path.display()))?;
    let goals: Vec<Goal> = serde_json::from_str(&raw)
        .with_context(|| format!("failed parsing goals in {}", path.display()))?;
    for goal in &goals {
        Goal::new(goal.id.as_str(), goal.title.as_str(), goal.kind, u32::from(goal.progress))
            .with_context(|| format!("invalid goal {}", goal.id))?;
    }
    Ok(goals)
}

fn read_snapshot(path: &Path) -> anyhow::Result<Snapshot> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed parsing {}", path.display()))
}

/// Index of the item whose id equals `needle`, or failing that, the only
/// item whose id starts with it.
pub fn resolve_index<T>(
    items: &[T],
    needle: &str,
    id_of: impl Fn(&T) -> &str,
    what: &str,
) -> anyhow::Result<usize> {
    let needle = needle.trim();
    if needle.is_empty() {
        bail!("{what} id cannot be empty");
    }
    if let Some(idx) = items.iter().position(|item| id_of(item) == needle) {
        return Ok(idx);
    }

    let mut matches = items
        .iter()
        .enumerate()
        .filter(|(_, item)| id_of(item).starts_with(needle))
        .map(|(idx, _)| idx);
    let first = matches
        .next()
        .ok_or_else(|| anyhow!("{what} not found: {needle}"))?;
    if matches.next().is_some() {
        bail!("{what} id prefix {needle} is ambiguous");
    }
    Ok(first)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::settings::WeekStart;
    use crate::task::Priority;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 28, 9, 0, 0)
            .single()
            .expect("valid now")
    }

    #[test]
    fn resolves_exact_ids_before_prefixes() {
        fn id_of(s: &String) -> &str {
            s
        }
        let ids = vec!["ab".to_string(), "abc".to_string(), "b12".to_string()];
        assert_eq!(resolve_index(&ids, "ab", id_of, "task").expect("exact"), 0);
        assert_eq!(resolve_index(&ids, "b", id_of, "task").expect("prefix"), 2);
        assert!(resolve_index(&ids, "a", id_of, "task").is_err());
        assert!(resolve_index(&ids, "zz", id_of, "task").is_err());
        assert!(resolve_index(&ids, " ", id_of, "task").is_err());
    }

    #[test]
    fn task_lifecycle_through_store() {
        let mut store = DataStore::in_memory();
        let mut draft = TaskDraft::titled("Review chapter 5");
        draft.priority = Priority::High;
        let created = add_task(&mut store, &draft, now()).expect("add");

        let toggled = toggle_task(&mut store, &created.id[..8]).expect("toggle");
        assert!(toggled.completed);

        let edited = edit_task(
            &mut store,
            &created.id,
            Some("Review chapter 6".to_string()),
            TaskFieldArgs {
                due: Some("2025-06-01".to_string()),
                ..TaskFieldArgs::default()
            },
        )
        .expect("edit");
        assert_eq!(edited.id, created.id);
        assert_eq!(edited.created_at, created.created_at);
        assert!(edited.completed);
        assert_eq!(edited.priority, Priority::High);
        assert_eq!(edited.due_date, NaiveDate::from_ymd_opt(2025, 6, 1));

        let cleared = edit_task(
            &mut store,
            &created.id,
            None,
            TaskFieldArgs {
                due: Some(String::new()),
                ..TaskFieldArgs::default()
            },
        )
        .expect("clear due");
        assert_eq!(cleared.due_date, None);

        assert_eq!(store.load_tasks(), vec![cleared]);
        delete_task(&mut store, &created.id).expect("delete");
        assert!(store.load_tasks().is_empty());
    }

    #[test]
    fn invalid_input_never_reaches_the_store() {
        let mut store = DataStore::in_memory();
        assert!(add_task(&mut store, &TaskDraft::titled("  "), now()).is_err());
        assert!(add_event(&mut store, "Exam", "June 2", EventKind::Exam, None, now()).is_err());
        assert!(!store.medium().contains("focus_tasks"));
        assert!(!store.medium().contains("focus_events"));

        let task = add_task(&mut store, &TaskDraft::titled("keep"), now()).expect("add");
        assert!(edit_task(&mut store, &task.id, Some(" ".to_string()), TaskFieldArgs::default()).is_err());
        assert_eq!(store.load_tasks(), vec![task]);
    }

    #[test]
    fn events_add_and_delete() {
        let mut store = DataStore::in_memory();
        let event = add_event(
            &mut store,
            "Economics Final Exam",
            "2025-06-02",
            EventKind::Exam,
            Some("  ".to_string()),
            now(),
        )
        .expect("add");
        assert_eq!(event.description, None);
        assert_eq!(store.load_events().len(), 1);

        delete_event(&mut store, &event.id).expect("delete");
        assert!(store.load_events().is_empty());
        assert!(delete_event(&mut store, &event.id).is_err());
    }

    #[test]
    fn settings_updates_persist() {
        let mut store = DataStore::in_memory();
        let mut renderer = Renderer::plain();
        dispatch(
            &mut store,
            &Config::default(),
            &mut renderer,
            Some(Command::Settings(SettingsCommand::Set(SettingField::WeekStart {
                start: WeekStart::Sunday,
            }))),
            now(),
        )
        .expect("dispatch");
        assert_eq!(store.load_settings().week_start, WeekStart::Sunday);
    }

    #[test]
    fn destructive_commands_require_confirmation() {
        let mut store = DataStore::in_memory();
        let mut renderer = Renderer::plain();
        let task = add_task(&mut store, &TaskDraft::titled("stay"), now()).expect("add");
        let event =
            add_event(&mut store, "stay", "2025-06-02", EventKind::Task, None, now()).expect("add");

        let refused = dispatch(
            &mut store,
            &Config::default(),
            &mut renderer,
            Some(Command::Reset { yes: false }),
            now(),
        );
        assert!(refused.is_err());
        let refused = dispatch(
            &mut store,
            &Config::default(),
            &mut renderer,
            Some(Command::Event(EventCommand::Delete {
                id: event.id.clone(),
                yes: false,
            })),
            now(),
        );
        assert!(refused.is_err());
        assert_eq!(store.load_tasks(), vec![task]);
        assert_eq!(store.load_events(), vec![event]);

        dispatch(
            &mut store,
            &Config::default(),
            &mut renderer,
            Some(Command::Reset { yes: true }),
            now(),
        )
        .expect("reset");
        assert!(store.load_tasks().is_empty());
        assert!(store.load_events().is_empty());
    }

    #[test]
    fn calendar_rejects_months_outside_the_date_range() {
        let mut store = DataStore::in_memory();
        let mut renderer = Renderer::plain();
        for (month, shift) in [(5, i32::MAX), (5, i32::MIN), (5, 12 * 300_000), (13, 0)] {
            let result = dispatch(
                &mut store,
                &Config::default(),
                &mut renderer,
                Some(Command::Calendar {
                    year: Some(2025),
                    month: Some(month),
                    shift,
                }),
                now(),
            );
            assert!(result.is_err(), "month {month} shift {shift} accepted");
        }
    }
}
