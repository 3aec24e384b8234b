use std::fs;

use chrono::{NaiveDate, TimeZone, Utc};
use focus_core::calendar::{month_grid, upcoming_events};
use focus_core::datastore::{DataStore, FileStore, StorageKey};
use focus_core::datetime::relative_date_label;
use focus_core::event::{CalendarEvent, EventDraft, EventKind};
use focus_core::filter::{PriorityFilter, StatusFilter, TaskQuery, filter_tasks};
use focus_core::goal::{Goal, GoalKind, overall_progress};
use focus_core::settings::{AppSettings, Page, SettingUpdate, WeekStart};
use focus_core::task::{Priority, Task, TaskDraft};
use tempfile::tempdir;

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 28, 10, 30, 0)
        .single()
        .expect("valid now")
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn task(title: &str, priority: Priority, due: Option<&str>) -> Task {
    let mut draft = TaskDraft::titled(title);
    draft.priority = priority;
    draft.due_date = due.map(str::to_string);
    Task::create(&draft, now()).expect("valid task")
}

fn event(title: &str, day: &str, kind: EventKind) -> CalendarEvent {
    CalendarEvent::create(
        &EventDraft {
            title: title.to_string(),
            date: Some(day.to_string()),
            kind,
            description: None,
        },
        now(),
    )
    .expect("valid event")
}

#[test]
fn file_store_roundtrip_survives_reopen() {
    let temp = tempdir().expect("tempdir");

    let tasks = vec![
        task("Review chapter 5", Priority::High, Some("2025-05-30")),
        task("Buy groceries", Priority::Low, None),
    ];
    let events = vec![event("Economics Final Exam", "2025-06-02", EventKind::Exam)];
    let settings = AppSettings::default().apply(SettingUpdate::WeekStart(WeekStart::Sunday));

    {
        let mut store = DataStore::open(temp.path()).expect("open datastore");
        store.save_tasks(&tasks).expect("save tasks");
        store.save_events(&events).expect("save events");
        store.save_settings(&settings).expect("save settings");
    }

    let store = DataStore::open(temp.path()).expect("reopen datastore");
    assert_eq!(store.load_tasks(), tasks);
    assert_eq!(store.load_events(), events);
    assert_eq!(store.load_settings(), settings);

    for key in StorageKey::ALL {
        assert!(temp.path().join(format!("{key}.json")).exists(), "{key} missing");
    }
}

#[test]
fn stored_records_use_camel_case_and_iso_dates() {
    let temp = tempdir().expect("tempdir");
    let mut store = DataStore::open(temp.path()).expect("open datastore");
    store
        .save_tasks(&[task("Essay", Priority::Medium, Some("2025-06-01"))])
        .expect("save tasks");
    store
        .save_events(&[event("Standup", "2025-06-03", EventKind::Reminder)])
        .expect("save events");

    let raw_tasks = fs::read_to_string(temp.path().join("focus_tasks.json")).expect("read tasks");
    let value: serde_json::Value = serde_json::from_str(&raw_tasks).expect("json");
    assert_eq!(value[0]["dueDate"], "2025-06-01");
    assert_eq!(value[0]["priority"], "medium");
    assert!(value[0]["createdAt"].is_string());

    let raw_events =
        fs::read_to_string(temp.path().join("focus_events.json")).expect("read events");
    let value: serde_json::Value = serde_json::from_str(&raw_events).expect("json");
    assert_eq!(value[0]["type"], "reminder");
    assert_eq!(value[0]["date"], "2025-06-03");
}

#[test]
fn corrupt_or_missing_records_fall_back_to_defaults() {
    let temp = tempdir().expect("tempdir");
    fs::write(temp.path().join("focus_tasks.json"), "{ not json").expect("write corrupt");
    fs::write(temp.path().join("focus_events.json"), "{\"a\": 1}").expect("write wrong shape");

    let store = DataStore::open(temp.path()).expect("open datastore");
    assert!(store.load_tasks().is_empty());
    assert!(store.load_events().is_empty());
    assert_eq!(store.load_settings(), AppSettings::default());
}

#[test]
fn partial_settings_are_merged_with_defaults() {
    let temp = tempdir().expect("tempdir");
    fs::write(
        temp.path().join("focus_settings.json"),
        r#"{"darkMode": true, "defaultView": "calendar"}"#,
    )
    .expect("write settings");

    let store = DataStore::open(temp.path()).expect("open datastore");
    let settings = store.load_settings();
    assert!(settings.dark_mode);
    assert_eq!(settings.default_view, Page::Calendar);
    assert_eq!(settings.week_start, WeekStart::Monday);
}

#[test]
fn reset_is_idempotent_and_leaves_other_files() {
    let temp = tempdir().expect("tempdir");
    let unrelated = temp.path().join("notes.txt");
    fs::write(&unrelated, "keep me").expect("write unrelated");

    let mut store = DataStore::open(temp.path()).expect("open datastore");
    store
        .save_tasks(&[task("Plan", Priority::Low, None)])
        .expect("save tasks");
    store
        .save_settings(&AppSettings::default().apply(SettingUpdate::DarkMode(true)))
        .expect("save settings");

    store.reset().expect("reset");
    store.reset().expect("second reset");

    assert!(store.load_tasks().is_empty());
    assert_eq!(store.load_settings(), AppSettings::default());
    assert!(!temp.path().join("focus_tasks.json").exists());
    assert!(unrelated.exists());
}

#[test]
fn export_then_import_into_fresh_directory() {
    let source = tempdir().expect("tempdir");
    let mut store = DataStore::open(source.path()).expect("open datastore");
    store
        .save_tasks(&[task("Review", Priority::High, Some("2025-05-29"))])
        .expect("save tasks");
    store
        .save_events(&[event("Team Meeting", "2025-05-29", EventKind::Task)])
        .expect("save events");
    let snapshot = store.export_snapshot();
    let document = serde_json::to_string_pretty(&snapshot).expect("serialize snapshot");

    let target = tempdir().expect("tempdir");
    let mut fresh = DataStore::<FileStore>::open(target.path()).expect("open target");
    let parsed = serde_json::from_str(&document).expect("parse snapshot");
    fresh.import_snapshot(&parsed).expect("import");
    assert_eq!(fresh.export_snapshot(), snapshot);
}

#[test]
fn import_rejects_duplicate_ids_without_writing() {
    let temp = tempdir().expect("tempdir");
    let mut store = DataStore::open(temp.path()).expect("open datastore");
    let kept = vec![task("Existing", Priority::Low, None)];
    store.save_tasks(&kept).expect("save tasks");

    let mut snapshot = store.export_snapshot();
    let dup = task("Dup", Priority::Low, None);
    snapshot.tasks = vec![dup.clone(), dup];
    assert!(store.import_snapshot(&snapshot).is_err());
    assert_eq!(store.load_tasks(), kept);
}

#[test]
fn derived_views_over_stored_data() {
    let temp = tempdir().expect("tempdir");
    let mut store = DataStore::open(temp.path()).expect("open datastore");
    let mut done = task("Submit economics essay", Priority::High, Some("2025-05-27"));
    done.toggle_completed();
    store
        .save_tasks(&[
            task("Review chapter 5", Priority::High, Some("2025-05-30")),
            done,
            task("Read economics notes", Priority::Medium, None),
        ])
        .expect("save tasks");
    store
        .save_events(&[
            event("Project Deadline", "2025-06-05", EventKind::Deadline),
            event("Past quiz", "2025-05-20", EventKind::Exam),
            event("Team Meeting", "2025-05-29", EventKind::Task),
            event("Economics Final Exam", "2025-06-02", EventKind::Exam),
        ])
        .expect("save events");

    let tasks = store.load_tasks();
    let query = TaskQuery {
        search: "ECONOMICS".to_string(),
        status: StatusFilter::Active,
        priority: PriorityFilter::All,
    };
    let found = filter_tasks(&tasks, &query);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].title, "Read economics notes");

    let today = date(2025, 5, 28);
    let upcoming = upcoming_events(&store.load_events(), today, 3);
    let labels = upcoming
        .iter()
        .map(|event| relative_date_label(event.date, today))
        .collect::<Vec<_>>();
    assert_eq!(labels, vec!["Tomorrow", "In 5 days", "Jun 5"]);

    let grid = month_grid(2025, 5, store.load_settings().week_start).expect("grid");
    // 2025-05-01 is a Thursday; weeks start on Monday by default.
    assert_eq!(grid.leading_blanks(), 3);
    assert_eq!(grid.cells.len(), 34);
}

#[test]
fn goal_aggregate_rounds_mean_progress() {
    let goals = vec![
        Goal::new("1", "Finish thesis", GoalKind::LongTerm, 45).expect("goal"),
        Goal::new("2", "Run 5k", GoalKind::ShortTerm, 80).expect("goal"),
        Goal::new("3", "Learn Spanish", GoalKind::LongTerm, 20).expect("goal"),
    ];
    assert_eq!(overall_progress(&goals), 48);
    assert_eq!(overall_progress(&[]), 0);
    assert!(Goal::new("4", "Too far", GoalKind::ShortTerm, 101).is_err());
}
