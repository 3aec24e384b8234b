use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datetime::{iso_date_serde, parse_iso_date};
use crate::task::{ValidationError, normalize_optional_text};

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Exam,
    Deadline,
    #[default]
    Task,
    Reminder,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Exam => "exam",
            EventKind::Deadline => "deadline",
            EventKind::Task => "task",
            EventKind::Reminder => "reminder",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,

    pub title: String,

    #[serde(with = "iso_date_serde")]
    pub date: NaiveDate,

    #[serde(rename = "type")]
    pub kind: EventKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventDraft {
    pub title: String,
    pub date: Option<String>,
    pub kind: EventKind,
    pub description: Option<String>,
}

impl CalendarEvent {
    /// Events have no edit path; they are created once and later deleted.
    pub fn create(draft: &EventDraft, now: DateTime<Utc>) -> Result<Self, ValidationError> {
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }

        let raw_date = draft
            .date
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .ok_or(ValidationError::MissingDate("event"))?;
        let date = parse_iso_date(raw_date).ok_or_else(|| ValidationError::InvalidDate {
            field: "event",
            value: raw_date.to_string(),
        })?;

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            date,
            kind: draft.kind,
            description: normalize_optional_text(draft.description.as_deref()),
            created_at: now,
        })
    }
}
