use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::datetime::{iso_date_serde, parse_iso_date};

/// Rejections raised when user input is turned into an entity. Nothing that
/// fails here is ever handed to the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("title cannot be empty")]
    EmptyTitle,
    #[error("{0} date is required")]
    MissingDate(&'static str),
    #[error("invalid {field} date {value:?}; expected YYYY-MM-DD")]
    InvalidDate { field: &'static str, value: String },
    #[error("goal progress {0} is outside 0..=100")]
    ProgressOutOfRange(u32),
    #[error("duplicate id in {collection}: {id}")]
    DuplicateId {
        collection: &'static str,
        id: String,
    },
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,

    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub completed: bool,

    #[serde(default)]
    pub priority: Priority,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "iso_date_serde::option"
    )]
    pub due_date: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    pub created_at: DateTime<Utc>,
}

/// Raw form input for creating or editing a task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub due_date: Option<String>,
    /// Comma separated, as typed.
    pub tags: Option<String>,
}

#[derive(Debug)]
struct TaskFields {
    title: String,
    description: Option<String>,
    priority: Priority,
    due_date: Option<NaiveDate>,
    tags: Option<Vec<String>>,
}

impl TaskDraft {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<TaskFields, ValidationError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }

        let due_date = match self.due_date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(parse_iso_date(raw).ok_or_else(|| {
                ValidationError::InvalidDate {
                    field: "due",
                    value: raw.to_string(),
                }
            })?),
        };

        Ok(TaskFields {
            title: title.to_string(),
            description: normalize_optional_text(self.description.as_deref()),
            priority: self.priority,
            due_date,
            tags: self.tags.as_deref().and_then(split_tags),
        })
    }
}

impl Task {
    pub fn create(draft: &TaskDraft, now: DateTime<Utc>) -> Result<Self, ValidationError> {
        let fields = draft.validate()?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            title: fields.title,
            description: fields.description,
            completed: false,
            priority: fields.priority,
            due_date: fields.due_date,
            tags: fields.tags,
            created_at: now,
        })
    }

    /// Replaces the editable fields. `id`, `created_at` and `completed`
    /// are left untouched.
    pub fn apply_draft(&mut self, draft: &TaskDraft) -> Result<(), ValidationError> {
        let fields = draft.validate()?;
        self.title = fields.title;
        self.description = fields.description;
        self.priority = fields.priority;
        self.due_date = fields.due_date;
        self.tags = fields.tags;
        Ok(())
    }

    /// Draft prefilled from the current values, for partial edits.
    pub fn to_draft(&self) -> TaskDraft {
        TaskDraft {
            title: self.title.clone(),
            description: self.description.clone(),
            priority: self.priority,
            due_date: self.due_date.map(crate::datetime::format_iso_date),
            tags: self.tags.as_ref().map(|tags| tags.join(", ")),
        }
    }

    pub fn toggle_completed(&mut self) {
        self.completed = !self.completed;
    }

    pub fn matches_search(&self, needle_lower: &str) -> bool {
        self.title.to_lowercase().contains(needle_lower)
            || self
                .description
                .as_deref()
                .is_some_and(|desc| desc.to_lowercase().contains(needle_lower))
    }
}

pub(crate) fn normalize_optional_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn split_tags(raw: &str) -> Option<Vec<String>> {
    let tags: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect();
    if tags.is_empty() { None } else { Some(tags) }
}
