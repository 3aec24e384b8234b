use std::fmt;

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

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
pub enum Page {
    #[default]
    Dashboard,
    Tasks,
    Goals,
    Calendar,
    Settings,
}

impl Page {
    pub fn as_str(self) -> &'static str {
        match self {
            Page::Dashboard => "dashboard",
            Page::Tasks => "tasks",
            Page::Goals => "goals",
            Page::Calendar => "calendar",
            Page::Settings => "settings",
        }
    }

    pub fn from_key(raw: &str) -> Option<Self> {
        match raw {
            "dashboard" => Some(Page::Dashboard),
            "tasks" => Some(Page::Tasks),
            "goals" => Some(Page::Goals),
            "calendar" => Some(Page::Calendar),
            "settings" => Some(Page::Settings),
            _ => None,
        }
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
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
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    Sunday,
    #[default]
    Monday,
}

impl WeekStart {
    pub fn as_str(self) -> &'static str {
        match self {
            WeekStart::Sunday => "sunday",
            WeekStart::Monday => "monday",
        }
    }

    pub fn from_key(raw: &str) -> Option<Self> {
        match raw {
            "sunday" => Some(WeekStart::Sunday),
            "monday" => Some(WeekStart::Monday),
            _ => None,
        }
    }

    /// Column of `day` in a grid that starts on this weekday.
    pub fn column_of(self, day: Weekday) -> u32 {
        match self {
            WeekStart::Sunday => day.num_days_from_sunday(),
            WeekStart::Monday => day.num_days_from_monday(),
        }
    }
}

impl fmt::Display for WeekStart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-wide preferences. Reads go through [`AppSettings::from_stored`],
/// the single place where missing or renamed fields get their defaults.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", from = "Value")]
pub struct AppSettings {
    pub dark_mode: bool,
    pub default_view: Page,
    pub week_start: WeekStart,
}

/// One typed change to a single settings field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingUpdate {
    DarkMode(bool),
    DefaultView(Page),
    WeekStart(WeekStart),
}

impl AppSettings {
    pub fn from_stored(value: &Value) -> Self {
        let defaults = Self::default();
        let Some(object) = value.as_object() else {
            debug!("stored settings were not an object; using defaults");
            return defaults;
        };

        let dark_mode = object
            .get("darkMode")
            .and_then(Value::as_bool)
            .unwrap_or(defaults.dark_mode);
        let default_view = object
            .get("defaultView")
            .and_then(Value::as_str)
            .and_then(Page::from_key)
            .unwrap_or(defaults.default_view);
        let week_start = object
            .get("weekStart")
            .and_then(Value::as_str)
            .and_then(WeekStart::from_key)
            .unwrap_or(defaults.week_start);

        Self {
            dark_mode,
            default_view,
            week_start,
        }
    }

    #[must_use]
    pub fn apply(mut self, update: SettingUpdate) -> Self {
        match update {
            SettingUpdate::DarkMode(enabled) => self.dark_mode = enabled,
            SettingUpdate::DefaultView(page) => self.default_view = page,
            SettingUpdate::WeekStart(start) => self.week_start = start,
        }
        self
    }
}

impl From<Value> for AppSettings {
    fn from(value: Value) -> Self {
        Self::from_stored(&value)
    }
}
