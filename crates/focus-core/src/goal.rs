use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::datetime::iso_date_serde;
use crate::task::ValidationError;

pub const NEAR_COMPLETION_PROGRESS: u8 = 80;
const MEDIUM_PROGRESS: u8 = 50;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum GoalKind {
    ShortTerm,
    LongTerm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressTier {
    Low,
    Medium,
    High,
}

/// Goals live only in memory; they exist for the aggregate views below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub progress: u8,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "iso_date_serde::option"
    )]
    pub target_date: Option<NaiveDate>,
    #[serde(rename = "type")]
    pub kind: GoalKind,
    #[serde(default)]
    pub milestones: Vec<String>,
}

impl Goal {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        kind: GoalKind,
        progress: u32,
    ) -> Result<Self, ValidationError> {
        let title: String = title.into();
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        let progress = u8::try_from(progress)
            .ok()
            .filter(|value| *value <= 100)
            .ok_or(ValidationError::ProgressOutOfRange(progress))?;

        Ok(Self {
            id: id.into(),
            title,
            description: None,
            progress,
            target_date: None,
            kind,
            milestones: vec![],
        })
    }

    pub fn tier(&self) -> ProgressTier {
        if self.progress >= NEAR_COMPLETION_PROGRESS {
            ProgressTier::High
        } else if self.progress >= MEDIUM_PROGRESS {
            ProgressTier::Medium
        } else {
            ProgressTier::Low
        }
    }
}

/// Mean progress rounded to the nearest integer, halves rounding up.
/// An empty list reports 0.
pub fn overall_progress(goals: &[Goal]) -> u8 {
    if goals.is_empty() {
        return 0;
    }
    let count = goals.len() as u64;
    let total: u64 = goals.iter().map(|goal| u64::from(goal.progress)).sum();
    let rounded = (total * 2 + count) / (count * 2);
    u8::try_from(rounded).unwrap_or(100)
}

pub fn goals_of_kind(goals: &[Goal], kind: GoalKind) -> Vec<Goal> {
    goals.iter().filter(|goal| goal.kind == kind).cloned().collect()
}

pub fn count_near_completion(goals: &[Goal]) -> usize {
    goals
        .iter()
        .filter(|goal| goal.progress >= NEAR_COMPLETION_PROGRESS)
        .count()
}
