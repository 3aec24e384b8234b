use tracing::trace;

use crate::task::{
  Priority,
  Task
};

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  clap::ValueEnum,
)]
pub enum StatusFilter {
  #[default]
  All,
  Active,
  Completed
}

impl StatusFilter {
  fn accepts(
    self,
    task: &Task
  ) -> bool {
    match self {
      | StatusFilter::All => true,
      | StatusFilter::Active => {
        !task.completed
      }
      | StatusFilter::Completed => {
        task.completed
      }
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  clap::ValueEnum,
)]
pub enum PriorityFilter {
  #[default]
  All,
  Low,
  Medium,
  High
}

impl PriorityFilter {
  fn accepts(
    self,
    task: &Task
  ) -> bool {
    match self {
      | PriorityFilter::All => true,
      | PriorityFilter::Low => {
        task.priority == Priority::Low
      }
      | PriorityFilter::Medium => {
        task.priority
          == Priority::Medium
      }
      | PriorityFilter::High => {
        task.priority == Priority::High
      }
    }
  }
}

/// Search text plus the two selector
/// filters of the task list. The
/// default query matches every task.
#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub struct TaskQuery {
  pub search:   String,
  pub status:   StatusFilter,
  pub priority: PriorityFilter
}

impl TaskQuery {
  pub fn is_unfiltered(&self) -> bool {
    self.search.is_empty()
      && self.status == StatusFilter::All
      && self.priority
        == PriorityFilter::All
  }

  fn matches_lowered(
    &self,
    task: &Task,
    needle: &str
  ) -> bool {
    task.matches_search(needle)
      && self.status.accepts(task)
      && self.priority.accepts(task)
  }
}

/// Tasks satisfying `query`, in their
/// original order.
#[tracing::instrument(skip(
  tasks, query
))]
pub fn filter_tasks(
  tasks: &[Task],
  query: &TaskQuery
) -> Vec<Task> {
  let needle =
    query.search.to_lowercase();
  let out = tasks
    .iter()
    .filter(|task| {
      query.matches_lowered(task, &needle)
    })
    .cloned()
    .collect::<Vec<_>>();

  trace!(
    total = tasks.len(),
    matched = out.len(),
    "filtered tasks"
  );
  out
}

/// Splits into `(active, completed)`,
/// each keeping the input order.
pub fn partition_by_completion(
  tasks: &[Task]
) -> (Vec<Task>, Vec<Task>) {
  let (completed, active): (
    Vec<Task>,
    Vec<Task>
  ) = tasks
    .iter()
    .cloned()
    .partition(|task| task.completed);
  (active, completed)
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub struct TaskStats {
  pub total:     usize,
  pub completed: usize,
  pub active:    usize
}

pub fn task_stats(
  tasks: &[Task]
) -> TaskStats {
  let completed = tasks
    .iter()
    .filter(|task| task.completed)
    .count();
  TaskStats {
    total: tasks.len(),
    completed,
    active: tasks.len() - completed
  }
}
