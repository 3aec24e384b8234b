use chrono::{
  Datelike,
  Duration,
  NaiveDate,
  Weekday
};

use crate::event::CalendarEvent;
use crate::settings::WeekStart;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum CalendarCell {
  Empty,
  Day(NaiveDate)
}

impl CalendarCell {
  pub fn date(self) -> Option<NaiveDate> {
    match self {
      | CalendarCell::Empty => None,
      | CalendarCell::Day(date) => {
        Some(date)
      }
    }
  }
}

/// Flat month layout: leading blanks up
/// to the weekday of the 1st, then
/// every day of the month in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthGrid {
  pub year:       i32,
  pub month:      u32,
  pub week_start: WeekStart,
  pub cells:      Vec<CalendarCell>
}

impl MonthGrid {
  pub fn leading_blanks(&self) -> usize {
    self
      .cells
      .iter()
      .take_while(|cell| {
        matches!(
          cell,
          CalendarCell::Empty
        )
      })
      .count()
  }

  /// Rows of seven; the last row may be
  /// short.
  pub fn weeks(
    &self
  ) -> impl Iterator<Item = &[CalendarCell]>
  {
    self.cells.chunks(7)
  }
}

/// `None` when `month` is outside
/// 1..=12 or the year is out of range.
#[tracing::instrument]
pub fn month_grid(
  year: i32,
  month: u32,
  week_start: WeekStart
) -> Option<MonthGrid> {
  let first =
    NaiveDate::from_ymd_opt(
      year, month, 1
    )?;
  let offset = week_start
    .column_of(first.weekday())
    as usize;
  let day_count =
    days_in_month(year, month);

  let mut cells = Vec::with_capacity(
    offset + day_count as usize
  );
  cells.extend(
    std::iter::repeat_n(
      CalendarCell::Empty,
      offset
    )
  );
  cells.extend(
    first
      .iter_days()
      .take(day_count as usize)
      .map(CalendarCell::Day)
  );

  tracing::trace!(
    offset,
    day_count,
    "built month grid"
  );

  Some(MonthGrid {
    year,
    month,
    week_start,
    cells
  })
}

/// Column headers in grid order.
pub fn weekday_labels(
  week_start: WeekStart
) -> [&'static str; 7] {
  match week_start {
    | WeekStart::Sunday => [
      "Sun", "Mon", "Tue", "Wed",
      "Thu", "Fri", "Sat"
    ],
    | WeekStart::Monday => [
      "Mon", "Tue", "Wed", "Thu",
      "Fri", "Sat", "Sun"
    ]
  }
}

pub fn events_for_date(
  events: &[CalendarEvent],
  date: NaiveDate
) -> Vec<CalendarEvent> {
  events
    .iter()
    .filter(|event| event.date == date)
    .cloned()
    .collect()
}

/// Events on or after `today`, earliest
/// first, at most `limit` of them. Same
/// day events keep their stored order.
#[tracing::instrument(skip(events))]
pub fn upcoming_events(
  events: &[CalendarEvent],
  today: NaiveDate,
  limit: usize
) -> Vec<CalendarEvent> {
  let mut upcoming = events
    .iter()
    .filter(|event| event.date >= today)
    .cloned()
    .collect::<Vec<_>>();
  upcoming
    .sort_by_key(|event| event.date);
  upcoming.truncate(limit);
  upcoming
}

/// `date` moved by `months`, with the
/// day clamped to the target month.
/// `None` once the result leaves the
/// representable date range.
pub fn shift_months(
  date: NaiveDate,
  months: i32
) -> Option<NaiveDate> {
  let index = i64::from(date.year()) * 12
    + i64::from(date.month0())
    + i64::from(months);
  let year =
    i32::try_from(index.div_euclid(12))
      .ok()?;
  let month =
    u32::try_from(index.rem_euclid(12))
      .ok()?
      + 1;
  let day = date
    .day()
    .min(days_in_month(year, month));
  NaiveDate::from_ymd_opt(
    year, month, day
  )
}

/// 0 for a month chrono cannot
/// represent.
pub fn days_in_month(
  year: i32,
  month: u32
) -> u32 {
  (28..=31)
    .rev()
    .find(|day| {
      NaiveDate::from_ymd_opt(
        year, month, *day
      )
      .is_some()
    })
    .unwrap_or(0)
}

fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  date
    .checked_add_signed(Duration::days(
      days
    ))
    .unwrap_or(date)
}

pub fn start_of_week(
  day: NaiveDate,
  week_start: WeekStart
) -> NaiveDate {
  let day_idx = week_start
    .column_of(day.weekday())
    as i64;
  add_days(day, -day_idx)
}

pub fn is_weekend(day: NaiveDate) -> bool {
  matches!(
    day.weekday(),
    Weekday::Sat | Weekday::Sun
  )
}
