use std::fmt;
use std::sync::OnceLock;

use chrono::{
  DateTime,
  Datelike,
  Local,
  NaiveDate,
  Utc
};
use chrono_tz::Tz;
use regex::Regex;

pub const ISO_DATE_FORMAT: &str =
  "%Y-%m-%d";

/// Zone in which "today" is measured.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq,
)]
pub enum DateZone {
  /// Whatever the machine is set to.
  #[default]
  Local,
  Named(Tz)
}

impl DateZone {
  /// `local` or an IANA id such as
  /// `Europe/Paris`.
  pub fn parse(
    raw: &str
  ) -> Option<Self> {
    let trimmed = raw.trim();
    if trimmed
      .eq_ignore_ascii_case("local")
    {
      return Some(DateZone::Local);
    }
    trimmed
      .parse::<Tz>()
      .ok()
      .map(DateZone::Named)
  }

  /// Calendar date of `dt` in this
  /// zone.
  #[must_use]
  pub fn date_of(
    self,
    dt: DateTime<Utc>
  ) -> NaiveDate {
    match self {
      | DateZone::Local => dt
        .with_timezone(&Local)
        .date_naive(),
      | DateZone::Named(tz) => dt
        .with_timezone(&tz)
        .date_naive()
    }
  }
}

impl fmt::Display for DateZone {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    match self {
      | DateZone::Local => {
        f.write_str("local")
      }
      | DateZone::Named(tz) => {
        f.write_str(tz.name())
      }
    }
  }
}

fn iso_date_shape() -> Option<&'static Regex>
{
  static SHAPE: OnceLock<Option<Regex>> =
    OnceLock::new();
  SHAPE
    .get_or_init(|| {
      Regex::new(r"^\d{4}-\d{2}-\d{2}$")
        .ok()
    })
    .as_ref()
}

/// Strict `YYYY-MM-DD` parser. Unpadded
/// or otherwise loose input is rejected.
pub fn parse_iso_date(
  raw: &str
) -> Option<NaiveDate> {
  let token = raw.trim();
  if !iso_date_shape()?.is_match(token) {
    return None;
  }
  NaiveDate::parse_from_str(
    token,
    ISO_DATE_FORMAT
  )
  .ok()
}

#[must_use]
pub fn format_iso_date(
  date: NaiveDate
) -> String {
  date.format(ISO_DATE_FORMAT).to_string()
}

/// `"Jun 5"` style label.
#[must_use]
pub fn format_short_date(
  date: NaiveDate
) -> String {
  format!(
    "{} {}",
    month_abbrev(date.month()),
    date.day()
  )
}

/// `"Jul 15, 2025"` style label.
#[must_use]
pub fn format_long_date(
  date: NaiveDate
) -> String {
  format!(
    "{}, {}",
    format_short_date(date),
    date.year()
  )
}

/// Human label for `target` relative to
/// `today`. Both sides are calendar
/// dates, so the time of day of "now"
/// never shifts the result.
#[must_use]
pub fn relative_date_label(
  target: NaiveDate,
  today: NaiveDate
) -> String {
  let diff_days = target
    .signed_duration_since(today)
    .num_days();

  match diff_days {
    | 0 => "Today".to_string(),
    | 1 => "Tomorrow".to_string(),
    | 2..=6 => {
      format!("In {diff_days} days")
    }
    | _ => format_short_date(target)
  }
}

pub fn month_name(
  month: u32
) -> &'static str {
  match month {
    | 1 => "January",
    | 2 => "February",
    | 3 => "March",
    | 4 => "April",
    | 5 => "May",
    | 6 => "June",
    | 7 => "July",
    | 8 => "August",
    | 9 => "September",
    | 10 => "October",
    | 11 => "November",
    | 12 => "December",
    | _ => "?"
  }
}

fn month_abbrev(
  month: u32
) -> &'static str {
  let name = month_name(month);
  name.get(..3).unwrap_or(name)
}

/// Serde adapter storing dates as plain
/// `YYYY-MM-DD` strings.
pub mod iso_date_serde {
  use chrono::NaiveDate;
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  pub fn serialize<S>(
    date: &NaiveDate,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.serialize_str(
      &super::format_iso_date(*date)
    )
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<NaiveDate, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = String::deserialize(
      deserializer
    )?;
    super::parse_iso_date(&raw)
      .ok_or_else(|| {
        serde::de::Error::custom(
          format!(
            "invalid YYYY-MM-DD date: \
             {raw}"
          )
        )
      })
  }

  pub mod option {
    use chrono::NaiveDate;
    use serde::{
      Deserialize,
      Deserializer,
      Serializer
    };

    pub fn serialize<S>(
      date: &Option<NaiveDate>,
      serializer: S
    ) -> Result<S::Ok, S::Error>
    where
      S: Serializer
    {
      match date {
        | Some(value) => {
          super::serialize(
            value, serializer
          )
        }
        | None => {
          serializer.serialize_none()
        }
      }
    }

    pub fn deserialize<'de, D>(
      deserializer: D
    ) -> Result<
      Option<NaiveDate>,
      D::Error
    >
    where
      D: Deserializer<'de>
    {
      let opt =
        Option::<String>::deserialize(
          deserializer
        )?;
      match opt {
        | Some(raw) if raw.trim().is_empty() => Ok(None),
        | Some(raw) => super::super::parse_iso_date(&raw)
          .map(Some)
          .ok_or_else(|| {
            serde::de::Error::custom(
              format!(
                "invalid YYYY-MM-DD date: \
                 {raw}"
              )
            )
          }),
        | None => Ok(None)
      }
    }
  }
}
