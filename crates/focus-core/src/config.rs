use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow,
  bail
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::datetime::DateZone;

const FOCUSRC_ENV_VAR: &str = "FOCUSRC";
const TIMEZONE_ENV_VAR: &str =
  "FOCUS_TIMEZONE";
const DEFAULT_DATA_LOCATION: &str =
  "~/.focus";
const DEFAULT_UPCOMING_LIMIT: usize = 5;
const DEFAULT_DASHBOARD_LIMIT: usize = 3;

/// Every key a focusrc may set.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum ConfigKey {
  DataLocation,
  Color,
  UpcomingLimit,
  DashboardLimit,
  Timezone
}

impl ConfigKey {
  pub const ALL: [ConfigKey; 5] = [
    ConfigKey::DataLocation,
    ConfigKey::Color,
    ConfigKey::UpcomingLimit,
    ConfigKey::DashboardLimit,
    ConfigKey::Timezone
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      | ConfigKey::DataLocation => {
        "data.location"
      }
      | ConfigKey::Color => "color",
      | ConfigKey::UpcomingLimit => {
        "upcoming.limit"
      }
      | ConfigKey::DashboardLimit => {
        "dashboard.upcoming.limit"
      }
      | ConfigKey::Timezone => "timezone"
    }
  }

  pub fn from_key(
    raw: &str
  ) -> Option<Self> {
    let raw = raw.trim();
    Self::ALL
      .into_iter()
      .find(|key| key.as_str() == raw)
  }
}

/// Effective settings after the focusrc,
/// `$FOCUS_TIMEZONE` and `--rc`
/// overrides, in that order.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
  pub data_location:   PathBuf,
  pub color:           bool,
  pub upcoming_limit:  usize,
  pub dashboard_limit: usize,
  pub timezone:        DateZone,
  pub loaded_files:    Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    Self {
      data_location: PathBuf::from(
        DEFAULT_DATA_LOCATION
      ),
      color: true,
      upcoming_limit:
        DEFAULT_UPCOMING_LIMIT,
      dashboard_limit:
        DEFAULT_DASHBOARD_LIMIT,
      timezone: DateZone::default(),
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    focusrc_override
  ))]
  pub fn load(
    focusrc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    match focusrc_path(focusrc_override) {
      | Some(path) => {
        info!(focusrc = %path.display(), "loading focusrc");
        cfg.load_file(&path)?;
      }
      | None => {
        debug!("no focusrc; using defaults")
      }
    }

    if let Ok(raw) =
      std::env::var(TIMEZONE_ENV_VAR)
      && !raw.trim().is_empty()
    {
      cfg
        .set(
          ConfigKey::Timezone.as_str(),
          &raw
        )
        .with_context(|| {
          format!(
            "invalid \
             ${TIMEZONE_ENV_VAR}"
          )
        })?;
    }

    Ok(cfg)
  }

  /// `--rc` and bare `rc.key=value`
  /// overrides; the `rc.` prefix is
  /// optional.
  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) -> anyhow::Result<()>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key =
        k.strip_prefix("rc.").unwrap_or(&k);
      debug!(key, value = %v, "applying override");
      self.set(key, &v).with_context(
        || format!("invalid override {k}")
      )?;
    }
    Ok(())
  }

  /// Parses `value` for `key` and
  /// stores it. Unknown keys and
  /// malformed values are errors.
  pub fn set(
    &mut self,
    key: &str,
    value: &str
  ) -> anyhow::Result<()> {
    let key =
      ConfigKey::from_key(key).ok_or_else(
        || anyhow!("unknown config key: {key}")
      )?;
    let value = value.trim();

    match key {
      | ConfigKey::DataLocation => {
        if value.is_empty() {
          bail!(
            "data.location cannot be \
             empty"
          );
        }
        self.data_location =
          PathBuf::from(value);
      }
      | ConfigKey::Color => {
        self.color = parse_switch(value)
          .ok_or_else(|| {
            anyhow!(
              "color must be on or off, \
               got {value:?}"
            )
          })?;
      }
      | ConfigKey::UpcomingLimit => {
        self.upcoming_limit =
          parse_limit(key, value)?;
      }
      | ConfigKey::DashboardLimit => {
        self.dashboard_limit =
          parse_limit(key, value)?;
      }
      | ConfigKey::Timezone => {
        self.timezone =
          DateZone::parse(value)
            .ok_or_else(|| {
              anyhow!(
                "unknown timezone \
                 {value:?}"
              )
            })?;
      }
    }
    Ok(())
  }

  /// Effective value of every key, in
  /// declaration order.
  pub fn entries(
    &self
  ) -> Vec<(&'static str, String)> {
    ConfigKey::ALL
      .into_iter()
      .map(|key| {
        let value = match key {
          | ConfigKey::DataLocation => {
            self
              .data_location
              .display()
              .to_string()
          }
          | ConfigKey::Color => {
            let switch =
              if self.color { "on" } else { "off" };
            switch.to_string()
          }
          | ConfigKey::UpcomingLimit => {
            self.upcoming_limit.to_string()
          }
          | ConfigKey::DashboardLimit => {
            self
              .dashboard_limit
              .to_string()
          }
          | ConfigKey::Timezone => {
            self.timezone.to_string()
          }
        };
        (key.as_str(), value)
      })
      .collect()
  }

  /// `override_dir` when given, else
  /// `data.location` with `~/`
  /// expanded.
  pub fn data_dir(
    &self,
    override_dir: Option<&Path>
  ) -> anyhow::Result<PathBuf> {
    match override_dir {
      | Some(dir) => Ok(dir.to_path_buf()),
      | None => {
        expand_tilde(&self.data_location)
      }
    }
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = canonical(path)?;
    if self.loaded_files.contains(&path) {
      warn!(file = %path.display(), "already loaded; skipping include");
      return Ok(());
    }
    let text = fs::read_to_string(&path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;
    self.loaded_files.push(path.clone());

    let base_dir = path
      .parent()
      .map(Path::to_path_buf)
      .unwrap_or_default();

    for (idx, raw_line) in
      text.lines().enumerate()
    {
      let line = raw_line
        .split_once('#')
        .map_or(raw_line, |(before, _)| {
          before
        })
        .trim();
      if line.is_empty() {
        continue;
      }
      let at = || {
        format!(
          "{}:{}",
          path.display(),
          idx + 1
        )
      };

      if let Some(include) =
        line.strip_prefix("include ")
      {
        let include = include.trim();
        if include.is_empty() {
          bail!(
            "{}: include needs a path",
            at()
          );
        }
        let target =
          base_dir.join(expand_tilde(
            Path::new(include)
          )?);
        if target.exists() {
          self
            .load_file(&target)
            .with_context(at)?;
        } else {
          warn!(include = %target.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (key, value) =
        line.split_once('=').ok_or_else(
          || {
            anyhow!(
              "{}: expected key = value",
              at()
            )
          }
        )?;
      if ConfigKey::from_key(key).is_none()
      {
        warn!(key = key.trim(), line = %at(), "unknown config key; ignoring");
        continue;
      }
      trace!(key = key.trim(), value = value.trim(), "config line");
      self.set(key, value).with_context(at)?;
    }

    Ok(())
  }
}

fn focusrc_path(
  override_path: Option<&Path>
) -> Option<PathBuf> {
  if let Some(path) = override_path {
    return Some(path.to_path_buf());
  }
  match std::env::var(FOCUSRC_ENV_VAR) {
    | Ok(raw) if raw == "/dev/null" => None,
    | Ok(raw) if !raw.trim().is_empty() => {
      Some(PathBuf::from(raw.trim()))
    }
    | _ => dirs::home_dir()
      .map(|home| home.join(".focusrc"))
      .filter(|path| path.exists())
  }
}

fn canonical(
  path: &Path
) -> anyhow::Result<PathBuf> {
  let expanded = expand_tilde(path)?;
  fs::canonicalize(&expanded).with_context(
    || {
      format!(
        "failed to read {}",
        expanded.display()
      )
    }
  )
}

fn expand_tilde(
  path: &Path
) -> anyhow::Result<PathBuf> {
  let Ok(rest) = path.strip_prefix("~")
  else {
    return Ok(path.to_path_buf());
  };
  let home = dirs::home_dir().ok_or_else(
    || anyhow!("cannot determine home directory")
  )?;
  Ok(home.join(rest))
}

fn parse_switch(raw: &str) -> Option<bool> {
  match raw.to_ascii_lowercase().as_str() {
    | "on" | "yes" | "true" | "1" => {
      Some(true)
    }
    | "off" | "no" | "false" | "0" => {
      Some(false)
    }
    | _ => None
  }
}

fn parse_limit(
  key: ConfigKey,
  raw: &str
) -> anyhow::Result<usize> {
  match raw.parse::<usize>() {
    | Ok(value) if value > 0 => Ok(value),
    | _ => bail!(
      "{} must be a positive integer, \
       got {raw:?}",
      key.as_str()
    )
  }
}

#[cfg(test)]
mod tests {
  use std::fs;

  use tempfile::tempdir;

  use super::{
    Config,
    DateZone
  };

  fn pairs(
    items: &[(&str, &str)]
  ) -> Vec<(String, String)> {
    items
      .iter()
      .map(|(k, v)| {
        (k.to_string(), v.to_string())
      })
      .collect()
  }

  #[test]
  fn reads_file_with_comments_and_includes()
  {
    let dir =
      tempdir().expect("tempdir");
    fs::write(
      dir.path().join("extra"),
      "upcoming.limit = 7\n\
       timezone = Europe/Paris\n"
    )
    .expect("write include");
    let main = dir.path().join("focusrc");
    fs::write(
      &main,
      "# focus settings\n\
       color = off   # plain output\n\
       include extra\n\
       data.location = /tmp/focus-data\n\
       report.next = ignored\n"
    )
    .expect("write focusrc");

    let cfg = Config::load(Some(&main))
      .expect("load config");
    assert!(!cfg.color);
    assert_eq!(cfg.upcoming_limit, 7);
    assert_eq!(cfg.dashboard_limit, 3);
    assert_eq!(
      cfg.data_location,
      std::path::PathBuf::from(
        "/tmp/focus-data"
      )
    );
    assert_eq!(
      cfg.timezone,
      DateZone::parse("Europe/Paris")
        .expect("known zone")
    );
    assert_eq!(cfg.loaded_files.len(), 2);
  }

  #[test]
  fn self_include_through_parent_dir_loads_once()
  {
    let dir =
      tempdir().expect("tempdir");
    let nested = dir.path().join("d");
    fs::create_dir(&nested)
      .expect("mkdir");
    let main = nested.join("focusrc");
    fs::write(
      &main,
      "include ../d/focusrc\n\
       upcoming.limit = 4\n"
    )
    .expect("write focusrc");

    let cfg = Config::load(Some(&main))
      .expect("load config");
    assert_eq!(cfg.upcoming_limit, 4);
    assert_eq!(cfg.loaded_files.len(), 1);
  }

  #[test]
  fn mutual_includes_terminate() {
    let dir =
      tempdir().expect("tempdir");
    fs::write(
      dir.path().join("a"),
      "include ./b\ncolor = off\n"
    )
    .expect("write a");
    fs::write(
      dir.path().join("b"),
      "include a\n\
       dashboard.upcoming.limit = 2\n"
    )
    .expect("write b");

    let cfg = Config::load(Some(
      &dir.path().join("a")
    ))
    .expect("load config");
    assert!(!cfg.color);
    assert_eq!(cfg.dashboard_limit, 2);
    assert_eq!(cfg.loaded_files.len(), 2);
  }

  #[test]
  fn malformed_values_are_errors() {
    let dir =
      tempdir().expect("tempdir");
    for body in [
      "color on\n",
      "upcoming.limit = 0\n",
      "dashboard.upcoming.limit = many\n",
      "color = maybe\n",
      "timezone = Mars/Olympus\n",
      "data.location =\n",
      "include \n"
    ] {
      let path =
        dir.path().join("focusrc");
      fs::write(&path, body)
        .expect("write focusrc");
      assert!(
        Config::load(Some(&path)).is_err(),
        "accepted {body:?}"
      );
    }
  }

  #[test]
  fn overrides_strip_rc_prefix_and_validate()
  {
    let mut cfg = Config::default();
    cfg
      .apply_overrides(pairs(&[
        ("rc.upcoming.limit", "2"),
        ("color", "no"),
        ("rc.timezone", "local")
      ]))
      .expect("valid overrides");
    assert_eq!(cfg.upcoming_limit, 2);
    assert!(!cfg.color);
    assert_eq!(
      cfg.timezone,
      DateZone::Local
    );

    assert!(
      cfg
        .apply_overrides(pairs(&[(
          "rc.upcoming.limit",
          "-1"
        )]))
        .is_err()
    );
    assert!(
      cfg
        .apply_overrides(pairs(&[(
          "rc.nope",
          "1"
        )]))
        .is_err()
    );
  }

  #[test]
  fn entries_list_every_key() {
    let cfg = Config::default();
    let entries = cfg.entries();
    assert_eq!(entries.len(), 5);
    assert_eq!(
      entries[0],
      (
        "data.location",
        "~/.focus".to_string()
      )
    );
    assert_eq!(
      entries[4],
      ("timezone", "local".to_string())
    );
  }

  #[test]
  fn data_dir_prefers_override() {
    let cfg = Config::default();
    let dir =
      tempdir().expect("tempdir");
    assert_eq!(
      cfg
        .data_dir(Some(dir.path()))
        .expect("data dir"),
      dir.path().to_path_buf()
    );
  }
}
