use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::event::EventKind;
use crate::filter::{PriorityFilter, StatusFilter};
use crate::settings::{Page, WeekStart};
use crate::task::Priority;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "focus",
    version,
    about = "Focus: tasks, calendar events and goals kept in local storage",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "focusrc", global = true)]
    pub focusrc: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    /// Without a command, the configured default view is shown.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Manage tasks.
    #[command(subcommand)]
    Task(TaskCommand),
    /// Manage calendar events.
    #[command(subcommand)]
    Event(EventCommand),
    /// Show a month grid with event markers.
    Calendar {
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        month: Option<u32>,
        /// Months to move from the chosen month, e.g. -1 or 2.
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        shift: i32,
    },
    /// List the next events, earliest first.
    Upcoming {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Task counts and the nearest events.
    Dashboard,
    /// Goal progress overview.
    Goals {
        /// JSON file holding a list of goals.
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Show or change preferences.
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// Print the effective configuration.
    Config,
    /// Remove all stored tasks, events and settings.
    Reset {
        #[arg(long)]
        yes: bool,
    },
    /// Write every stored record to stdout as one JSON document.
    Export,
    /// Replace every stored record with a previously exported document.
    Import { path: PathBuf },
}

#[derive(Args, Debug, Clone, Default)]
pub struct TaskFieldArgs {
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long, value_enum)]
    pub priority: Option<Priority>,
    /// YYYY-MM-DD; an empty value clears it.
    #[arg(long)]
    pub due: Option<String>,
    /// Comma separated; an empty value clears them.
    #[arg(long)]
    pub tags: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TaskCommand {
    Add {
        title: String,
        #[command(flatten)]
        fields: TaskFieldArgs,
    },
    List {
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, value_enum, default_value_t = StatusFilter::All)]
        status: StatusFilter,
        #[arg(long, value_enum, default_value_t = PriorityFilter::All)]
        priority: PriorityFilter,
    },
    Info {
        id: String,
    },
    /// Toggle completion.
    Done {
        id: String,
    },
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[command(flatten)]
        fields: TaskFieldArgs,
    },
    Delete {
        id: String,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum EventCommand {
    Add {
        title: String,
        #[arg(long)]
        date: String,
        #[arg(long = "type", value_enum, default_value_t = EventKind::Task)]
        kind: EventKind,
        #[arg(long)]
        description: Option<String>,
    },
    List {
        /// Only events on this YYYY-MM-DD date.
        #[arg(long)]
        date: Option<String>,
    },
    Delete {
        id: String,
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum SettingsCommand {
    Show,
    #[command(subcommand)]
    Set(SettingField),
}

#[derive(Subcommand, Debug, Clone)]
pub enum SettingField {
    DarkMode {
        #[arg(action = ArgAction::Set)]
        enabled: bool,
    },
    DefaultView {
        #[arg(value_enum)]
        page: Page,
    },
    WeekStart {
        #[arg(value_enum)]
        start: WeekStart,
    },
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Global flags that consume the following word as their value.
const VALUE_FLAGS: [&str; 3] = ["--rc", "--focusrc", "--data"];

/// Pulls bare `rc.key=value` / `rc.key:value` words that come before the
/// subcommand out of argv. Words after it belong to the subcommand.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    let mut in_command = false;
    let mut takes_value = false;
    for arg in iter {
        if in_command || takes_value {
            takes_value = false;
            cleaned.push(arg);
            continue;
        }

        let word = arg.to_string_lossy().into_owned();
        if let Some((key, value)) = split_rc_word(&word) {
            debug!(key = %key, value = %value, "captured positional rc override");
            overrides.push((key, value));
            continue;
        }

        if word == "--" {
            in_command = true;
        } else if VALUE_FLAGS.contains(&word.as_str()) {
            takes_value = true;
        } else if !word.starts_with('-') {
            in_command = true;
        }
        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}

fn split_rc_word(word: &str) -> Option<(String, String)> {
    let rest = word.strip_prefix("rc.")?;
    let (key, value) = rest.split_once('=').or_else(|| rest.split_once(':'))?;
    Some((format!("rc.{key}"), value.to_string()))
}
