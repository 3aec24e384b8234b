use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::event::CalendarEvent;
use crate::settings::AppSettings;
use crate::task::{Task, ValidationError};

/// The three records this store manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKey {
    Tasks,
    Events,
    Settings,
}

impl StorageKey {
    pub const ALL: [StorageKey; 3] = [StorageKey::Tasks, StorageKey::Events, StorageKey::Settings];

    pub fn as_str(self) -> &'static str {
        match self {
            StorageKey::Tasks => "focus_tasks",
            StorageKey::Events => "focus_events",
            StorageKey::Settings => "focus_settings",
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable string-keyed medium underneath [`DataStore`].
pub trait KeyValueStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()>;
    fn remove(&mut self, key: &str) -> anyhow::Result<()>;
}

/// One `<key>.json` file per record inside a data directory.
#[derive(Debug)]
pub struct FileStore {
    pub data_dir: PathBuf,
}

impl FileStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;
        info!(data_dir = %data_dir.display(), "opened file store");
        Ok(Self { data_dir })
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        Ok(Some(raw))
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let path = self.path_for(key);
        write_atomic(&path, value)
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("failed removing {}", path.display()))?;
        }
        Ok(())
    }
}

/// In-process medium, used by tests and by callers that do not want disk I/O.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Everything the store holds, as one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub events: Vec<CalendarEvent>,
    #[serde(default)]
    pub settings: AppSettings,
}

impl Snapshot {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut seen = HashSet::new();
        for task in &self.tasks {
            if task.title.trim().is_empty() {
                return Err(ValidationError::EmptyTitle);
            }
            if !seen.insert(task.id.as_str()) {
                return Err(ValidationError::DuplicateId {
                    collection: "tasks",
                    id: task.id.clone(),
                });
            }
        }

        let mut seen = HashSet::new();
        for event in &self.events {
            if event.title.trim().is_empty() {
                return Err(ValidationError::EmptyTitle);
            }
            if !seen.insert(event.id.as_str()) {
                return Err(ValidationError::DuplicateId {
                    collection: "events",
                    id: event.id.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Owner of the canonical task, event and settings records.
#[derive(Debug)]
pub struct DataStore<S: KeyValueStore = FileStore> {
    medium: S,
}

impl DataStore<FileStore> {
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        Ok(Self::new(FileStore::open(data_dir)?))
    }

    pub fn data_dir(&self) -> &Path {
        &self.medium.data_dir
    }
}

impl DataStore<MemoryStore> {
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }
}

impl<S: KeyValueStore> DataStore<S> {
    pub fn new(medium: S) -> Self {
        Self { medium }
    }

    pub fn medium(&self) -> &S {
        &self.medium
    }

    /// Reads `key`, falling back to `default` when the record is absent,
    /// unreadable or not valid for `T`. Never fails.
    #[tracing::instrument(skip(self, default))]
    pub fn load<T: DeserializeOwned>(&self, key: StorageKey, default: T) -> T {
        let raw = match self.medium.get(key.as_str()) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(%key, "record absent; using default");
                return default;
            }
            Err(err) => {
                warn!(%key, error = %format!("{err:#}"), "failed reading record; using default");
                return default;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(err) => {
                warn!(%key, error = %err, "corrupt record; using default");
                default
            }
        }
    }

    /// Serializes `value` under `key`, replacing whatever was there.
    #[tracing::instrument(skip(self, value))]
    pub fn save<T: Serialize + ?Sized>(&mut self, key: StorageKey, value: &T) -> anyhow::Result<()> {
        let serialized = serde_json::to_string(value)
            .with_context(|| format!("failed to serialize {key}"))?;
        self.medium
            .set(key.as_str(), &serialized)
            .with_context(|| format!("failed to save {key}"))?;
        debug!(%key, bytes = serialized.len(), "saved record");
        Ok(())
    }

    /// Drops all managed records; the next loads see first-run defaults.
    #[tracing::instrument(skip(self))]
    pub fn reset(&mut self) -> anyhow::Result<()> {
        for key in StorageKey::ALL {
            self.medium
                .remove(key.as_str())
                .with_context(|| format!("failed to remove {key}"))?;
        }
        info!("reset all stored data");
        Ok(())
    }

    pub fn load_tasks(&self) -> Vec<Task> {
        self.load(StorageKey::Tasks, Vec::new())
    }

    pub fn save_tasks(&mut self, tasks: &[Task]) -> anyhow::Result<()> {
        self.save(StorageKey::Tasks, tasks)
    }

    pub fn load_events(&self) -> Vec<CalendarEvent> {
        self.load(StorageKey::Events, Vec::new())
    }

    pub fn save_events(&mut self, events: &[CalendarEvent]) -> anyhow::Result<()> {
        self.save(StorageKey::Events, events)
    }

    pub fn load_settings(&self) -> AppSettings {
        self.load(StorageKey::Settings, AppSettings::default())
    }

    pub fn save_settings(&mut self, settings: &AppSettings) -> anyhow::Result<()> {
        self.save(StorageKey::Settings, settings)
    }

    pub fn export_snapshot(&self) -> Snapshot {
        Snapshot {
            tasks: self.load_tasks(),
            events: self.load_events(),
            settings: self.load_settings(),
        }
    }

    /// Replaces all three records with `snapshot`. Nothing is written when
    /// validation fails.
    #[tracing::instrument(skip(self, snapshot))]
    pub fn import_snapshot(&mut self, snapshot: &Snapshot) -> anyhow::Result<()> {
        snapshot.validate().context("rejected snapshot")?;
        self.save_tasks(&snapshot.tasks)?;
        self.save_events(&snapshot.events)?;
        self.save_settings(&snapshot.settings)?;
        info!(
            tasks = snapshot.tasks.len(),
            events = snapshot.events.len(),
            "imported snapshot"
        );
        Ok(())
    }
}

#[tracing::instrument(skip(path, contents))]
fn write_atomic(path: &Path, contents: &str) -> anyhow::Result<()> {
    debug!(file = %path.display(), bytes = contents.len(), "writing atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(contents.as_bytes())?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
