//! Persistent key-value settings with typed keys
//!
//! Cross-run state is limited to a handful of user choices (for example the
//! last device picked from a prompt). Callers receive a `SettingsStore`
//! explicitly instead of reaching for process-wide state.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{FlightdeckError, Result};

/// Name of the settings file inside the flightdeck home directory
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// A named setting holding values of type `T`
pub struct SettingKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> SettingKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Untyped storage backend
pub trait SettingsStore: Send + Sync {
    /// Read the raw JSON value stored under `key`
    fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>>;

    /// Store a raw JSON value under `key`
    fn set_value(&self, key: &str, value: serde_json::Value) -> Result<()>;

    /// Remove `key` if present
    fn remove(&self, key: &str) -> Result<()>;
}

/// Typed accessors over any `SettingsStore`
pub trait SettingsStoreExt: SettingsStore {
    fn get<T: DeserializeOwned>(&self, key: &SettingKey<T>) -> Result<Option<T>> {
        match self.get_value(key.name())? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    fn set<T: Serialize>(&self, key: &SettingKey<T>, value: &T) -> Result<()> {
        self.set_value(key.name(), serde_json::to_value(value)?)
    }
}

impl<S: SettingsStore + ?Sized> SettingsStoreExt for S {}

/// JSON file backed store
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `~/.flightdeck/settings.json`
    pub fn default_location() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| FlightdeckError::Settings("home directory not found".to_string()))?;
        Ok(Self::new(home.join(".flightdeck").join(SETTINGS_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, serde_json::Value>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn write_all(&self, values: &BTreeMap<String, serde_json::Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(values)?)?;
        debug!(path = %self.path.display(), "settings written");
        Ok(())
    }
}

impl SettingsStore for FileSettingsStore {
    fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set_value(&self, key: &str, value: serde_json::Value) -> Result<()> {
        let mut values = self.read_all()?;
        values.insert(key.to_string(), value);
        self.write_all(&values)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.read_all()?;
        if values.remove(key).is_some() {
            self.write_all(&values)?;
        }
        Ok(())
    }
}

/// In-memory store, used by tests and non-persistent runs
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    values: Mutex<BTreeMap<String, serde_json::Value>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, serde_json::Value>>> {
        self.values
            .lock()
            .map_err(|_| FlightdeckError::Settings("settings lock poisoned".to_string()))
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set_value(&self, key: &str, value: serde_json::Value) -> Result<()> {
        self.lock()?.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}
