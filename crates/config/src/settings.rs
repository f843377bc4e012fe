// Application settings
// Loaded from ~/.config/seatkeeper/settings.toml

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use seatkeeper_recon::{EngineConfig, ReconError};

/// One named record store (a SQLite file).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSettings {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Canonical district dataset (CSV with level, state, district).
    pub reference: PathBuf,

    /// Store used when a command does not name one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_store: Option<String>,

    #[serde(default)]
    pub stores: BTreeMap<String, StoreSettings>,

    #[serde(default)]
    pub engine: EngineConfig,
}

impl Default for Settings {
    fn default() -> Self {
        let mut stores = BTreeMap::new();
        stores.insert("local".to_string(), StoreSettings { path: PathBuf::from("local.db") });
        Self {
            reference: PathBuf::from("districts.csv"),
            default_store: Some("local".to_string()),
            stores,
            engine: EngineConfig::default(),
        }
    }
}

const DEFAULT_FILE: &str = r#"# seatkeeper settings
# Relative paths are resolved against this file's directory.

# Canonical district list: CSV with level, state, district columns
reference = "districts.csv"

default_store = "local"

[stores.local]
path = "local.db"

# [stores.archive]
# path = "archive.db"

[engine]
# Similarity floor (0-100) below which a name is treated as new during merge
merge_floor = 60

# Defaults applied to a peer document before it fills new records
[engine.template]
strip = []
stamp = ["dateAdded", "dateModified"]
empty = ["audioPath", "pendingAudioPath", "pendingFilename", "pronunciation"]
empty_list = ["emails", "phones", "networks"]
set_true = ["active"]
set_false = ["needsAudio", "needsReview"]

# Values for records created when repairing an empty seat
[engine.new_seat]
country = "us"
active = true
needs_audio = false
needs_review = false
"#;

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("seatkeeper");
        config_dir.join("settings.toml")
    }

    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let settings: Settings = toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.stores.is_empty() {
            return Err(ReconError::ConfigValidation("at least one [stores.<name>] entry is required".into()));
        }
        if let Some(name) = &self.default_store {
            if !self.stores.contains_key(name) {
                return Err(ReconError::ConfigValidation(format!(
                    "default_store '{name}' is not a configured store"
                )));
            }
        }
        for (name, store) in &self.stores {
            if store.path.as_os_str().is_empty() {
                return Err(ReconError::ConfigValidation(format!("stores.{name}: path is empty")));
            }
        }
        self.engine.validate()
    }

    /// Load from an explicit file. Relative paths are resolved against the
    /// file's directory.
    pub fn load_from(path: &Path) -> Result<Self, ReconError> {
        let contents =
            fs::read_to_string(path).map_err(|e| ReconError::Io(format!("{}: {e}", path.display())))?;
        let mut settings = Self::from_toml(&contents)?;
        if let Some(base) = path.parent() {
            settings.resolve_relative(base);
        }
        Ok(settings)
    }

    /// Load the user's settings file, writing a commented default one first
    /// if none exists.
    pub fn load() -> Result<Self, ReconError> {
        let path = Self::config_path();
        if !path.exists() {
            Self::create_default_file(&path);
            let mut settings = Self::default();
            if let Some(base) = path.parent() {
                settings.resolve_relative(base);
            }
            return Ok(settings);
        }
        Self::load_from(&path)
    }

    fn create_default_file(path: &Path) {
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                log::warn!("cannot create config directory {}: {e}", parent.display());
                return;
            }
        }
        match fs::write(path, DEFAULT_FILE) {
            Ok(()) => log::info!("wrote default settings to {}", path.display()),
            Err(e) => log::warn!("cannot write default settings {}: {e}", path.display()),
        }
    }

    fn resolve_relative(&mut self, base: &Path) {
        if self.reference.is_relative() {
            self.reference = base.join(&self.reference);
        }
        for store in self.stores.values_mut() {
            if store.path.is_relative() {
                store.path = base.join(&store.path);
            }
        }
    }

    /// Look up a store by name, or the default store when `name` is `None`.
    pub fn store(&self, name: Option<&str>) -> Result<(&str, &StoreSettings), ReconError> {
        let name = match name.or(self.default_store.as_deref()) {
            Some(n) => n,
            None => {
                return Err(ReconError::ConfigValidation(
                    "no store named and no default_store configured".into(),
                ))
            }
        };
        self.stores
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| ReconError::ConfigValidation(format!("unknown store '{name}'")))
    }

    /// Get the config file path for display/opening
    pub fn config_path_display() -> String {
        Self::config_path().to_string_lossy().to_string()
    }
}
