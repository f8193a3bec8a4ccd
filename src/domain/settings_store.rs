//! Persisted daemon settings and the consent record.
//!
//! The reporting worker reads through [`SettingsStore`]; configuration
//! callers (control API, CLI) write through it. Writes go to a `.tmp` file
//! that is atomically renamed over the real one, so readers never observe a
//! half-written file.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::consent::{ConsentRecord, ConsentUpdate};
use crate::error::StoreError;

pub const DEFAULT_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_GEOIP_PROVIDER: &str = "ipapi.co";

/// Daemon run settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_geoip_provider")]
    pub geoip_provider: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            geoip_provider: default_geoip_provider(),
        }
    }
}

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_geoip_provider() -> String {
    DEFAULT_GEOIP_PROVIDER.to_string()
}

/// External request to change run settings. `None` fields are untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsUpdate {
    #[serde(default)]
    pub interval_secs: Option<u64>,
    #[serde(default)]
    pub geoip_provider: Option<String>,
}

/// Persistence contract shared by the worker and configuration callers.
pub trait SettingsStore: Send + Sync {
    fn read_settings(&self) -> Result<Settings, StoreError>;

    fn read_consent(&self) -> Result<ConsentRecord, StoreError>;

    fn write_last_sent(&self, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Apply a consent update atomically; returns the stored record.
    fn update_consent(
        &self,
        update: ConsentUpdate,
        now: DateTime<Utc>,
    ) -> Result<ConsentRecord, StoreError>;

    fn update_settings(&self, update: SettingsUpdate) -> Result<Settings, StoreError>;
}

/// On-disk layout of `settings.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    settings: Settings,
    #[serde(default)]
    consent: ConsentRecord,
}

/// YAML-file backed store.
pub struct YamlSettingsStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl YamlSettingsStore {
    /// Open the store, creating the file with defaults (and a
    /// never-configured consent record) if it does not exist yet.
    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        let store = Self {
            path,
            write_lock: Mutex::new(()),
        };
        if !store.path.exists() {
            store.save(&StateFile::default())?;
            info!(path = %store.path.display(), "created settings store");
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<StateFile, StoreError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(StateFile::default());
        }
        serde_yaml::from_str(&content).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, state: &StateFile) -> Result<(), StoreError> {
        let content = serde_yaml::to_string(state)?;
        write_atomic(&self.path, &content)
    }

    /// Read-modify-write under the write lock.
    fn modify<T>(
        &self,
        f: impl FnOnce(&mut StateFile) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut state = self.load()?;
        let out = f(&mut state)?;
        self.save(&state)?;
        Ok(out)
    }
}

impl SettingsStore for YamlSettingsStore {
    fn read_settings(&self) -> Result<Settings, StoreError> {
        Ok(self.load()?.settings)
    }

    fn read_consent(&self) -> Result<ConsentRecord, StoreError> {
        Ok(self.load()?.consent)
    }

    fn write_last_sent(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.modify(|state| {
            state.consent.last_sent_at = Some(at);
            Ok(())
        })
    }

    fn update_consent(
        &self,
        update: ConsentUpdate,
        now: DateTime<Utc>,
    ) -> Result<ConsentRecord, StoreError> {
        self.modify(|state| {
            state.consent.apply(update, now)?;
            Ok(state.consent.clone())
        })
    }

    fn update_settings(&self, update: SettingsUpdate) -> Result<Settings, StoreError> {
        self.modify(|state| {
            if let Some(secs) = update.interval_secs {
                state.settings.interval_secs = secs.max(1);
            }
            if let Some(provider) = update.geoip_provider {
                state.settings.geoip_provider = provider;
            }
            Ok(state.settings.clone())
        })
    }
}

/// In-memory store for embedding hosts that persist consent elsewhere.
#[derive(Default)]
pub struct MemorySettingsStore {
    state: Mutex<(Settings, ConsentRecord)>,
}

impl MemorySettingsStore {
    pub fn new(settings: Settings, consent: ConsentRecord) -> Self {
        Self {
            state: Mutex::new((settings, consent)),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn read_settings(&self) -> Result<Settings, StoreError> {
        Ok(self.state.lock().unwrap_or_else(PoisonError::into_inner).0.clone())
    }

    fn read_consent(&self) -> Result<ConsentRecord, StoreError> {
        Ok(self.state.lock().unwrap_or_else(PoisonError::into_inner).1.clone())
    }

    fn write_last_sent(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).1.last_sent_at = Some(at);
        Ok(())
    }

    fn update_consent(
        &self,
        update: ConsentUpdate,
        now: DateTime<Utc>,
    ) -> Result<ConsentRecord, StoreError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.1.apply(update, now)?;
        Ok(state.1.clone())
    }

    fn update_settings(&self, update: SettingsUpdate) -> Result<Settings, StoreError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(secs) = update.interval_secs {
            state.0.interval_secs = secs.max(1);
        }
        if let Some(provider) = update.geoip_provider {
            state.0.geoip_provider = provider;
        }
        Ok(state.0.clone())
    }
}

/// Write `content` to `path` via a sibling `.tmp` file and a rename.
pub(crate) fn write_atomic(path: &Path, content: &str) -> Result<(), StoreError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| StoreError::Io { path, source }
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err(parent))?;
    }

    let tmp_path = path.with_extension("yaml.tmp");
    std::fs::write(&tmp_path, content).map_err(io_err(&tmp_path))?;
    std::fs::rename(&tmp_path, path).map_err(io_err(path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::consent::Activation;
    use crate::error::ConsentError;

    fn open_temp() -> (tempfile::TempDir, YamlSettingsStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = YamlSettingsStore::open(dir.path().join("settings.yaml")).unwrap();
        (dir, store)
    }

    #[test]
    fn open_creates_defaults() {
        let (_dir, store) = open_temp();
        assert!(store.path().exists());
        assert_eq!(store.read_settings().unwrap(), Settings::default());
        assert_eq!(store.read_consent().unwrap().active, Activation::NeverConfigured);
    }

    #[test]
    fn consent_update_round_trips_through_disk() {
        let (dir, store) = open_temp();
        let now = Utc::now();
        store
            .update_consent(
                ConsentUpdate {
                    active: Some(true),
                    categories: Some([("APP".to_string(), true)].into_iter().collect()),
                },
                now,
            )
            .unwrap();

        let reopened = YamlSettingsStore::open(dir.path().join("settings.yaml")).unwrap();
        let consent = reopened.read_consent().unwrap();
        assert!(consent.is_reporting_active());
        assert!(consent.is_category_enabled("APP"));
        assert_eq!(consent.opt_in_at, Some(now));
    }

    #[test]
    fn rejected_consent_update_leaves_file_untouched() {
        let (_dir, store) = open_temp();
        let err = store
            .update_consent(
                ConsentUpdate {
                    active: Some(true),
                    categories: None,
                },
                Utc::now(),
            )
            .unwrap_err();

        assert!(matches!(err, StoreError::Consent(ConsentError::NoCategories)));
        assert_eq!(store.read_consent().unwrap(), ConsentRecord::default());
    }

    #[test]
    fn last_sent_and_settings_updates() {
        let (_dir, store) = open_temp();
        let now = Utc::now();
        store.write_last_sent(now).unwrap();
        assert_eq!(store.read_consent().unwrap().last_sent_at, Some(now));

        let settings = store
            .update_settings(SettingsUpdate {
                interval_secs: Some(0),
                geoip_provider: Some("ipwho.is".to_string()),
            })
            .unwrap();
        assert_eq!(settings.interval_secs, 1);
        assert_eq!(settings.geoip_provider, "ipwho.is");
        assert_eq!(store.read_settings().unwrap(), settings);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(&path, "settings:\n  interval_secs: 60\n").unwrap();

        let store = YamlSettingsStore::open(path).unwrap();
        let settings = store.read_settings().unwrap();
        assert_eq!(settings.interval_secs, 60);
        assert_eq!(settings.geoip_provider, DEFAULT_GEOIP_PROVIDER);
    }

    #[test]
    fn memory_store_applies_updates() {
        let store = MemorySettingsStore::default();
        let result = store.update_consent(
            ConsentUpdate {
                active: Some(true),
                categories: Some([("OS".to_string(), true)].into_iter().collect()),
            },
            Utc::now(),
        );
        assert!(result.is_ok());
        assert!(store.read_consent().unwrap().is_category_enabled("OS"));
    }
}
