use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

use crate::{monitor::ShieldPreference, utils::locks::recover};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserSettings {
    #[serde(default = "default_shield_enabled")]
    shield_enabled: bool,
}

fn default_shield_enabled() -> bool {
    true
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            shield_enabled: default_shield_enabled(),
        }
    }
}

/// File-backed user preferences.
///
/// Reads are served from the in-memory copy, so the engine's hot path sees
/// the latest value written through this store without touching disk.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring unreadable settings at {}: {err}", path.display());
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn shield_enabled(&self) -> bool {
        recover(self.data.read()).shield_enabled
    }

    pub fn set_shield_enabled(&self, enabled: bool) -> Result<()> {
        let mut guard = recover(self.data.write());
        guard.shield_enabled = enabled;
        self.persist(&guard)
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: UserSettings = serde_json::from_str(&contents)?;
        let mut guard = recover(self.data.write());
        *guard = data;
        Ok(())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

impl ShieldPreference for SettingsStore {
    fn is_shield_enabled(&self) -> bool {
        self.shield_enabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_to_enabled() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        assert!(store.is_shield_enabled());
    }

    #[test]
    fn test_toggle_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");

        let store = SettingsStore::new(path.clone()).unwrap();
        store.set_shield_enabled(false).unwrap();
        assert!(!store.is_shield_enabled());

        let reopened = SettingsStore::new(path).unwrap();
        assert!(!reopened.is_shield_enabled());
    }

    #[test]
    fn test_reload_picks_up_external_edit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        fs::write(&path, r#"{ "shield_enabled": false }"#).unwrap();
        assert!(store.is_shield_enabled());
        store.reload().unwrap();
        assert!(!store.is_shield_enabled());
    }

    #[test]
    fn test_corrupt_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json").unwrap();
        let store = SettingsStore::new(path).unwrap();
        assert!(store.is_shield_enabled());
    }
}
