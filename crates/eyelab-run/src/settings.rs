//! Persisted task settings: a flat JSON object under `<root>/settings/`.

use anyhow::{Context, Result};
use log::info;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_SETTINGS: &str = include_str!("default_settings.json");

pub type SettingsMap = Map<String, Value>;

pub fn default_settings() -> Result<SettingsMap> {
    serde_json::from_str(DEFAULT_SETTINGS).context("parsing built-in default settings")
}

pub fn settings_path(root: &Path) -> PathBuf {
    root.join("settings").join("settings.json")
}

#[derive(Debug, Clone)]
pub struct Settings {
    path: PathBuf,
    values: SettingsMap,
}

impl Settings {
    /// Load `<root>/settings/settings.json`, or the defaults when it does not exist.
    pub fn load(root: &Path) -> Result<Self> {
        let path = settings_path(root);
        let values = if path.is_file() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("reading settings {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("parsing settings {}", path.display()))?
        } else {
            default_settings()?
        };
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn values(&self) -> &SettingsMap {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut SettingsMap {
        &mut self.values
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&self.values)?;
        fs::write(&self.path, json)
            .with_context(|| format!("writing settings {}", self.path.display()))?;
        info!("Settings saved to {}", self.path.display());
        Ok(())
    }

    /// Restore the built-in defaults and persist them.
    pub fn reset(&mut self) -> Result<()> {
        self.values = default_settings()?;
        self.save()
    }
}

/// Parse `key=value`; the value is read as JSON and falls back to a string.
pub fn parse_assignment(input: &str) -> Option<(String, Value)> {
    let (key, raw) = input.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    let raw = raw.trim();
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Some((key.to_string(), value))
}
