//! Localization: translation lookup and the persisted locale preference.
//!
//! The locale is a user preference only. It is stored next to the config
//! in `~/.alris/preferences.json` and is independent of Snapshot and Scope.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::state_dir;
use crate::error::DashboardError;
use crate::gateway::{FetchGateway, Resource};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Hi,
}

impl Locale {
    pub fn code(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Hi => "hi",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "en" => Some(Locale::En),
            "hi" => Some(Locale::Hi),
            _ => None,
        }
    }
}

/// Nested translation table for one locale.
#[derive(Debug, Clone, Default)]
pub struct Translations {
    locale: Locale,
    table: Value,
}

impl Translations {
    pub fn new(locale: Locale, table: Value) -> Self {
        Self { locale, table }
    }

    /// Fetch `translations/{code}.json`; a missing table yields an empty one
    /// so every lookup falls back to its key.
    pub async fn fetch(gateway: &FetchGateway, locale: Locale) -> Self {
        let table = gateway.fetch_resource(Resource::Translations(locale)).await;
        Self::new(locale, table)
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// Look up `a.b.c`. Missing keys and non-string leaves return the key.
    pub fn t<'a>(&'a self, key: &'a str) -> &'a str {
        key.split('.')
            .try_fold(&self.table, |node, part| node.get(part))
            .and_then(|v| v.as_str())
            .unwrap_or(key)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Preferences {
    #[serde(default)]
    locale: Locale,
}

/// Reads and writes the locale preference file.
pub struct PreferenceStore {
    path: PathBuf,
    fallback: Locale,
}

impl PreferenceStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            fallback: Locale::default(),
        }
    }

    /// Store at `~/.alris/preferences.json`.
    pub fn open_default() -> Result<Self, DashboardError> {
        Ok(Self::new(state_dir()?.join("preferences.json")))
    }

    /// Locale reported when nothing valid is stored.
    pub fn with_fallback(mut self, fallback: Locale) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Saved locale, or the fallback when nothing valid is stored.
    pub fn locale(&self) -> Locale {
        if !self.path.exists() {
            return self.fallback;
        }
        match fs::read_to_string(&self.path)
            .map_err(DashboardError::from)
            .and_then(|s| serde_json::from_str::<Preferences>(&s).map_err(DashboardError::from))
        {
            Ok(prefs) => prefs.locale,
            Err(e) => {
                log::warn!(
                    "Preferences: ignoring unreadable {}: {}",
                    self.path.display(),
                    e
                );
                self.fallback
            }
        }
    }

    pub fn set_locale(&self, locale: Locale) -> Result<(), DashboardError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_string_pretty(&Preferences { locale })?;
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, payload)?;
        fs::rename(&temp_path, &self.path)?;
        log::info!("Preferences: locale set to {}", locale.code());
        Ok(())
    }
}
