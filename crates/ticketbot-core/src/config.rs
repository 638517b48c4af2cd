//! Bot policy loaded from a TOML (or legacy JSON) file.
//!
//! Every field has a default so a file only needs the `apps` table. Call
//! [`BotConfig::load`] to read from a path.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BotError, BotResult};

/// Top-level bot policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Hours a user must wait between ticket creations.
    #[serde(default = "default_cooldown_hours")]
    pub cooldown_hours: u64,
    /// Minutes of silence after which a ticket channel closes itself.
    #[serde(default = "default_auto_close_minutes")]
    pub auto_close_minutes: u64,
    /// App name to download link.
    #[serde(default)]
    pub apps: BTreeMap<String, String>,
    #[serde(default = "default_verification_timeout_secs")]
    pub verification_timeout_secs: u64,
    #[serde(default = "default_min_membership_hours")]
    pub min_membership_hours: u64,
    #[serde(default = "default_countdown_interval_secs")]
    pub countdown_interval_secs: u64,
    #[serde(default = "default_subscribe_url")]
    pub subscribe_url: String,
    #[serde(default = "default_brand_name")]
    pub brand_name: String,
    /// Role that may see every ticket channel.
    #[serde(default)]
    pub staff_role_id: Option<u64>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            cooldown_hours: default_cooldown_hours(),
            auto_close_minutes: default_auto_close_minutes(),
            apps: BTreeMap::new(),
            verification_timeout_secs: default_verification_timeout_secs(),
            min_membership_hours: default_min_membership_hours(),
            countdown_interval_secs: default_countdown_interval_secs(),
            subscribe_url: default_subscribe_url(),
            brand_name: default_brand_name(),
            staff_role_id: None,
        }
    }
}

impl BotConfig {
    /// Loads the policy from `path`. Files ending in `.json` are parsed as
    /// JSON, anything else as TOML.
    ///
    /// # Errors
    ///
    /// - [`BotError::NotFound`] if the file does not exist.
    /// - [`BotError::ConfigParse`] if the contents are malformed.
    pub fn load(path: &Path) -> BotResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => BotError::NotFound(path.to_path_buf()),
            _ => BotError::Io(e),
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            serde_json::from_str(&content).map_err(|e| BotError::ConfigParse(e.to_string()))
        } else {
            toml::from_str(&content).map_err(|e| BotError::ConfigParse(e.to_string()))
        }
    }

    pub fn catalog(&self) -> AppCatalog {
        AppCatalog::new(self.apps.clone())
    }
}

fn default_cooldown_hours() -> u64 {
    24
}

fn default_auto_close_minutes() -> u64 {
    15
}

fn default_verification_timeout_secs() -> u64 {
    300
}

fn default_min_membership_hours() -> u64 {
    24
}

fn default_countdown_interval_secs() -> u64 {
    60
}

fn default_subscribe_url() -> String {
    "https://youtube.com/@rashtech".to_string()
}

fn default_brand_name() -> String {
    "RASH TECH".to_string()
}

/// Read-only mapping from lowercased app name to its download link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppCatalog {
    links: BTreeMap<String, String>,
}

impl AppCatalog {
    /// Builds a catalog, folding every name to trimmed lowercase.
    pub fn new(apps: BTreeMap<String, String>) -> Self {
        let links = apps
            .into_iter()
            .map(|(name, link)| (name.trim().to_lowercase(), link))
            .collect();
        Self { links }
    }

    /// Looks up an already folded app name.
    pub fn link(&self, app: &str) -> Option<&str> {
        self.links.get(app).map(String::as_str)
    }

    pub fn contains(&self, app: &str) -> bool {
        self.links.contains_key(app)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.links.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}
