//! Configuration management
//!
//! settings.json format:
//! ```json
//! {
//!   "api": { "accessToken": "token_...", "baseUrl": "...", "pageSize": 500 }
//! }
//! ```
//!
//! Unknown fields are preserved across save so other tools can keep state
//! in the same file.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::adapters::teller::TELLER_BASE_URL_ENV;

/// Default transactions requested per account per sync pass
pub const DEFAULT_PAGE_SIZE: usize = 500;

/// Environment variable carrying the access token.
/// Wins over settings.json so scripts never write a token to disk.
pub const ACCESS_TOKEN_ENV: &str = "LEDGERLINE_ACCESS_TOKEN";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    api: ApiSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSettings {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    page_size: Option<usize>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Ledgerline configuration (resolved view of settings)
///
/// `access_token` and `base_url` fold environment overrides over the file;
/// the setters below are the only path into the persisted state, so an
/// env-provided token never ends up written to disk.
#[derive(Debug, Clone)]
pub struct Config {
    pub access_token: Option<String>,
    pub base_url: Option<String>,
    pub page_size: usize,
    // Keep the raw settings for preservation when saving
    _raw_settings: SettingsFile,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            access_token: None,
            base_url: None,
            page_size: DEFAULT_PAGE_SIZE,
            _raw_settings: SettingsFile::default(),
        }
    }
}

impl Config {
    /// Load config from the ledgerline directory
    pub fn load(ledgerline_dir: &Path) -> Result<Self> {
        let settings_path = ledgerline_dir.join("settings.json");

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content).unwrap_or_default()
        } else {
            SettingsFile::default()
        };

        let access_token = std::env::var(ACCESS_TOKEN_ENV)
            .ok()
            .filter(|t| !t.is_empty())
            .or_else(|| raw.api.access_token.clone());
        let base_url = std::env::var(TELLER_BASE_URL_ENV)
            .ok()
            .filter(|u| !u.is_empty())
            .or_else(|| raw.api.base_url.clone());
        let page_size = raw.api.page_size.unwrap_or(DEFAULT_PAGE_SIZE);

        Ok(Self {
            access_token,
            base_url,
            page_size,
            _raw_settings: raw,
        })
    }

    /// Save config to the ledgerline directory.
    /// Preserves settings that this tool doesn't manage.
    pub fn save(&self, ledgerline_dir: &Path) -> Result<()> {
        let settings_path = ledgerline_dir.join("settings.json");

        // Load existing settings to preserve fields we don't manage
        let mut settings = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str::<SettingsFile>(&content).unwrap_or_default()
        } else {
            SettingsFile::default()
        };

        // Update only the fields we manage, from the file-backed state;
        // env-resolved values are deliberately not written back
        settings.api.access_token = self._raw_settings.api.access_token.clone();
        settings.api.base_url = self._raw_settings.api.base_url.clone();
        settings.api.page_size = self._raw_settings.api.page_size;

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }

    /// Set the access token for persistence
    pub fn set_access_token(&mut self, token: impl Into<String>) {
        let token = token.into();
        self._raw_settings.api.access_token = Some(token.clone());
        self.access_token = Some(token);
    }

    /// Set or clear the base URL override for persistence
    pub fn set_base_url(&mut self, base_url: Option<String>) {
        self._raw_settings.api.base_url = base_url.clone();
        self.base_url = base_url;
    }

    /// Set the per-pass page size for persistence
    pub fn set_page_size(&mut self, page_size: usize) {
        self._raw_settings.api.page_size = Some(page_size);
        self.page_size = page_size;
    }
}
