//! Configuration loading for Mission Control.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Get the Mission Control home directory (~/.mission-control).
pub fn get_home_dir() -> Result<PathBuf> {
    let home = directories::UserDirs::new()
        .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

    Ok(home.home_dir().join(".mission-control"))
}

/// Get the settings file path.
pub fn get_settings_path() -> Result<PathBuf> {
    Ok(get_home_dir()?.join("settings.json"))
}

/// Load settings from ~/.mission-control/settings.json
pub fn load_settings() -> Result<Settings> {
    let path = get_settings_path()?;

    if !path.exists() {
        return Err(Error::Config(format!(
            "Settings file not found at {}",
            path.display()
        )));
    }

    load_settings_from(&path)
}

/// Read, parse and validate a settings file.
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path)?;
    let settings: Settings = serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Invalid settings in {}: {}", path.display(), e)))?;
    validate_settings(&settings)?;

    tracing::debug!("Loaded settings from {}", path.display());
    Ok(settings)
}

/// Load settings, using defaults only when no settings file exists.
///
/// A file that is present but invalid is an error rather than silently
/// replaced.
pub fn load_settings_or_default() -> Result<Settings> {
    load_settings_at_or_default(&get_settings_path()?)
}

fn load_settings_at_or_default(path: &Path) -> Result<Settings> {
    if !path.exists() {
        tracing::debug!("No settings at {}, using defaults", path.display());
        return Ok(Settings::default());
    }
    load_settings_from(path)
}

pub fn validate_settings(settings: &Settings) -> Result<()> {
    let url = settings.api.base_url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(Error::Config(format!(
            "api.base_url '{}' must start with http:// or https://",
            url
        )));
    }
    if settings.api.timeout_secs == 0 {
        return Err(Error::Config("api.timeout_secs must be greater than 0".to_string()));
    }
    if settings.listener.poll_interval_ms == 0 {
        return Err(Error::Config(
            "listener.poll_interval_ms must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

/// Task REST API configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:3000/api".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Message listener configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ListenerConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Wake immediately when the mailbox directory changes.
    #[serde(default = "default_true")]
    pub watch: bool,
    /// Mailbox location, defaults to ~/.mission-control/mailbox.
    pub mailbox_dir: Option<PathBuf>,
}

fn default_poll_interval_ms() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}

impl ListenerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn resolve_mailbox_dir(&self) -> Result<PathBuf> {
        match &self.mailbox_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(get_home_dir()?.join("mailbox")),
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            watch: default_true(),
            mailbox_dir: None,
        }
    }
}

/// Telegram notification target.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct TelegramNotifyConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<i64>,
}

/// Notification configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NotificationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Whether the desktop sink counts as permitted when no channel is set.
    #[serde(default)]
    pub log_permission_granted: bool,
    #[serde(default)]
    pub telegram: TelegramNotifyConfig,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            log_permission_granted: false,
            telegram: TelegramNotifyConfig::default(),
        }
    }
}

/// Kanban board configuration.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct BoardConfig {
    /// Demo users only get session-scoped changes.
    #[serde(default)]
    pub demo_mode: bool,
}

/// Ingest web server configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3333
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Mission Control settings.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Settings {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub listener: ListenerConfig,

    #[serde(default)]
    pub notifications: NotificationConfig,

    #[serde(default)]
    pub board: BoardConfig,

    #[serde(default)]
    pub web: WebConfig,
}
