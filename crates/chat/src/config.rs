//! Configuration loading for the unread tracker
//!
//! Settings are resolved in order of priority:
//! 1. Runtime environment variables
//! 2. JSON file (~/.config/cosmos/chat.json)
//! 3. Built-in defaults

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings filename in the Cosmos config directory
const CONFIG_FILE: &str = "chat.json";

/// Environment variable overriding the signed-in user
pub const ENV_CURRENT_USER: &str = "COSMOS_CHAT_USER";

/// Environment variable overriding the notification recency window
pub const ENV_NOTIFICATION_WINDOW: &str = "COSMOS_CHAT_NOTIFICATION_WINDOW_SECS";

/// Default recency window for local notifications, in seconds
pub const DEFAULT_NOTIFICATION_WINDOW_SECS: u64 = 10;

/// Settings for an unread tracker session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Email of the signed-in user; their own messages are implicitly read
    pub current_user: String,
    /// Only messages authored within this many seconds raise a notification
    pub notification_window_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            current_user: String::new(),
            notification_window_secs: DEFAULT_NOTIFICATION_WINDOW_SECS,
        }
    }
}

impl TrackerConfig {
    /// Create a config for `current_user` with default settings
    pub fn new(current_user: impl Into<String>) -> Self {
        Self {
            current_user: current_user.into(),
            ..Self::default()
        }
    }

    pub fn with_notification_window(mut self, secs: u64) -> Self {
        self.notification_window_secs = secs;
        self
    }

    /// Load settings from the default config file (if present), then apply
    /// environment overrides
    pub fn load() -> Result<Self> {
        let config = match Self::default_config_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.with_env_overrides()
    }

    /// Load settings from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse settings from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse chat config JSON")
    }

    /// Apply `COSMOS_CHAT_*` environment variables on top of these settings
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(
            std::env::var(ENV_CURRENT_USER).ok(),
            std::env::var(ENV_NOTIFICATION_WINDOW).ok(),
        )
    }

    fn with_overrides(mut self, user: Option<String>, window: Option<String>) -> Result<Self> {
        if let Some(user) = user.filter(|u| !u.is_empty()) {
            self.current_user = user;
        }
        if let Some(window) = window {
            self.notification_window_secs = window
                .trim()
                .parse()
                .with_context(|| format!("{} must be a whole number of seconds", ENV_NOTIFICATION_WINDOW))?;
        }
        Ok(self)
    }

    /// Get the default config file path (~/.config/cosmos/chat.json)
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("cosmos").join(CONFIG_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_json_uses_defaults() {
        let config = TrackerConfig::from_json(r#"{ "current_user": "user_a@test.com" }"#).unwrap();
        assert_eq!(config.current_user, "user_a@test.com");
        assert_eq!(config.notification_window_secs, DEFAULT_NOTIFICATION_WINDOW_SECS);
    }

    #[test]
    fn test_invalid_json() {
        assert!(TrackerConfig::from_json(r#"{ "notification_window_secs": "soon" }"#).is_err());
    }

    #[test]
    fn test_overrides_win_over_file_values() {
        let config = TrackerConfig::new("user_a@test.com")
            .with_overrides(Some("user_b@test.com".to_string()), Some(" 30 ".to_string()))
            .unwrap();
        assert_eq!(config.current_user, "user_b@test.com");
        assert_eq!(config.notification_window_secs, 30);
    }

    #[test]
    fn test_empty_user_override_is_ignored() {
        let config = TrackerConfig::new("user_a@test.com")
            .with_overrides(Some(String::new()), None)
            .unwrap();
        assert_eq!(config.current_user, "user_a@test.com");
    }

    #[test]
    fn test_bad_window_override() {
        let result = TrackerConfig::default().with_overrides(None, Some("ten".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_default_config_path() {
        if let Some(path) = TrackerConfig::default_config_path() {
            assert!(path.ends_with("cosmos/chat.json"));
        }
    }
}
