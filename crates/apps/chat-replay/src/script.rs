//! Replay scripts: a list of chat events plus optional tracker settings

use std::path::Path;

use anyhow::{Context, Result};
use chat::{ChatEvent, TrackerConfig};
use serde::Deserialize;

/// A recorded session to feed through the tracker
#[derive(Debug, Deserialize)]
pub struct ReplayScript {
    /// Overrides the configured signed-in user
    #[serde(default)]
    pub current_user: Option<String>,
    /// Overrides the configured notification window
    #[serde(default)]
    pub notification_window_secs: Option<u64>,
    pub events: Vec<ChatEvent>,
}

impl ReplayScript {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to parse script: {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Layer the script's settings over `config`
    pub fn apply_settings(&self, mut config: TrackerConfig) -> TrackerConfig {
        if let Some(user) = &self.current_user {
            config.current_user = user.clone();
        }
        if let Some(secs) = self.notification_window_secs {
            config.notification_window_secs = secs;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SCRIPT: &str = r#"{
        "current_user": "user_a@test.com",
        "events": [
            {
                "type": "conversation_merged",
                "conversation": {
                    "id": "1",
                    "name": "Chat Report",
                    "last_message_at": "2024-03-01T12:00:00Z",
                    "max_sequence_number": 9,
                    "last_read_sequence_number": 1
                }
            },
            { "type": "message_marked_unread", "conversation_id": "1", "sequence_number": 3 },
            { "type": "app_foregrounded" }
        ]
    }"#;

    #[test]
    fn test_parse_script() {
        let script = ReplayScript::from_json(SCRIPT).unwrap();
        assert_eq!(script.events.len(), 3);
        assert_eq!(script.current_user.as_deref(), Some("user_a@test.com"));
        assert_eq!(script.events[2], ChatEvent::AppForegrounded);
    }

    #[test]
    fn test_settings_override_config() {
        let script = ReplayScript::from_json(SCRIPT).unwrap();
        let config = script.apply_settings(TrackerConfig::new("someone@test.com").with_notification_window(30));
        assert_eq!(config.current_user, "user_a@test.com");
        assert_eq!(config.notification_window_secs, 30);
    }

    #[test]
    fn test_from_file_reports_path() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        let err = ReplayScript::from_file(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse script"));
    }
}
