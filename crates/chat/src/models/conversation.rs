//! Conversation model and its read marker

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a conversation (chat report ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ConversationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A conversation participant with an optional display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Display name (e.g., "B User")
    #[serde(default)]
    pub display_name: Option<String>,
    /// Login email (e.g., "user_b@test.com")
    pub email: String,
}

impl Participant {
    /// Create a participant known only by email
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            display_name: None,
            email: email.into(),
        }
    }

    /// Create a participant with a display name
    pub fn with_name(display_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            display_name: Some(display_name.into()),
            email: email.into(),
        }
    }

    /// Parse a participant from a string like "B User <user_b@test.com>"
    pub fn parse(s: &str) -> Self {
        let s = s.trim();

        if let Some(angle_start) = s.rfind('<')
            && let Some(angle_end) = s.rfind('>')
            && angle_start < angle_end
        {
            let name = s[..angle_start].trim();
            let email = s[angle_start + 1..angle_end].trim();
            return Self {
                display_name: (!name.is_empty()).then(|| name.to_string()),
                email: email.to_string(),
            };
        }

        Self::new(s)
    }

    /// Name shown in listings, falling back to the email
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.email)
    }
}

/// Read position of the current user within a conversation
///
/// Always satisfies `last_read_sequence_number <= max_sequence_number`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadMarker {
    /// Highest known message sequence number
    pub max_sequence_number: u64,
    /// Highest sequence number the current user has acknowledged
    pub last_read_sequence_number: u64,
}

impl ReadMarker {
    /// Build a marker, clamping the read position to the high-water mark
    pub fn new(max_sequence_number: u64, last_read_sequence_number: u64) -> Self {
        Self {
            max_sequence_number,
            last_read_sequence_number: last_read_sequence_number.min(max_sequence_number),
        }
    }

    /// Marker for a conversation whose every message has been read
    pub fn fully_read(max_sequence_number: u64) -> Self {
        Self::new(max_sequence_number, max_sequence_number)
    }

    /// Sequence number of the first unacknowledged message, if any
    pub fn unread_boundary(&self) -> Option<u64> {
        (self.last_read_sequence_number < self.max_sequence_number)
            .then(|| self.last_read_sequence_number + 1)
    }

    pub fn is_unread(&self) -> bool {
        self.unread_boundary().is_some()
    }

    /// Raise the high-water mark, never lowering it
    pub fn observe(self, sequence_number: u64) -> Self {
        Self::new(
            self.max_sequence_number.max(sequence_number),
            self.last_read_sequence_number,
        )
    }

    pub fn read_all(self) -> Self {
        Self::fully_read(self.max_sequence_number)
    }

    /// Number of messages past the read position
    pub fn unread_count(&self) -> u64 {
        self.max_sequence_number - self.last_read_sequence_number
    }
}

/// A chat conversation between two or more participants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Conversation ID
    pub id: ConversationId,
    /// Conversation name (e.g., "Chat Report")
    #[serde(default)]
    pub name: String,
    /// Everyone taking part, the current user possibly included
    #[serde(default)]
    pub participants: Vec<Participant>,
    /// Timestamp of the most recent message
    pub last_message_at: DateTime<Utc>,
    /// Preview text of the most recent message
    #[serde(default)]
    pub last_message_text: String,
    /// Read position of the current user
    #[serde(flatten)]
    pub marker: ReadMarker,
}

impl Conversation {
    /// Create an empty, fully read conversation
    pub fn new(id: ConversationId, name: impl Into<String>, last_message_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.into(),
            participants: Vec::new(),
            last_message_at,
            last_message_text: String::new(),
            marker: ReadMarker::default(),
        }
    }

    pub fn with_participants(mut self, participants: Vec<Participant>) -> Self {
        self.participants = participants;
        self
    }

    pub fn with_last_message_text(mut self, text: impl Into<String>) -> Self {
        self.last_message_text = text.into();
        self
    }

    pub fn with_marker(mut self, max_sequence_number: u64, last_read_sequence_number: u64) -> Self {
        self.marker = ReadMarker::new(max_sequence_number, last_read_sequence_number);
        self
    }

    /// Merge a newer record of the same conversation into this one
    ///
    /// The high-water mark never decreases; the incoming read position wins
    /// but is clamped to the merged high-water mark.
    pub fn merge(&mut self, incoming: Conversation) {
        let max = self
            .marker
            .max_sequence_number
            .max(incoming.marker.max_sequence_number);
        self.marker = ReadMarker::new(max, incoming.marker.last_read_sequence_number);
        self.name = incoming.name;
        self.participants = incoming.participants;
        if incoming.last_message_at >= self.last_message_at {
            self.last_message_at = incoming.last_message_at;
            self.last_message_text = incoming.last_message_text;
        }
    }

    /// Participant names shown in the sidebar, excluding the current user
    pub fn display_name(&self, current_user: &str) -> String {
        let names: Vec<&str> = self
            .participants
            .iter()
            .filter(|p| !p.email.eq_ignore_ascii_case(current_user))
            .map(Participant::label)
            .collect();

        if names.is_empty() {
            self.name.clone()
        } else {
            names.join(", ")
        }
    }
}
