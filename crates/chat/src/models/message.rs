//! Message model representing a single chat action

use super::ConversationId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of chat action
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// System event recording the conversation's creation (sequence 0)
    Created,
    /// Content authored by a participant
    #[default]
    Comment,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Created => "created",
            MessageKind::Comment => "comment",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(MessageKind::Created),
            "comment" => Some(MessageKind::Comment),
            _ => None,
        }
    }
}

/// A message stored within a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Conversation this message belongs to
    pub conversation_id: ConversationId,
    /// Position in the conversation, unique and strictly increasing
    pub sequence_number: u64,
    /// Author email
    pub author: String,
    /// System event or user content
    pub kind: MessageKind,
    /// Plain text body
    pub text: String,
    /// When the author sent the message
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Whether this message was written by `user`
    pub fn is_authored_by(&self, user: &str) -> bool {
        self.author.eq_ignore_ascii_case(user)
    }
}

/// A message as delivered by the sync layer, before it is placed in a conversation
///
/// When `sequence_number` is `None` the tracker assigns the next free one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingMessage {
    #[serde(default)]
    pub sequence_number: Option<u64>,
    pub author: String,
    #[serde(default)]
    pub kind: MessageKind,
    #[serde(default)]
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl IncomingMessage {
    /// Create a new incoming message builder
    pub fn builder(author: impl Into<String>) -> IncomingMessageBuilder {
        IncomingMessageBuilder::new(author.into())
    }

    /// Place this message in a conversation at `sequence_number`
    pub fn into_message(self, conversation_id: ConversationId, sequence_number: u64) -> Message {
        Message {
            conversation_id,
            sequence_number,
            author: self.author,
            kind: self.kind,
            text: self.text,
            created_at: self.created_at,
        }
    }
}

/// Builder for creating IncomingMessage instances
pub struct IncomingMessageBuilder {
    author: String,
    sequence_number: Option<u64>,
    kind: MessageKind,
    text: String,
    created_at: Option<DateTime<Utc>>,
}

impl IncomingMessageBuilder {
    fn new(author: String) -> Self {
        Self {
            author,
            sequence_number: None,
            kind: MessageKind::Comment,
            text: String::new(),
            created_at: None,
        }
    }

    pub fn sequence_number(mut self, sequence_number: u64) -> Self {
        self.sequence_number = Some(sequence_number);
        self
    }

    pub fn kind(mut self, kind: MessageKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn build(self) -> IncomingMessage {
        IncomingMessage {
            sequence_number: self.sequence_number,
            author: self.author,
            kind: self.kind,
            text: self.text,
            created_at: self.created_at.unwrap_or_else(Utc::now),
        }
    }
}
