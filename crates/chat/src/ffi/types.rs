//! FFI-friendly type wrappers for UniFFI export
//!
//! These types convert internal Rust types to FFI-compatible versions:
//! - `DateTime<Utc>` → `i64` (Unix timestamp)
//! - `ConversationId` → `String`
//! - `MessageKind` → `bool` flag

use chrono::{DateTime, Utc};

use crate::error::TrackerError;
use crate::models::{
    Conversation, ConversationId, IncomingMessage, Message, MessageKind, Participant, ReadMarker,
};
use crate::query::ConversationSummary;

// ============================================================================
// Error Types
// ============================================================================

/// FFI-friendly error type
#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum ChatError {
    #[error("Unknown conversation: {conversation_id}")]
    UnknownConversation { conversation_id: String },

    #[error("Invalid sequence number {sequence_number}: expected 1..={max_sequence_number}")]
    InvalidSequence {
        sequence_number: u64,
        max_sequence_number: u64,
    },

    #[error("Conversation {conversation_id} has no sequence numbers left")]
    SequenceExhausted { conversation_id: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("No conversation is open")]
    NoOpenConversation,
}

impl From<TrackerError> for ChatError {
    fn from(e: TrackerError) -> Self {
        match e {
            TrackerError::UnknownConversation(id) => ChatError::UnknownConversation {
                conversation_id: id.0,
            },
            TrackerError::InvalidSequence {
                sequence_number,
                max_sequence_number,
            } => ChatError::InvalidSequence {
                sequence_number,
                max_sequence_number,
            },
            TrackerError::SequenceExhausted(id) => ChatError::SequenceExhausted {
                conversation_id: id.0,
            },
            TrackerError::Storage(e) => ChatError::Storage {
                message: format!("{:#}", e),
            },
        }
    }
}

impl From<anyhow::Error> for ChatError {
    fn from(e: anyhow::Error) -> Self {
        ChatError::Storage {
            message: format!("{:#}", e),
        }
    }
}

fn timestamp(secs: i64, field: &str) -> Result<DateTime<Utc>, ChatError> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| ChatError::InvalidArgument {
        message: format!("{} out of range: {}", field, secs),
    })
}

// ============================================================================
// Conversation Types
// ============================================================================

/// FFI-friendly participant
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiParticipant {
    pub display_name: Option<String>,
    pub email: String,
}

impl From<FfiParticipant> for Participant {
    fn from(p: FfiParticipant) -> Self {
        Participant {
            display_name: p.display_name,
            email: p.email,
        }
    }
}

/// Conversation record as delivered by the app's sync layer
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiConversation {
    pub id: String,
    pub name: String,
    pub participants: Vec<FfiParticipant>,
    /// Unix timestamp (seconds since epoch)
    pub last_message_at: i64,
    pub last_message_text: String,
    pub max_sequence_number: u64,
    pub last_read_sequence_number: u64,
}

impl FfiConversation {
    pub(crate) fn into_conversation(self) -> Result<Conversation, ChatError> {
        Ok(Conversation {
            id: ConversationId::new(self.id),
            name: self.name,
            participants: self.participants.into_iter().map(Participant::from).collect(),
            last_message_at: timestamp(self.last_message_at, "last_message_at")?,
            last_message_text: self.last_message_text,
            marker: ReadMarker::new(self.max_sequence_number, self.last_read_sequence_number),
        })
    }
}

/// FFI-friendly sidebar row
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiConversationSummary {
    pub id: String,
    pub display_name: String,
    pub last_message_text: String,
    /// Unix timestamp (seconds since epoch)
    pub last_message_at: i64,
    pub is_unread: bool,
    pub unread_boundary: Option<u64>,
    pub unread_count: u64,
}

impl From<ConversationSummary> for FfiConversationSummary {
    fn from(s: ConversationSummary) -> Self {
        Self {
            id: s.id.0,
            display_name: s.display_name,
            last_message_text: s.last_message_text,
            last_message_at: s.last_message_at.timestamp(),
            is_unread: s.is_unread,
            unread_boundary: s.unread_boundary,
            unread_count: s.unread_count,
        }
    }
}

// ============================================================================
// Message Types
// ============================================================================

/// FFI-friendly message representation
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMessage {
    pub conversation_id: String,
    pub sequence_number: u64,
    pub author: String,
    pub is_created_event: bool,
    pub text: String,
    /// Unix timestamp (seconds since epoch)
    pub created_at: i64,
}

impl From<Message> for FfiMessage {
    fn from(m: Message) -> Self {
        Self {
            conversation_id: m.conversation_id.0,
            sequence_number: m.sequence_number,
            author: m.author,
            is_created_event: m.kind == MessageKind::Created,
            text: m.text,
            created_at: m.created_at.timestamp(),
        }
    }
}

/// Message delivered by the app's sync layer
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiIncomingMessage {
    /// Leave empty to let the tracker assign the next sequence number
    pub sequence_number: Option<u64>,
    pub author: String,
    pub is_created_event: bool,
    pub text: String,
    /// Unix timestamp (seconds since epoch)
    pub created_at: i64,
}

impl FfiIncomingMessage {
    pub(crate) fn into_incoming(self) -> Result<IncomingMessage, ChatError> {
        Ok(IncomingMessage {
            sequence_number: self.sequence_number,
            author: self.author,
            kind: if self.is_created_event {
                MessageKind::Created
            } else {
                MessageKind::Comment
            },
            text: self.text,
            created_at: timestamp(self.created_at, "created_at")?,
        })
    }
}

// ============================================================================
// Notification Callback
// ============================================================================

/// Callback interface for local "new comment" notifications
///
/// Swift/Kotlin should display a platform notification.
#[uniffi::export(callback_interface)]
pub trait NotificationCallback: Send + Sync {
    /// Called when a recent comment arrives in a conversation that is not on screen
    fn on_comment_notification(&self, display_name: String, message: FfiMessage);
}

// ============================================================================
// Log Callback
// ============================================================================

/// Log level for FFI callback
#[derive(Debug, Clone, Copy, uniffi::Enum)]
pub enum FfiLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<log::Level> for FfiLogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => FfiLogLevel::Error,
            log::Level::Warn => FfiLogLevel::Warn,
            log::Level::Info => FfiLogLevel::Info,
            log::Level::Debug => FfiLogLevel::Debug,
            log::Level::Trace => FfiLogLevel::Trace,
        }
    }
}

impl From<FfiLogLevel> for log::Level {
    fn from(level: FfiLogLevel) -> Self {
        match level {
            FfiLogLevel::Error => log::Level::Error,
            FfiLogLevel::Warn => log::Level::Warn,
            FfiLogLevel::Info => log::Level::Info,
            FfiLogLevel::Debug => log::Level::Debug,
            FfiLogLevel::Trace => log::Level::Trace,
        }
    }
}

/// Callback interface for receiving log messages from Rust
#[uniffi::export(callback_interface)]
pub trait LogCallback: Send + Sync {
    /// Called when a log message is emitted
    ///
    /// # Arguments
    /// * `level` - The log level (error, warn, info, debug, trace)
    /// * `target` - The logging target (typically module path, e.g., "chat::tracker")
    /// * `message` - The log message
    fn on_log(&self, level: FfiLogLevel, target: String, message: String);
}
