//! Storage trait definitions

use crate::models::{Conversation, ConversationId, Message, ReadMarker};
use anyhow::Result;

/// Trait for chat storage operations
///
/// Abstracts over storage backends (in-memory, SQLite). The tracker keeps the
/// authoritative in-memory copy and writes through to a store so read state
/// survives restarts.
pub trait ChatStore: Send + Sync {
    /// Insert or update a conversation, including its read marker
    fn upsert_conversation(&self, conversation: &Conversation) -> Result<()>;

    /// Insert or replace a message at its sequence number
    fn upsert_message(&self, message: &Message) -> Result<()>;

    /// Store a message together with the conversation state it produced
    ///
    /// Both writes land or neither does, so stored messages never run past
    /// the stored high-water mark.
    fn record_message(&self, message: &Message, conversation: &Conversation) -> Result<()>;

    /// Persist only the read marker of a conversation
    fn save_read_marker(&self, id: &ConversationId, marker: ReadMarker) -> Result<()>;

    /// Get a conversation by ID
    fn get_conversation(&self, id: &ConversationId) -> Result<Option<Conversation>>;

    /// List all conversations, ordered by last_message_at descending
    fn list_conversations(&self) -> Result<Vec<Conversation>>;

    /// List messages of a conversation, ordered by sequence number ascending
    fn list_messages(&self, id: &ConversationId) -> Result<Vec<Message>>;

    /// Count stored conversations
    fn count_conversations(&self) -> Result<usize>;

    /// Clear all data (for testing and sign-out)
    fn clear(&self) -> Result<()>;
}
