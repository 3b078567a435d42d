//! In-memory storage implementation
//!
//! Used for tests and for sessions that do not need to persist read state.

use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use super::ChatStore;
use crate::models::{Conversation, ConversationId, Message, ReadMarker};

/// In-memory implementation of ChatStore
///
/// Uses HashMaps protected by RwLocks for thread-safe access.
pub struct InMemoryChatStore {
    conversations: RwLock<HashMap<ConversationId, Conversation>>,
    /// Messages per conversation, keyed by sequence number
    messages: RwLock<HashMap<ConversationId, BTreeMap<u64, Message>>>,
}

impl InMemoryChatStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
            messages: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryChatStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow::anyhow!("in-memory store lock poisoned")
}

impl ChatStore for InMemoryChatStore {
    fn upsert_conversation(&self, conversation: &Conversation) -> Result<()> {
        let mut conversations = self.conversations.write().map_err(poisoned)?;
        conversations.insert(conversation.id.clone(), conversation.clone());
        Ok(())
    }

    fn upsert_message(&self, message: &Message) -> Result<()> {
        let mut messages = self.messages.write().map_err(poisoned)?;
        messages
            .entry(message.conversation_id.clone())
            .or_default()
            .insert(message.sequence_number, message.clone());
        Ok(())
    }

    fn record_message(&self, message: &Message, conversation: &Conversation) -> Result<()> {
        // Lock order: conversations, then messages
        let mut conversations = self.conversations.write().map_err(poisoned)?;
        let mut messages = self.messages.write().map_err(poisoned)?;

        messages
            .entry(message.conversation_id.clone())
            .or_default()
            .insert(message.sequence_number, message.clone());
        conversations.insert(conversation.id.clone(), conversation.clone());
        Ok(())
    }

    fn save_read_marker(&self, id: &ConversationId, marker: ReadMarker) -> Result<()> {
        let mut conversations = self.conversations.write().map_err(poisoned)?;
        let conversation = conversations
            .get_mut(id)
            .with_context(|| format!("No stored conversation {}", id))?;
        conversation.marker = marker;
        Ok(())
    }

    fn get_conversation(&self, id: &ConversationId) -> Result<Option<Conversation>> {
        let conversations = self.conversations.read().map_err(poisoned)?;
        Ok(conversations.get(id).cloned())
    }

    fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let conversations = self.conversations.read().map_err(poisoned)?;
        let mut list: Vec<_> = conversations.values().cloned().collect();

        // Sort by last_message_at descending
        list.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));

        Ok(list)
    }

    fn list_messages(&self, id: &ConversationId) -> Result<Vec<Message>> {
        let messages = self.messages.read().map_err(poisoned)?;
        Ok(messages
            .get(id)
            .map(|by_seq| by_seq.values().cloned().collect())
            .unwrap_or_default())
    }

    fn count_conversations(&self) -> Result<usize> {
        let conversations = self.conversations.read().map_err(poisoned)?;
        Ok(conversations.len())
    }

    fn clear(&self) -> Result<()> {
        self.conversations.write().map_err(poisoned)?.clear();
        self.messages.write().map_err(poisoned)?.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IncomingMessage;
    use chrono::{Duration, Utc};

    fn make_conversation(id: &str, age_minutes: i64) -> Conversation {
        Conversation::new(
            ConversationId::new(id),
            "Chat Report",
            Utc::now() - Duration::minutes(age_minutes),
        )
        .with_marker(9, 1)
    }

    fn make_message(conversation_id: &str, seq: u64) -> Message {
        IncomingMessage::builder("user_b@test.com")
            .text(format!("Comment {}", seq))
            .build()
            .into_message(ConversationId::new(conversation_id), seq)
    }

    #[test]
    fn test_upsert_and_get_conversation() {
        let store = InMemoryChatStore::new();
        store.upsert_conversation(&make_conversation("1", 10)).unwrap();

        let retrieved = store.get_conversation(&ConversationId::new("1")).unwrap();
        assert_eq!(retrieved.unwrap().marker.unread_boundary(), Some(2));
    }

    #[test]
    fn test_list_conversations_newest_first() {
        let store = InMemoryChatStore::new();
        store.upsert_conversation(&make_conversation("old", 10)).unwrap();
        store.upsert_conversation(&make_conversation("new", 0)).unwrap();

        let list = store.list_conversations().unwrap();
        assert_eq!(list[0].id.as_str(), "new");
        assert_eq!(list[1].id.as_str(), "old");
    }

    #[test]
    fn test_messages_ordered_and_replaced_by_sequence() {
        let store = InMemoryChatStore::new();
        store.upsert_message(&make_message("1", 2)).unwrap();
        store.upsert_message(&make_message("1", 1)).unwrap();
        store.upsert_message(&make_message("1", 2)).unwrap();

        let messages = store.list_messages(&ConversationId::new("1")).unwrap();
        let seqs: Vec<u64> = messages.iter().map(|m| m.sequence_number).collect();
        assert_eq!(seqs, vec![1, 2]);
    }

    #[test]
    fn test_save_read_marker_requires_conversation() {
        let store = InMemoryChatStore::new();
        let id = ConversationId::new("1");
        assert!(store.save_read_marker(&id, ReadMarker::fully_read(9)).is_err());

        store.upsert_conversation(&make_conversation("1", 10)).unwrap();
        store.save_read_marker(&id, ReadMarker::fully_read(9)).unwrap();
        assert!(!store.get_conversation(&id).unwrap().unwrap().marker.is_unread());
    }

    #[test]
    fn test_record_message_writes_both() {
        let store = InMemoryChatStore::new();
        let conversation = make_conversation("1", 10).with_marker(10, 1);
        store.record_message(&make_message("1", 10), &conversation).unwrap();

        let id = ConversationId::new("1");
        assert_eq!(store.get_conversation(&id).unwrap().unwrap().marker.max_sequence_number, 10);
        assert_eq!(store.list_messages(&id).unwrap().len(), 1);
    }

    #[test]
    fn test_clear() {
        let store = InMemoryChatStore::new();
        store.upsert_conversation(&make_conversation("1", 10)).unwrap();
        store.upsert_message(&make_message("1", 1)).unwrap();
        assert_eq!(store.count_conversations().unwrap(), 1);

        store.clear().unwrap();

        assert_eq!(store.count_conversations().unwrap(), 0);
        assert!(store.list_messages(&ConversationId::new("1")).unwrap().is_empty());
    }
}
