//! Conversation query functions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Conversation, ConversationId, Message};
use crate::tracker::UnreadTracker;

/// Summary information for displaying a conversation in the sidebar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Conversation ID
    pub id: ConversationId,
    /// Names of the other participants
    pub display_name: String,
    /// Preview of the most recent message
    pub last_message_text: String,
    /// Timestamp of the most recent message
    pub last_message_at: DateTime<Utc>,
    /// Whether the row is rendered bold
    pub is_unread: bool,
    /// First unread sequence number, if any
    pub unread_boundary: Option<u64>,
    /// Messages past the read position
    pub unread_count: u64,
}

impl ConversationSummary {
    fn from_conversation(conversation: Conversation, current_user: &str) -> Self {
        Self {
            display_name: conversation.display_name(current_user),
            is_unread: conversation.marker.is_unread(),
            unread_boundary: conversation.marker.unread_boundary(),
            unread_count: conversation.marker.unread_count(),
            id: conversation.id,
            last_message_text: conversation.last_message_text,
            last_message_at: conversation.last_message_at,
        }
    }
}

/// Detailed conversation information including all messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationDetail {
    /// The conversation record
    pub conversation: Conversation,
    /// All known messages, ordered by sequence number
    pub messages: Vec<Message>,
    /// Sequence number above which the "new messages" line goes
    pub unread_boundary: Option<u64>,
}

/// List conversations for the sidebar
///
/// Returns conversations sorted by last_message_at descending (newest first),
/// ties broken by conversation ID for a stable order.
pub fn list_conversations(tracker: &UnreadTracker) -> Vec<ConversationSummary> {
    let mut conversations = tracker.conversations();
    conversations.sort_by(|a, b| {
        b.last_message_at
            .cmp(&a.last_message_at)
            .then_with(|| a.id.cmp(&b.id))
    });

    conversations
        .into_iter()
        .map(|c| ConversationSummary::from_conversation(c, tracker.current_user()))
        .collect()
}

/// Count conversations rendered bold
pub fn unread_conversation_count(tracker: &UnreadTracker) -> usize {
    tracker
        .conversations()
        .iter()
        .filter(|c| c.marker.is_unread())
        .count()
}

/// Get a conversation with its messages and unread boundary
pub fn get_conversation_detail(
    tracker: &UnreadTracker,
    id: &ConversationId,
) -> Option<ConversationDetail> {
    let conversation = tracker.conversation(id)?;
    let messages = tracker.messages(id);

    Some(ConversationDetail {
        unread_boundary: conversation.marker.unread_boundary(),
        conversation,
        messages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerConfig;
    use crate::models::{IncomingMessage, Participant};
    use crate::notify::NoopNotificationSink;
    use crate::storage::InMemoryChatStore;
    use chrono::Duration;
    use std::sync::Arc;

    fn tracker() -> UnreadTracker {
        UnreadTracker::new(
            TrackerConfig::new("user_a@test.com"),
            Arc::new(InMemoryChatStore::new()),
            Arc::new(NoopNotificationSink),
        )
    }

    fn seed(tracker: &UnreadTracker, id: &str, who: &str, age_minutes: i64, max: u64, last_read: u64) {
        let conversation = Conversation::new(
            ConversationId::new(id),
            "Chat Report",
            Utc::now() - Duration::minutes(age_minutes),
        )
        .with_participants(vec![
            Participant::with_name("A User", "user_a@test.com"),
            Participant::parse(who),
        ])
        .with_marker(max, last_read);
        tracker.upsert_conversation(conversation).unwrap();
    }

    #[test]
    fn test_exactly_one_bold_entry() {
        let tracker = tracker();
        seed(&tracker, "1", "B User <user_b@test.com>", 10, 9, 1);
        seed(&tracker, "2", "user_c@test.com", 20, 4, 4);

        let rows = list_conversations(&tracker);
        let bold: Vec<_> = rows.iter().filter(|r| r.is_unread).collect();

        assert_eq!(rows.len(), 2);
        assert_eq!(bold.len(), 1);
        assert_eq!(bold[0].id.as_str(), "1");
        assert_eq!(bold[0].display_name, "B User");
        assert_eq!(bold[0].unread_boundary, Some(2));
        assert_eq!(unread_conversation_count(&tracker), 1);
    }

    #[test]
    fn test_sorted_newest_first() {
        let tracker = tracker();
        seed(&tracker, "old", "user_b@test.com", 10, 0, 0);
        seed(&tracker, "new", "user_c@test.com", 1, 0, 0);

        let rows = list_conversations(&tracker);
        assert_eq!(rows[0].id.as_str(), "new");
        assert_eq!(rows[0].display_name, "user_c@test.com");
        assert_eq!(rows[1].id.as_str(), "old");
    }

    #[test]
    fn test_detail_includes_messages_and_boundary() {
        let tracker = tracker();
        seed(&tracker, "1", "user_b@test.com", 10, 0, 0);
        let id = ConversationId::new("1");
        for _ in 0..3 {
            let incoming = IncomingMessage::builder("user_b@test.com")
                .created_at(Utc::now() - Duration::minutes(5))
                .build();
            tracker.record_incoming_message(&id, incoming).unwrap();
        }

        let detail = get_conversation_detail(&tracker, &id).unwrap();
        assert_eq!(detail.messages.len(), 3);
        assert_eq!(detail.unread_boundary, Some(1));

        assert!(get_conversation_detail(&tracker, &ConversationId::new("404")).is_none());
    }
}
