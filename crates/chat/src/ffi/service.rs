//! ChatService facade for UniFFI export
//!
//! Wraps an [`UnreadTracker`] backed by SQLite, plus the single conversation
//! screen a phone can have open at a time.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::TrackerConfig;
use crate::ffi::types::*;
use crate::models::{Conversation, ConversationId, Message};
use crate::notify::NotificationSink;
use crate::query;
use crate::storage::SqliteChatStore;
use crate::tracker::UnreadTracker;
use crate::view::ConversationView;

/// Forwards tracker notifications to the host's callback
struct CallbackNotificationSink {
    callback: Box<dyn NotificationCallback>,
    current_user: String,
}

impl NotificationSink for CallbackNotificationSink {
    fn show_comment_notification(&self, conversation: &Conversation, message: &Message) {
        self.callback.on_comment_notification(
            conversation.display_name(&self.current_user),
            FfiMessage::from(message.clone()),
        );
    }
}

/// Main service object for unread tracking
///
/// The host app feeds it conversation records and messages from its sync
/// layer, forwards screen and lifecycle events, and reads back sidebar rows
/// and marker positions.
#[derive(uniffi::Object)]
pub struct ChatService {
    tracker: Arc<UnreadTracker>,
    view: Mutex<Option<ConversationView>>,
}

#[uniffi::export]
impl ChatService {
    /// Open (or create) the tracker database
    ///
    /// # Arguments
    /// * `db_path` - Path to the SQLite database file
    /// * `current_user` - Email of the signed-in user
    /// * `notification_window_secs` - Max age of a message that still triggers a notification
    /// * `notifications` - Receives "new comment" notifications
    #[uniffi::constructor]
    pub fn new(
        db_path: String,
        current_user: String,
        notification_window_secs: u64,
        notifications: Box<dyn NotificationCallback>,
    ) -> Result<Arc<Self>, ChatError> {
        if let Some(parent) = PathBuf::from(&db_path).parent() {
            std::fs::create_dir_all(parent).map_err(|e| ChatError::Storage {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let store = SqliteChatStore::new(&db_path).map_err(|e| ChatError::Storage {
            message: format!("Failed to open database: {:#}", e),
        })?;

        let config =
            TrackerConfig::new(current_user.clone()).with_notification_window(notification_window_secs);
        let sink = CallbackNotificationSink {
            callback: notifications,
            current_user,
        };
        let tracker = UnreadTracker::open(config, Arc::new(store), Arc::new(sink))?;

        Ok(Arc::new(Self {
            tracker: Arc::new(tracker),
            view: Mutex::new(None),
        }))
    }

    // ========================================================================
    // Sync Input
    // ========================================================================

    /// Merge a conversation record from the server
    pub fn upsert_conversation(&self, conversation: FfiConversation) -> Result<(), ChatError> {
        self.tracker
            .upsert_conversation(conversation.into_conversation()?)?;
        Ok(())
    }

    /// Record a message delivered by the server
    pub fn record_incoming_message(
        &self,
        conversation_id: String,
        message: FfiIncomingMessage,
    ) -> Result<FfiMessage, ChatError> {
        let message = self
            .tracker
            .record_incoming_message(&ConversationId::new(conversation_id), message.into_incoming()?)?;
        Ok(message.into())
    }

    // ========================================================================
    // Read State
    // ========================================================================

    /// Mark every message in the conversation read
    pub fn mark_conversation_read(&self, conversation_id: String) -> Result<(), ChatError> {
        self.tracker
            .mark_conversation_read(&ConversationId::new(conversation_id))?;
        Ok(())
    }

    /// Mark a message and everything after it unread
    pub fn mark_message_unread(
        &self,
        conversation_id: String,
        sequence_number: u64,
    ) -> Result<(), ChatError> {
        let id = ConversationId::new(conversation_id);
        let mut view = self.view();
        match view.as_mut() {
            Some(open) if open.conversation_id() == &id => {
                open.mark_message_unread(sequence_number)?
            }
            _ => {
                self.tracker.mark_message_unread(&id, sequence_number)?;
            }
        }
        Ok(())
    }

    /// First unread sequence number, if the conversation has unread messages
    pub fn get_unread_boundary(&self, conversation_id: String) -> Option<u64> {
        self.tracker
            .get_unread_boundary(&ConversationId::new(conversation_id))
    }

    pub fn is_unread(&self, conversation_id: String) -> bool {
        self.tracker.is_unread(&ConversationId::new(conversation_id))
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Sidebar rows, newest first
    pub fn list_conversations(&self) -> Vec<FfiConversationSummary> {
        query::list_conversations(&self.tracker)
            .into_iter()
            .map(FfiConversationSummary::from)
            .collect()
    }

    pub fn unread_conversation_count(&self) -> u64 {
        query::unread_conversation_count(&self.tracker) as u64
    }

    /// Messages of a conversation ordered by sequence number
    pub fn list_messages(&self, conversation_id: String) -> Result<Vec<FfiMessage>, ChatError> {
        let id = ConversationId::new(conversation_id);
        if !self.tracker.contains(&id) {
            return Err(ChatError::UnknownConversation {
                conversation_id: id.0,
            });
        }
        Ok(self
            .tracker
            .messages(&id)
            .into_iter()
            .map(FfiMessage::from)
            .collect())
    }

    // ========================================================================
    // Conversation Screen
    // ========================================================================

    /// Show a conversation, replacing any open one
    ///
    /// Returns the sequence number the "new messages" line sits above.
    pub fn open_conversation(&self, conversation_id: String) -> Result<Option<u64>, ChatError> {
        let mut view = self.view();
        if let Some(previous) = view.take() {
            previous.close();
        }

        let opened = ConversationView::open(
            Arc::clone(&self.tracker),
            ConversationId::new(conversation_id),
        )?;
        let marker = opened.marker();
        *view = Some(opened);
        Ok(marker)
    }

    /// Navigate away from the open conversation
    pub fn close_conversation(&self) {
        if let Some(open) = self.view().take() {
            open.close();
        }
    }

    /// Report how far the open message list is scrolled from its newest entry
    pub fn on_scroll(&self, offset_from_newest: f64) -> Result<(), ChatError> {
        let mut view = self.view();
        let open = view.as_mut().ok_or(ChatError::NoOpenConversation)?;
        open.on_scroll(offset_from_newest)?;
        Ok(())
    }

    /// Send a comment in the open conversation as the current user
    pub fn add_comment(&self, text: String) -> Result<FfiMessage, ChatError> {
        let mut view = self.view();
        let open = view.as_mut().ok_or(ChatError::NoOpenConversation)?;
        Ok(open.add_comment(text)?.into())
    }

    /// Current position of the "new messages" line in the open conversation
    pub fn new_messages_marker(&self) -> Option<u64> {
        self.view().as_ref().and_then(ConversationView::marker)
    }

    pub fn new_messages_badge_visible(&self) -> bool {
        self.view()
            .as_ref()
            .is_some_and(ConversationView::new_messages_badge_visible)
    }

    /// The app returned to the foreground
    pub fn on_app_foregrounded(&self) -> Result<(), ChatError> {
        match self.view().as_mut() {
            Some(open) => open.on_app_foregrounded()?,
            None => {
                self.tracker.on_app_foregrounded();
            }
        }
        Ok(())
    }
}

impl ChatService {
    fn view(&self) -> MutexGuard<'_, Option<ConversationView>> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct CountingCallback(Arc<AtomicUsize>);

    impl NotificationCallback for CountingCallback {
        fn on_comment_notification(&self, _display_name: String, _message: FfiMessage) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn service(dir: &TempDir, count: Arc<AtomicUsize>) -> Arc<ChatService> {
        let db_path = dir.path().join("nested").join("chat.db");
        ChatService::new(
            db_path.to_string_lossy().into_owned(),
            "user_a@test.com".to_string(),
            10,
            Box::new(CountingCallback(count)),
        )
        .unwrap()
    }

    fn record(id: &str, max: u64, last_read: u64) -> FfiConversation {
        FfiConversation {
            id: id.to_string(),
            name: "Chat Report".to_string(),
            participants: vec![FfiParticipant {
                display_name: Some("B User".to_string()),
                email: "user_b@test.com".to_string(),
            }],
            last_message_at: chrono::Utc::now().timestamp(),
            last_message_text: "Test".to_string(),
            max_sequence_number: max,
            last_read_sequence_number: last_read,
        }
    }

    fn comment_now() -> FfiIncomingMessage {
        FfiIncomingMessage {
            sequence_number: None,
            author: "user_b@test.com".to_string(),
            is_created_event: false,
            text: "Hello".to_string(),
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    #[test]
    fn test_open_conversation_reports_marker() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, Arc::new(AtomicUsize::new(0)));
        service.upsert_conversation(record("1", 9, 1)).unwrap();

        assert_eq!(service.unread_conversation_count(), 1);
        assert_eq!(service.open_conversation("1".to_string()).unwrap(), Some(2));
        assert!(!service.is_unread("1".to_string()));
        assert_eq!(service.new_messages_marker(), Some(2));

        service.on_scroll(300.0).unwrap();
        assert!(service.new_messages_badge_visible());
    }

    #[test]
    fn test_notification_only_for_background_conversations() {
        let dir = TempDir::new().unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let service = service(&dir, Arc::clone(&count));
        service.upsert_conversation(record("1", 0, 0)).unwrap();
        service.upsert_conversation(record("2", 0, 0)).unwrap();

        service.open_conversation("1".to_string()).unwrap();
        service
            .record_incoming_message("1".to_string(), comment_now())
            .unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);

        service
            .record_incoming_message("2".to_string(), comment_now())
            .unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_screen_actions_need_open_conversation() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, Arc::new(AtomicUsize::new(0)));

        assert!(matches!(
            service.add_comment("hi".to_string()),
            Err(ChatError::NoOpenConversation)
        ));
        assert!(matches!(
            service.open_conversation("404".to_string()),
            Err(ChatError::UnknownConversation { .. })
        ));
        assert!(service.on_app_foregrounded().is_ok());
    }

    #[test]
    fn test_state_survives_restart() {
        let dir = TempDir::new().unwrap();
        {
            let service = service(&dir, Arc::new(AtomicUsize::new(0)));
            service.upsert_conversation(record("1", 9, 9)).unwrap();
            service.mark_message_unread("1".to_string(), 3).unwrap();
        }

        let service = service(&dir, Arc::new(AtomicUsize::new(0)));
        assert_eq!(service.get_unread_boundary("1".to_string()), Some(3));
    }
}
