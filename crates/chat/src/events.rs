//! Inbound event channel
//!
//! Sync merges, user gestures and lifecycle signals all arrive as
//! [`ChatEvent`]s on one channel. A single [`EventLoop`] applies them to the
//! tracker in arrival order.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use anyhow::{Result, anyhow};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::TrackerResult;
use crate::models::{Conversation, ConversationId, IncomingMessage};
use crate::tracker::UnreadTracker;

/// Something that happened outside the tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A conversation record was pushed or fetched
    ConversationMerged { conversation: Conversation },
    /// A message arrived from the server
    MessageReceived {
        conversation_id: ConversationId,
        message: IncomingMessage,
    },
    /// The current user sent a comment
    CommentAdded {
        conversation_id: ConversationId,
        text: String,
    },
    /// The message list reached its newest entry
    ConversationViewed { conversation_id: ConversationId },
    /// The user marked a message as unread
    MessageMarkedUnread {
        conversation_id: ConversationId,
        sequence_number: u64,
    },
    /// Navigation changed the conversation on screen
    ActiveConversationChanged {
        #[serde(default)]
        conversation_id: Option<ConversationId>,
    },
    /// The app came back to the foreground
    AppForegrounded,
}

impl ChatEvent {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            ChatEvent::ConversationMerged { .. } => "conversation_merged",
            ChatEvent::MessageReceived { .. } => "message_received",
            ChatEvent::CommentAdded { .. } => "comment_added",
            ChatEvent::ConversationViewed { .. } => "conversation_viewed",
            ChatEvent::MessageMarkedUnread { .. } => "message_marked_unread",
            ChatEvent::ActiveConversationChanged { .. } => "active_conversation_changed",
            ChatEvent::AppForegrounded => "app_foregrounded",
        }
    }

    /// Apply this event to `tracker`
    pub fn apply(self, tracker: &UnreadTracker) -> TrackerResult<()> {
        match self {
            ChatEvent::ConversationMerged { conversation } => {
                tracker.upsert_conversation(conversation)?;
            }
            ChatEvent::MessageReceived {
                conversation_id,
                message,
            } => {
                tracker.record_incoming_message(&conversation_id, message)?;
            }
            ChatEvent::CommentAdded {
                conversation_id,
                text,
            } => {
                tracker.add_comment(&conversation_id, text)?;
            }
            ChatEvent::ConversationViewed { conversation_id } => {
                tracker.mark_conversation_read(&conversation_id)?;
            }
            ChatEvent::MessageMarkedUnread {
                conversation_id,
                sequence_number,
            } => {
                tracker.mark_message_unread(&conversation_id, sequence_number)?;
            }
            ChatEvent::ActiveConversationChanged { conversation_id } => {
                tracker.set_active_conversation(conversation_id);
            }
            ChatEvent::AppForegrounded => {
                tracker.on_app_foregrounded();
            }
        }
        Ok(())
    }
}

/// Outcome of processing a batch of events
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainStats {
    /// Events applied successfully
    pub applied: usize,
    /// Events rejected by the tracker
    pub failed: usize,
}

/// Producer half of the event channel; cheap to clone
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<ChatEvent>,
}

impl EventSender {
    pub fn send(&self, event: ChatEvent) -> Result<()> {
        self.tx
            .send(event)
            .map_err(|e| anyhow!("Event loop has shut down, dropped {}", e.0.name()))
    }
}

/// Single consumer applying events to the tracker
pub struct EventLoop {
    tracker: Arc<UnreadTracker>,
    rx: Receiver<ChatEvent>,
}

/// Create the inbound channel for `tracker`
pub fn event_channel(tracker: Arc<UnreadTracker>) -> (EventSender, EventLoop) {
    let (tx, rx) = mpsc::channel();
    (EventSender { tx }, EventLoop { tracker, rx })
}

impl EventLoop {
    pub fn tracker(&self) -> &Arc<UnreadTracker> {
        &self.tracker
    }

    fn handle(&self, event: ChatEvent, stats: &mut DrainStats) {
        let name = event.name();
        match event.apply(&self.tracker) {
            Ok(()) => {
                debug!("Applied {}", name);
                stats.applied += 1;
            }
            Err(e) => {
                warn!("Failed to apply {}: {}", name, e);
                stats.failed += 1;
            }
        }
    }

    /// Apply every event already queued, without blocking
    pub fn drain(&self) -> DrainStats {
        let mut stats = DrainStats::default();
        loop {
            match self.rx.try_recv() {
                Ok(event) => self.handle(event, &mut stats),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        stats
    }

    /// Apply events until every sender has been dropped
    pub fn run(self) -> DrainStats {
        let mut stats = DrainStats::default();
        while let Ok(event) = self.rx.recv() {
            self.handle(event, &mut stats);
        }
        debug!(
            "Event loop finished ({} applied, {} failed)",
            stats.applied, stats.failed
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerConfig;
    use crate::notify::NoopNotificationSink;
    use crate::storage::InMemoryChatStore;
    use chrono::Utc;

    fn tracker() -> Arc<UnreadTracker> {
        Arc::new(UnreadTracker::new(
            TrackerConfig::new("user_a@test.com"),
            Arc::new(InMemoryChatStore::new()),
            Arc::new(NoopNotificationSink),
        ))
    }

    fn merged(id: &str, max: u64, last_read: u64) -> ChatEvent {
        ChatEvent::ConversationMerged {
            conversation: Conversation::new(ConversationId::new(id), "Chat Report", Utc::now())
                .with_marker(max, last_read),
        }
    }

    #[test]
    fn test_drain_applies_in_order() {
        let (tx, event_loop) = event_channel(tracker());
        let id = ConversationId::new("1");

        tx.send(merged("1", 9, 1)).unwrap();
        tx.send(ChatEvent::ConversationViewed {
            conversation_id: id.clone(),
        })
        .unwrap();
        tx.send(ChatEvent::MessageMarkedUnread {
            conversation_id: id.clone(),
            sequence_number: 3,
        })
        .unwrap();

        let stats = event_loop.drain();

        assert_eq!(stats, DrainStats { applied: 3, failed: 0 });
        assert_eq!(event_loop.tracker().get_unread_boundary(&id), Some(3));
    }

    #[test]
    fn test_failures_are_counted_not_fatal() {
        let (tx, event_loop) = event_channel(tracker());

        tx.send(ChatEvent::ConversationViewed {
            conversation_id: ConversationId::new("404"),
        })
        .unwrap();
        tx.send(merged("1", 2, 2)).unwrap();

        let stats = event_loop.drain();
        assert_eq!(stats, DrainStats { applied: 1, failed: 1 });
    }

    #[test]
    fn test_run_until_senders_drop() {
        let (tx, event_loop) = event_channel(tracker());
        let tracker = Arc::clone(event_loop.tracker());

        let producer = std::thread::spawn(move || {
            tx.send(merged("1", 0, 0)).unwrap();
            tx.send(ChatEvent::CommentAdded {
                conversation_id: ConversationId::new("1"),
                text: "hi".to_string(),
            })
            .unwrap();
        });

        let stats = event_loop.run();
        producer.join().unwrap();

        assert_eq!(stats.applied, 2);
        assert_eq!(tracker.messages(&ConversationId::new("1")).len(), 1);
    }

    #[test]
    fn test_send_after_shutdown_fails() {
        let (tx, event_loop) = event_channel(tracker());
        drop(event_loop);
        assert!(tx.send(ChatEvent::AppForegrounded).is_err());
    }

    #[test]
    fn test_event_json_shape() {
        let json = r#"{"type": "message_marked_unread", "conversation_id": "1", "sequence_number": 3}"#;
        let event: ChatEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            ChatEvent::MessageMarkedUnread {
                conversation_id: ConversationId::new("1"),
                sequence_number: 3,
            }
        );

        let event: ChatEvent = serde_json::from_str(r#"{"type": "app_foregrounded"}"#).unwrap();
        assert_eq!(event, ChatEvent::AppForegrounded);
    }
}
