//! Local notification hook for newly arrived messages
//!
//! The tracker only decides *whether* a message deserves a notification;
//! displaying it is left to the platform behind [`NotificationSink`].

use chrono::{DateTime, Utc};
use log::info;

use crate::models::{Conversation, Message};

/// Receiver of "new comment" notifications
pub trait NotificationSink: Send + Sync {
    /// Surface a platform notification for `message` in `conversation`
    fn show_comment_notification(&self, conversation: &Conversation, message: &Message);
}

/// Check whether a message authored at `created_at` is recent enough to notify about.
///
/// # Arguments
/// * `created_at` - When the message was authored
/// * `window_secs` - Maximum age in seconds
///
/// # Returns
/// `true` if `created_at` lies within `window_secs` of now. The window applies
/// on both sides: a timestamp slightly in the future (clock skew between
/// devices) is recent, one far in the future is not.
pub fn is_recent(created_at: DateTime<Utc>, window_secs: u64) -> bool {
    let age = Utc::now() - created_at;
    age.num_seconds().unsigned_abs() <= window_secs
}

/// Sink that only logs, for headless sessions
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    fn show_comment_notification(&self, conversation: &Conversation, message: &Message) {
        info!(
            "New message in {} from {} (#{}): {}",
            conversation.id, message.author, message.sequence_number, message.text
        );
    }
}

/// Sink that drops every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotificationSink;

impl NotificationSink for NoopNotificationSink {
    fn show_comment_notification(&self, _conversation: &Conversation, _message: &Message) {}
}
