//! State of an open conversation screen
//!
//! The inline "new messages" line is a snapshot: it is captured when the
//! conversation is opened and stays put while the user reads, even though
//! opening the conversation marks it read. It only moves on explicit
//! gestures (mark as unread, own comment) or when the app is foregrounded.

use std::sync::Arc;

use log::debug;

use crate::error::{TrackerError, TrackerResult};
use crate::models::{ConversationId, Message};
use crate::tracker::UnreadTracker;

/// An open message list for one conversation
pub struct ConversationView {
    tracker: Arc<UnreadTracker>,
    id: ConversationId,
    /// Sequence number the inline marker sits above
    marker: Option<u64>,
    /// Distance scrolled away from the newest message, in points
    scroll_offset: f64,
}

impl ConversationView {
    /// Open a conversation's message list
    ///
    /// Captures the unread boundary for the inline marker, then marks the
    /// conversation read since a freshly opened list shows its newest entry.
    pub fn open(tracker: Arc<UnreadTracker>, id: ConversationId) -> TrackerResult<Self> {
        if !tracker.contains(&id) {
            return Err(TrackerError::UnknownConversation(id));
        }

        tracker.set_active_conversation(Some(id.clone()));
        let marker = tracker.get_unread_boundary(&id);
        tracker.mark_conversation_read(&id)?;

        debug!("Opened conversation {} (marker {:?})", id, marker);
        Ok(Self {
            tracker,
            id,
            marker,
            scroll_offset: 0.0,
        })
    }

    pub fn conversation_id(&self) -> &ConversationId {
        &self.id
    }

    /// Sequence number above which the "new messages" line is drawn
    pub fn marker(&self) -> Option<u64> {
        self.marker
    }

    pub fn is_at_newest(&self) -> bool {
        self.scroll_offset <= 0.0
    }

    /// Whether the "scroll to newest messages" badge is shown
    pub fn new_messages_badge_visible(&self) -> bool {
        self.marker.is_some() && !self.is_at_newest()
    }

    /// Viewport moved; `offset_from_newest` is 0 when the newest message is visible
    ///
    /// Reaching the newest message counts as reading the conversation to completion.
    pub fn on_scroll(&mut self, offset_from_newest: f64) -> TrackerResult<()> {
        self.scroll_offset = offset_from_newest.max(0.0);
        if self.is_at_newest() {
            self.tracker.mark_conversation_read(&self.id)?;
        }
        Ok(())
    }

    /// Mark `sequence_number` and everything after it unread
    pub fn mark_message_unread(&mut self, sequence_number: u64) -> TrackerResult<()> {
        self.tracker.mark_message_unread(&self.id, sequence_number)?;
        self.marker = self.tracker.get_unread_boundary(&self.id);
        Ok(())
    }

    /// Send a comment as the current user; this clears the marker
    pub fn add_comment(&mut self, text: impl Into<String>) -> TrackerResult<Message> {
        let message = self.tracker.add_comment(&self.id, text)?;
        self.marker = self.tracker.get_unread_boundary(&self.id);
        Ok(message)
    }

    /// App returned to the foreground while this view exists
    ///
    /// If this view is on screen at its newest message, the conversation is
    /// marked read before the marker is re-evaluated from stored state.
    pub fn on_app_foregrounded(&mut self) -> TrackerResult<()> {
        let active = self.tracker.on_app_foregrounded();
        if active.as_ref() == Some(&self.id) && self.is_at_newest() {
            self.tracker.mark_conversation_read(&self.id)?;
        }
        self.marker = self.tracker.get_unread_boundary(&self.id);
        Ok(())
    }

    /// Navigate away from the conversation
    pub fn close(self) {
        if self.tracker.active_conversation().as_ref() == Some(&self.id) {
            self.tracker.set_active_conversation(None);
        }
        debug!("Closed conversation {}", self.id);
    }
}
