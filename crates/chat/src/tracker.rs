//! Unread tracker: per-conversation read state and unread boundary
//!
//! The tracker is the single owner of every conversation's read marker.
//! Each conversation sits behind its own lock so mutations are atomic
//! read-modify-write steps, while queries see a consistent
//! `(last_read, max)` pair. Conversations never lock each other.
//!
//! Mutations persist to the [`ChatStore`] before the new state is published
//! in memory, so a storage failure leaves the tracker unchanged.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Context;
use chrono::Utc;
use log::{debug, info};

use crate::config::TrackerConfig;
use crate::error::{TrackerError, TrackerResult};
use crate::models::{
    Conversation, ConversationId, IncomingMessage, Message, MessageKind, ReadMarker,
};
use crate::notify::{NotificationSink, is_recent};
use crate::storage::ChatStore;

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Everything the tracker knows about one conversation
struct ConversationState {
    conversation: Conversation,
    messages: BTreeMap<u64, Message>,
}

impl ConversationState {
    fn new(conversation: Conversation) -> Self {
        Self {
            conversation,
            messages: BTreeMap::new(),
        }
    }
}

type SharedState = Arc<RwLock<ConversationState>>;

/// Owner of per-conversation unread state
///
/// Shared with presentation layers as `Arc<UnreadTracker>`.
pub struct UnreadTracker {
    config: TrackerConfig,
    store: Arc<dyn ChatStore>,
    notifier: Arc<dyn NotificationSink>,
    conversations: RwLock<HashMap<ConversationId, SharedState>>,
    /// Conversation whose message list is on screen
    active: RwLock<Option<ConversationId>>,
}

impl UnreadTracker {
    /// Create an empty tracker
    pub fn new(
        config: TrackerConfig,
        store: Arc<dyn ChatStore>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            config,
            store,
            notifier,
            conversations: RwLock::new(HashMap::new()),
            active: RwLock::new(None),
        }
    }

    /// Create a tracker hydrated with everything persisted in `store`
    pub fn open(
        config: TrackerConfig,
        store: Arc<dyn ChatStore>,
        notifier: Arc<dyn NotificationSink>,
    ) -> anyhow::Result<Self> {
        let tracker = Self::new(config, store, notifier);

        let stored = tracker
            .store
            .list_conversations()
            .context("Failed to load conversations")?;
        let count = stored.len();

        {
            let mut map = write(&tracker.conversations);
            for conversation in stored {
                let messages = tracker
                    .store
                    .list_messages(&conversation.id)
                    .with_context(|| format!("Failed to load messages for {}", conversation.id))?;

                let mut state = ConversationState::new(conversation);
                state.messages = messages
                    .into_iter()
                    .map(|m| (m.sequence_number, m))
                    .collect();
                map.insert(state.conversation.id.clone(), Arc::new(RwLock::new(state)));
            }
        }

        info!("Loaded {} conversations into unread tracker", count);
        Ok(tracker)
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Email of the signed-in user
    pub fn current_user(&self) -> &str {
        &self.config.current_user
    }

    fn state(&self, id: &ConversationId) -> Option<SharedState> {
        read(&self.conversations).get(id).cloned()
    }

    fn require(&self, id: &ConversationId) -> TrackerResult<SharedState> {
        self.state(id)
            .ok_or_else(|| TrackerError::UnknownConversation(id.clone()))
    }

    /// Persist and publish a new read marker, skipping no-op writes
    fn commit_marker(
        &self,
        state: &mut ConversationState,
        marker: ReadMarker,
    ) -> TrackerResult<ReadMarker> {
        if state.conversation.marker != marker {
            self.store
                .save_read_marker(&state.conversation.id, marker)?;
            state.conversation.marker = marker;
        }
        Ok(marker)
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Merge a conversation record delivered by the sync layer
    ///
    /// Unknown conversations are created. For known ones the high-water mark
    /// only moves forward and the delivered read position is clamped to it.
    pub fn upsert_conversation(&self, conversation: Conversation) -> TrackerResult<ReadMarker> {
        let state = {
            let mut map = write(&self.conversations);
            match map.get(&conversation.id) {
                Some(state) => Arc::clone(state),
                None => {
                    let mut conversation = conversation;
                    conversation.marker = ReadMarker::new(
                        conversation.marker.max_sequence_number,
                        conversation.marker.last_read_sequence_number,
                    );
                    self.store.upsert_conversation(&conversation)?;

                    let marker = conversation.marker;
                    debug!(
                        "New conversation {} (boundary {:?})",
                        conversation.id,
                        marker.unread_boundary()
                    );
                    map.insert(
                        conversation.id.clone(),
                        Arc::new(RwLock::new(ConversationState::new(conversation))),
                    );
                    return Ok(marker);
                }
            }
        };

        let mut guard = write(&state);
        let mut merged = guard.conversation.clone();
        merged.merge(conversation);
        self.store.upsert_conversation(&merged)?;

        let marker = merged.marker;
        guard.conversation = merged;
        Ok(marker)
    }

    /// Append a message to a conversation
    ///
    /// Raises the high-water mark. Messages from the current user also move
    /// the read position to it; anyone else's leave it where it was, which
    /// may expose a new unread boundary. Recent comments from others in a
    /// conversation that is not on screen trigger a local notification.
    pub fn record_incoming_message(
        &self,
        id: &ConversationId,
        incoming: IncomingMessage,
    ) -> TrackerResult<Message> {
        let state = self.require(id)?;

        let (message, notify) = {
            let mut guard = write(&state);

            let sequence_number = match incoming.sequence_number {
                Some(sequence_number) => sequence_number,
                None => guard
                    .conversation
                    .marker
                    .max_sequence_number
                    .checked_add(1)
                    .ok_or_else(|| TrackerError::SequenceExhausted(id.clone()))?,
            };
            let message = incoming.into_message(id.clone(), sequence_number);
            let self_authored = message.is_authored_by(&self.config.current_user);

            let mut conversation = guard.conversation.clone();
            conversation.marker = conversation.marker.observe(sequence_number);
            if self_authored {
                conversation.marker = conversation.marker.read_all();
            }
            if message.kind == MessageKind::Comment
                && message.created_at >= conversation.last_message_at
            {
                conversation.last_message_at = message.created_at;
                conversation.last_message_text = message.text.clone();
            }

            self.store.record_message(&message, &conversation)?;

            debug!(
                "Recorded message #{} in {} from {} (boundary {:?})",
                sequence_number,
                id,
                message.author,
                conversation.marker.unread_boundary()
            );

            guard.messages.insert(sequence_number, message.clone());
            guard.conversation = conversation;

            let notify = (!self_authored && self.should_notify(&message))
                .then(|| guard.conversation.clone());
            (message, notify)
        };

        // Outside the conversation lock: the sink may query the tracker
        if let Some(conversation) = notify {
            self.notifier
                .show_comment_notification(&conversation, &message);
        }

        Ok(message)
    }

    fn should_notify(&self, message: &Message) -> bool {
        message.kind == MessageKind::Comment
            && is_recent(message.created_at, self.config.notification_window_secs)
            && read(&self.active).as_ref() != Some(&message.conversation_id)
    }

    /// Author a comment as the current user
    ///
    /// The sequence number is allocated under the conversation lock, so
    /// concurrent comments never share one.
    pub fn add_comment(&self, id: &ConversationId, text: impl Into<String>) -> TrackerResult<Message> {
        let incoming = IncomingMessage::builder(self.config.current_user.clone())
            .text(text)
            .created_at(Utc::now())
            .build();
        self.record_incoming_message(id, incoming)
    }

    /// Mark every known message of a conversation as read
    pub fn mark_conversation_read(&self, id: &ConversationId) -> TrackerResult<ReadMarker> {
        let state = self.require(id)?;
        let mut guard = write(&state);

        let marker = guard.conversation.marker.read_all();
        if guard.conversation.marker.is_unread() {
            info!("Marking conversation {} as read", id);
        }
        self.commit_marker(&mut guard, marker)
    }

    /// Move the read position so that `sequence_number` becomes the first unread message
    pub fn mark_message_unread(
        &self,
        id: &ConversationId,
        sequence_number: u64,
    ) -> TrackerResult<ReadMarker> {
        let state = self.require(id)?;
        let mut guard = write(&state);

        let max_sequence_number = guard.conversation.marker.max_sequence_number;
        if sequence_number == 0 || sequence_number > max_sequence_number {
            return Err(TrackerError::InvalidSequence {
                sequence_number,
                max_sequence_number,
            });
        }

        info!("Marking conversation {} unread from #{}", id, sequence_number);
        let marker = ReadMarker::new(max_sequence_number, sequence_number - 1);
        self.commit_marker(&mut guard, marker)
    }

    /// Record which conversation's message list is on screen
    pub fn set_active_conversation(&self, id: Option<ConversationId>) {
        debug!("Active conversation: {:?}", id);
        *write(&self.active) = id;
    }

    pub fn active_conversation(&self) -> Option<ConversationId> {
        read(&self.active).clone()
    }

    /// App returned to the foreground
    ///
    /// Leaves stored state alone. Returns the conversation on screen, whose
    /// inline marker the presentation layer should re-evaluate.
    pub fn on_app_foregrounded(&self) -> Option<ConversationId> {
        let active = self.active_conversation();
        debug!("App foregrounded (active conversation: {:?})", active);
        active
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Consistent snapshot of a conversation's read marker
    pub fn read_marker(&self, id: &ConversationId) -> Option<ReadMarker> {
        self.state(id).map(|state| read(&state).conversation.marker)
    }

    /// Sequence number of the first unread message; `None` when fully read or unknown
    pub fn get_unread_boundary(&self, id: &ConversationId) -> Option<u64> {
        self.read_marker(id).and_then(|marker| marker.unread_boundary())
    }

    pub fn is_unread(&self, id: &ConversationId) -> bool {
        self.get_unread_boundary(id).is_some()
    }

    pub fn contains(&self, id: &ConversationId) -> bool {
        read(&self.conversations).contains_key(id)
    }

    /// Snapshot of a conversation record
    pub fn conversation(&self, id: &ConversationId) -> Option<Conversation> {
        self.state(id).map(|state| read(&state).conversation.clone())
    }

    /// Messages of a conversation ordered by sequence number
    pub fn messages(&self, id: &ConversationId) -> Vec<Message> {
        self.state(id)
            .map(|state| read(&state).messages.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Snapshot of every conversation, in no particular order
    pub fn conversations(&self) -> Vec<Conversation> {
        let states: Vec<SharedState> = read(&self.conversations).values().cloned().collect();
        states
            .iter()
            .map(|state| read(state).conversation.clone())
            .collect()
    }
}
