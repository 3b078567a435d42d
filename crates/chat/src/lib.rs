//! Chat crate - Unread tracking for conversations
//!
//! This crate keeps the per-conversation read position of a chat client:
//! - Domain models (Conversation, Message, ReadMarker)
//! - Storage trait abstractions with SQLite and in-memory backends
//! - The unread tracker and its notification decisions
//! - Conversation screen state (inline "new messages" line, scroll badge)
//! - An inbound event loop for sync and UI events
//! - Query API for the sidebar
//!
//! The crate has no UI dependencies; the `ffi` module exposes it to
//! Swift/Kotlin through UniFFI.

uniffi::setup_scaffolding!();

pub mod config;
pub mod error;
pub mod events;
pub mod ffi;
pub mod models;
pub mod notify;
pub mod query;
pub mod storage;
pub mod tracker;
pub mod view;

pub use config::TrackerConfig;
pub use error::{TrackerError, TrackerResult};
pub use events::{ChatEvent, DrainStats, EventLoop, EventSender, event_channel};
pub use models::{
    Conversation, ConversationId, IncomingMessage, IncomingMessageBuilder, Message, MessageKind,
    Participant, ReadMarker,
};
pub use notify::{LogNotificationSink, NoopNotificationSink, NotificationSink, is_recent};
pub use query::{
    ConversationDetail, ConversationSummary, get_conversation_detail, list_conversations,
    unread_conversation_count,
};
pub use storage::{ChatStore, InMemoryChatStore, SqliteChatStore};
pub use tracker::UnreadTracker;
pub use view::ConversationView;
