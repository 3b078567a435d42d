//! Query API for UI consumption
//!
//! Provides functions for listing conversations and reading their state.

mod conversations;

pub use conversations::{
    ConversationDetail, ConversationSummary, get_conversation_detail, list_conversations,
    unread_conversation_count,
};
