//! Errors returned by tracker operations

use crate::models::ConversationId;

/// Failure of an unread-tracker mutation
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("Unknown conversation: {0}")]
    UnknownConversation(ConversationId),

    #[error("Invalid sequence number {sequence_number}: expected 1..={max_sequence_number}")]
    InvalidSequence {
        sequence_number: u64,
        max_sequence_number: u64,
    },

    #[error("Conversation {0} has no sequence numbers left")]
    SequenceExhausted(ConversationId),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

pub type TrackerResult<T> = std::result::Result<T, TrackerError>;
