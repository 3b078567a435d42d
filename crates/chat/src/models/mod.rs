//! Domain models for chat entities

mod conversation;
mod message;

pub use conversation::{Conversation, ConversationId, Participant, ReadMarker};
pub use message::{IncomingMessage, IncomingMessageBuilder, Message, MessageKind};
