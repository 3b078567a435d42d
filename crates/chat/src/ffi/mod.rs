//! FFI bindings for UniFFI export
//!
//! Swift/Kotlin bindings for the chat crate via UniFFI.
//!
//! ## Usage from Swift
//!
//! ```swift
//! import ChatFFI
//!
//! startChatLogging(callback: myLogCallback, maxLevel: .info)
//!
//! let chat = try ChatService(
//!     dbPath: "/path/to/chat.db",
//!     currentUser: "user_a@test.com",
//!     notificationWindowSecs: 10,
//!     notifications: myNotificationCallback
//! )
//!
//! try chat.upsertConversation(conversation: record)
//! let rows = chat.listConversations()
//! let marker = try chat.openConversation(conversationId: rows[0].id)
//! ```

mod logging;
mod service;
mod types;

pub use logging::{
    install_host_logger, set_chat_log_level, set_host_log_callback, set_host_log_level,
    start_chat_logging,
};
pub use service::*;
pub use types::*;
