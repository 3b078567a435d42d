//! Storage traits and implementations
//!
//! This module defines the persistence seam behind the unread tracker.
//! The trait-based design allows swapping between in-memory and SQLite
//! storage implementations.

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryChatStore;
pub use sqlite::SqliteChatStore;
pub use traits::ChatStore;
