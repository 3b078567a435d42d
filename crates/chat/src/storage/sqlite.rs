//! SQLite-based chat storage

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use rusqlite_migration::{M, Migrations};

use super::traits::ChatStore;
use crate::models::{Conversation, ConversationId, Message, MessageKind, Participant, ReadMarker};

/// Database migrations
///
/// Each migration is applied in order. The user_version pragma tracks which
/// migrations have been applied.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: Initial schema
        M::up(
            r#"
            CREATE TABLE conversations (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                last_message_at TEXT NOT NULL,
                last_message_text TEXT NOT NULL DEFAULT '',
                max_sequence_number INTEGER NOT NULL DEFAULT 0,
                last_read_sequence_number INTEGER NOT NULL DEFAULT 0,
                CHECK (last_read_sequence_number <= max_sequence_number)
            );

            CREATE INDEX idx_conversations_last_message_at
                ON conversations(last_message_at DESC);

            CREATE TABLE conversation_participants (
                conversation_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                display_name TEXT,
                email TEXT NOT NULL,
                PRIMARY KEY (conversation_id, position),
                FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
            );

            CREATE TABLE messages (
                conversation_id TEXT NOT NULL,
                sequence_number INTEGER NOT NULL,
                author TEXT NOT NULL,
                kind TEXT NOT NULL,
                text TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (conversation_id, sequence_number)
            );
            "#,
        ),
    ])
}

/// Fixed-width RFC 3339 so TEXT ordering matches time ordering
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("Invalid timestamp in database: {}", s))?
        .with_timezone(&Utc))
}

/// SQLite integers are signed; sequence numbers past `i64::MAX` cannot be stored
fn to_sql_sequence(sequence_number: u64) -> Result<i64> {
    i64::try_from(sequence_number)
        .with_context(|| format!("Sequence number {} exceeds SQLite integer range", sequence_number))
}

fn from_sql_sequence(value: i64) -> Result<u64> {
    u64::try_from(value).with_context(|| format!("Negative sequence number in database: {}", value))
}

/// Write a conversation row and replace its participants
fn write_conversation(conn: &Connection, conversation: &Conversation) -> Result<()> {
    conn.execute(
        "INSERT INTO conversations
            (id, name, last_message_at, last_message_text,
             max_sequence_number, last_read_sequence_number)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            last_message_at = excluded.last_message_at,
            last_message_text = excluded.last_message_text,
            max_sequence_number = excluded.max_sequence_number,
            last_read_sequence_number = excluded.last_read_sequence_number",
        params![
            conversation.id.as_str(),
            conversation.name,
            format_timestamp(&conversation.last_message_at),
            conversation.last_message_text,
            to_sql_sequence(conversation.marker.max_sequence_number)?,
            to_sql_sequence(conversation.marker.last_read_sequence_number)?,
        ],
    )
    .with_context(|| format!("Failed to write conversation {}", conversation.id))?;

    conn.execute(
        "DELETE FROM conversation_participants WHERE conversation_id = ?",
        [conversation.id.as_str()],
    )?;
    let mut stmt = conn.prepare(
        "INSERT INTO conversation_participants (conversation_id, position, display_name, email)
         VALUES (?, ?, ?, ?)",
    )?;
    for (i, participant) in conversation.participants.iter().enumerate() {
        stmt.execute(params![
            conversation.id.as_str(),
            i,
            participant.display_name,
            participant.email,
        ])?;
    }
    Ok(())
}

fn write_message(conn: &Connection, message: &Message) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO messages
            (conversation_id, sequence_number, author, kind, text, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
        params![
            message.conversation_id.as_str(),
            to_sql_sequence(message.sequence_number)?,
            message.author,
            message.kind.as_str(),
            message.text,
            format_timestamp(&message.created_at),
        ],
    )
    .with_context(|| {
        format!(
            "Failed to write message #{} in {}",
            message.sequence_number, message.conversation_id
        )
    })?;
    Ok(())
}

/// SQLite-based chat storage
pub struct SqliteChatStore {
    conn: Mutex<Connection>,
}

impl SqliteChatStore {
    /// Open (or create) a SQLite chat store at `db_path`
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;
        Self::with_connection(conn, true)
    }

    /// Create a store backed by a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::with_connection(conn, false)
    }

    fn with_connection(mut conn: Connection, wal: bool) -> Result<Self> {
        // WAL lets readers proceed while a marker write is in flight
        if wal {
            conn.execute_batch(
                r#"
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                "#,
            )?;
        }
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("SQLite connection lock poisoned"))
    }

    /// Load participants for a conversation
    fn load_participants(&self, conn: &Connection, id: &str) -> Result<Vec<Participant>> {
        let mut stmt = conn.prepare(
            "SELECT display_name, email FROM conversation_participants
             WHERE conversation_id = ?
             ORDER BY position",
        )?;

        let participants = stmt
            .query_map([id], |row| {
                Ok(Participant {
                    display_name: row.get(0)?,
                    email: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(participants)
    }

    fn load_conversation(&self, conn: &Connection, id: &str) -> Result<Option<Conversation>> {
        let row: Option<(String, String, String, String, i64, i64)> = conn
            .query_row(
                "SELECT id, name, last_message_at, last_message_text,
                        max_sequence_number, last_read_sequence_number
                 FROM conversations WHERE id = ?",
                [id],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, name, last_message_at, last_message_text, max_seq, last_read_seq)) = row
        else {
            return Ok(None);
        };

        let participants = self.load_participants(conn, &id)?;

        Ok(Some(Conversation {
            id: ConversationId::new(id),
            name,
            participants,
            last_message_at: parse_timestamp(&last_message_at)?,
            last_message_text,
            marker: ReadMarker::new(from_sql_sequence(max_seq)?, from_sql_sequence(last_read_seq)?),
        }))
    }
}

impl ChatStore for SqliteChatStore {
    fn upsert_conversation(&self, conversation: &Conversation) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        write_conversation(&tx, conversation)?;
        tx.commit()?;
        Ok(())
    }

    fn upsert_message(&self, message: &Message) -> Result<()> {
        let conn = self.lock()?;
        write_message(&conn, message)
    }

    fn record_message(&self, message: &Message, conversation: &Conversation) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        write_message(&tx, message)?;
        write_conversation(&tx, conversation)?;
        tx.commit()?;
        Ok(())
    }

    fn save_read_marker(&self, id: &ConversationId, marker: ReadMarker) -> Result<()> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE conversations
             SET max_sequence_number = ?, last_read_sequence_number = ?
             WHERE id = ?",
            params![
                to_sql_sequence(marker.max_sequence_number)?,
                to_sql_sequence(marker.last_read_sequence_number)?,
                id.as_str(),
            ],
        )?;

        if updated == 0 {
            return Err(anyhow!("No stored conversation {}", id));
        }
        Ok(())
    }

    fn get_conversation(&self, id: &ConversationId) -> Result<Option<Conversation>> {
        let conn = self.lock()?;
        self.load_conversation(&conn, id.as_str())
    }

    fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT id FROM conversations ORDER BY last_message_at DESC")?;
        let ids: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut conversations = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(conversation) = self.load_conversation(&conn, &id)? {
                conversations.push(conversation);
            }
        }
        Ok(conversations)
    }

    fn list_messages(&self, id: &ConversationId) -> Result<Vec<Message>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT sequence_number, author, kind, text, created_at
             FROM messages WHERE conversation_id = ?
             ORDER BY sequence_number ASC",
        )?;

        let rows = stmt
            .query_map([id.as_str()], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(seq, author, kind, text, created_at)| -> Result<Message> {
                let kind = MessageKind::parse(&kind)
                    .with_context(|| format!("Unknown message kind in database: {}", kind))?;
                Ok(Message {
                    conversation_id: id.clone(),
                    sequence_number: from_sql_sequence(seq)?,
                    author,
                    kind,
                    text,
                    created_at: parse_timestamp(&created_at)?,
                })
            })
            .collect()
    }

    fn count_conversations(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM conversations", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn clear(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
            DELETE FROM messages;
            DELETE FROM conversation_participants;
            DELETE FROM conversations;
            "#,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IncomingMessage;
    use tempfile::TempDir;

    fn make_conversation(id: &str) -> Conversation {
        Conversation::new(ConversationId::new(id), "Chat Report", Utc::now())
            .with_participants(vec![Participant::with_name("B User", "user_b@test.com")])
            .with_last_message_text("Test")
            .with_marker(9, 1)
    }

    #[test]
    fn test_conversation_roundtrip_with_participants() {
        let store = SqliteChatStore::open_in_memory().unwrap();
        store.upsert_conversation(&make_conversation("1")).unwrap();

        let loaded = store
            .get_conversation(&ConversationId::new("1"))
            .unwrap()
            .unwrap();
        assert_eq!(loaded.participants.len(), 1);
        assert_eq!(loaded.participants[0].label(), "B User");
        assert_eq!(loaded.marker, ReadMarker::new(9, 1));
    }

    #[test]
    fn test_upsert_replaces_participants() {
        let store = SqliteChatStore::open_in_memory().unwrap();
        store.upsert_conversation(&make_conversation("1")).unwrap();

        let updated = make_conversation("1").with_participants(vec![
            Participant::new("user_b@test.com"),
            Participant::new("user_c@test.com"),
        ]);
        store.upsert_conversation(&updated).unwrap();

        let loaded = store
            .get_conversation(&ConversationId::new("1"))
            .unwrap()
            .unwrap();
        assert_eq!(loaded.participants.len(), 2);
        assert_eq!(store.count_conversations().unwrap(), 1);
    }

    #[test]
    fn test_save_read_marker_unknown_conversation() {
        let store = SqliteChatStore::open_in_memory().unwrap();
        let result = store.save_read_marker(&ConversationId::new("404"), ReadMarker::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chat.db");
        let id = ConversationId::new("1");

        {
            let store = SqliteChatStore::new(&path).unwrap();
            store.upsert_conversation(&make_conversation("1")).unwrap();
            for seq in [2, 1] {
                let message = IncomingMessage::builder("user_b@test.com")
                    .text(format!("Comment {}", seq))
                    .build()
                    .into_message(id.clone(), seq);
                store.upsert_message(&message).unwrap();
            }
            store.save_read_marker(&id, ReadMarker::new(9, 3)).unwrap();
        }

        let store = SqliteChatStore::new(&path).unwrap();
        let conversation = store.get_conversation(&id).unwrap().unwrap();
        assert_eq!(conversation.marker.unread_boundary(), Some(4));

        let messages = store.list_messages(&id).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sequence_number, 1);
        assert_eq!(messages[1].text, "Comment 2");
    }

    #[test]
    fn test_record_message_rolls_back_as_a_unit() {
        let store = SqliteChatStore::open_in_memory().unwrap();
        let id = ConversationId::new("1");
        store.upsert_conversation(&make_conversation("1")).unwrap();

        let message = IncomingMessage::builder("user_b@test.com")
            .build()
            .into_message(id.clone(), 10);
        // Bypasses ReadMarker::new so the CHECK constraint rejects the row
        let mut broken = make_conversation("1");
        broken.marker = ReadMarker {
            max_sequence_number: 10,
            last_read_sequence_number: 11,
        };

        assert!(store.record_message(&message, &broken).is_err());
        assert!(store.list_messages(&id).unwrap().is_empty());
        assert_eq!(
            store.get_conversation(&id).unwrap().unwrap().marker,
            ReadMarker::new(9, 1)
        );

        let advanced = make_conversation("1").with_marker(10, 1);
        store.record_message(&message, &advanced).unwrap();
        assert_eq!(store.list_messages(&id).unwrap().len(), 1);
        assert_eq!(
            store.get_conversation(&id).unwrap().unwrap().marker.max_sequence_number,
            10
        );
    }

    #[test]
    fn test_sequence_numbers_beyond_sqlite_range() {
        let store = SqliteChatStore::open_in_memory().unwrap();
        let huge = make_conversation("1").with_marker(u64::MAX, u64::MAX);

        let err = store.upsert_conversation(&huge).unwrap_err();
        assert!(format!("{:#}", err).contains("exceeds SQLite integer range"));
        assert_eq!(store.count_conversations().unwrap(), 0);

        let largest = make_conversation("1").with_marker(i64::MAX as u64, 5);
        store.upsert_conversation(&largest).unwrap();
        let loaded = store.get_conversation(&ConversationId::new("1")).unwrap().unwrap();
        assert_eq!(loaded.marker.max_sequence_number, i64::MAX as u64);
    }

    #[test]
    fn test_clear() {
        let store = SqliteChatStore::open_in_memory().unwrap();
        store.upsert_conversation(&make_conversation("1")).unwrap();
        store.clear().unwrap();
        assert_eq!(store.count_conversations().unwrap(), 0);
    }
}
