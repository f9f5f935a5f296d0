use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use conecta_core::chat::{ChatMessage, ChatRole};
use conecta_core::ids::{MessageId, SessionId};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

/// A stored chat message. The log is append-only: rows are never
/// updated or deleted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageRow {
    pub id: MessageId,
    pub session_id: SessionId,
    pub sequence: i64,
    pub role: ChatRole,
    pub content: String,
    pub created_at: String,
}

impl MessageRow {
    pub fn to_chat(&self) -> ChatMessage {
        ChatMessage {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// Per-session append lock so sequence numbers stay contiguous.
struct SessionLocks {
    locks: HashMap<String, Arc<Mutex<()>>>,
}

impl SessionLocks {
    fn new() -> Self {
        Self {
            locks: HashMap::new(),
        }
    }

    fn get(&mut self, session_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

pub struct MessageRepo {
    db: Database,
    session_locks: Mutex<SessionLocks>,
}

impl MessageRepo {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            session_locks: Mutex::new(SessionLocks::new()),
        }
    }

    /// Append a message to a session. Atomically:
    /// 1. Acquires the per-session lock
    /// 2. Reads the current max sequence
    /// 3. Inserts the message at sequence + 1
    /// 4. Bumps the session's message_count
    #[instrument(skip(self, content), fields(session_id = %session_id, role = %role))]
    pub fn append(
        &self,
        session_id: &SessionId,
        role: ChatRole,
        content: &str,
    ) -> Result<MessageRow, StoreError> {
        let lock = self.session_locks.lock().get(session_id.as_str());
        let _guard = lock.lock();

        self.db.with_conn(|conn| {
            // Existence check and max sequence in one query: no row means no session.
            let max_seq: i64 = conn
                .query_row(
                    "SELECT COALESCE((SELECT MAX(sequence) FROM messages WHERE session_id = ?1), 0)
                     FROM sessions WHERE id = ?1",
                    [session_id.as_str()],
                    |row| row.get(0),
                )
                .map_err(|_| StoreError::NotFound(format!("session {session_id}")))?;

            let id = MessageId::new();
            let now = Utc::now().to_rfc3339();
            let sequence = max_seq + 1;

            conn.execute(
                "INSERT INTO messages (id, session_id, sequence, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    id.as_str(),
                    session_id.as_str(),
                    sequence,
                    role.to_string(),
                    content,
                    now,
                ],
            )?;

            conn.execute(
                "UPDATE sessions SET message_count = message_count + 1, updated_at = ?1 WHERE id = ?2",
                rusqlite::params![now, session_id.as_str()],
            )?;

            Ok(MessageRow {
                id,
                session_id: session_id.clone(),
                sequence,
                role,
                content: content.to_string(),
                created_at: now,
            })
        })
    }

    /// List messages for a session, ordered by sequence.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub fn list(
        &self,
        session_id: &SessionId,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<MessageRow>, StoreError> {
        self.db.with_conn(|conn| {
            let limit = limit.unwrap_or(1000);
            let offset = offset.unwrap_or(0);
            let mut stmt = conn.prepare(
                "SELECT id, session_id, sequence, role, content, created_at
                 FROM messages WHERE session_id = ?1
                 ORDER BY sequence ASC
                 LIMIT ?2 OFFSET ?3",
            )?;
            let mut rows = stmt.query(rusqlite::params![session_id.as_str(), limit, offset])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_message(row)?);
            }
            Ok(results)
        })
    }

    /// The most recent `n` messages, oldest first. This is the window
    /// the chat prompt sees.
    #[instrument(skip(self), fields(session_id = %session_id, n))]
    pub fn last_n(&self, session_id: &SessionId, n: u32) -> Result<Vec<MessageRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, sequence, role, content, created_at
                 FROM messages WHERE session_id = ?1
                 ORDER BY sequence DESC
                 LIMIT ?2",
            )?;
            let mut rows = stmt.query(rusqlite::params![session_id.as_str(), n])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_message(row)?);
            }
            results.reverse();
            Ok(results)
        })
    }

    /// Count messages in a session.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub fn count(&self, session_id: &SessionId) -> Result<i64, StoreError> {
        self.db.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE session_id = ?1",
                [session_id.as_str()],
                |row| row.get(0),
            )?)
        })
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> Result<MessageRow, StoreError> {
    let role_str: String = row_helpers::get(row, 3, "messages", "role")?;

    Ok(MessageRow {
        id: MessageId::from_raw(row_helpers::get::<String>(row, 0, "messages", "id")?),
        session_id: SessionId::from_raw(row_helpers::get::<String>(row, 1, "messages", "session_id")?),
        sequence: row_helpers::get(row, 2, "messages", "sequence")?,
        role: row_helpers::parse_enum(&role_str, "messages", "role")?,
        content: row_helpers::get(row, 4, "messages", "content")?,
        created_at: row_helpers::get(row, 5, "messages", "created_at")?,
    })
}
