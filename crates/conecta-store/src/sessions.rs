use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use conecta_core::ids::{SessionId, UserId};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionRow {
    pub id: SessionId,
    pub user_id: UserId,
    /// Preview of the latest user message, truncated for the sidebar.
    pub last_message: Option<String>,
    pub message_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

pub struct SessionRepo {
    db: Database,
}

impl SessionRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a new chat session owned by the given user.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn create(&self, user_id: &UserId) -> Result<SessionRow, StoreError> {
        let id = SessionId::new();
        let now = Utc::now().to_rfc3339();

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, user_id, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id.as_str(), user_id.as_str(), now, now],
            )?;

            Ok(SessionRow {
                id,
                user_id: user_id.clone(),
                last_message: None,
                message_count: 0,
                created_at: now.clone(),
                updated_at: now,
            })
        })
    }

    /// Get a session by ID.
    #[instrument(skip(self), fields(session_id = %id))]
    pub fn get(&self, id: &SessionId) -> Result<SessionRow, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, last_message, message_count, created_at, updated_at
                 FROM sessions WHERE id = ?1",
            )?;
            let mut rows = stmt.query([id.as_str()])?;
            match rows.next()? {
                Some(row) => row_to_session(row),
                None => Err(StoreError::NotFound(format!("session {id}"))),
            }
        })
    }

    /// Get a session, verifying the caller owns it.
    /// A session belonging to another user is a permission error, not NotFound,
    /// so callers can surface the denial distinctly.
    #[instrument(skip(self), fields(session_id = %id, user_id = %user_id))]
    pub fn get_owned(&self, id: &SessionId, user_id: &UserId) -> Result<SessionRow, StoreError> {
        let session = self.get(id)?;
        if &session.user_id != user_id {
            return Err(StoreError::PermissionDenied {
                path: format!("sessions/{id}"),
                operation: "get".to_string(),
            });
        }
        Ok(session)
    }

    /// List a user's sessions, newest first.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn list_for_user(
        &self,
        user_id: &UserId,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<SessionRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, last_message, message_count, created_at, updated_at
                 FROM sessions WHERE user_id = ?1
                 ORDER BY created_at DESC LIMIT ?2 OFFSET ?3",
            )?;
            let mut rows = stmt.query(rusqlite::params![user_id.as_str(), limit, offset])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_session(row)?);
            }
            Ok(results)
        })
    }

    /// Update the sidebar preview for a session.
    #[instrument(skip(self, preview), fields(session_id = %session_id))]
    pub fn update_preview(
        &self,
        session_id: &SessionId,
        preview: &str,
    ) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let now = Utc::now().to_rfc3339();
            let updated = conn.execute(
                "UPDATE sessions SET last_message = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![preview, now, session_id.as_str()],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound(format!("session {session_id}")));
            }
            Ok(())
        })
    }
}

fn row_to_session(row: &rusqlite::Row<'_>) -> Result<SessionRow, StoreError> {
    Ok(SessionRow {
        id: SessionId::from_raw(row_helpers::get::<String>(row, 0, "sessions", "id")?),
        user_id: UserId::from_raw(row_helpers::get::<String>(row, 1, "sessions", "user_id")?),
        last_message: row_helpers::get_opt(row, 2, "sessions", "last_message")?,
        message_count: row_helpers::get(row, 3, "sessions", "message_count")?,
        created_at: row_helpers::get(row, 4, "sessions", "created_at")?,
        updated_at: row_helpers::get(row, 5, "sessions", "updated_at")?,
    })
}
