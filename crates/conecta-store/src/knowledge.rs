use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use conecta_core::ids::SourceId;

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

/// A knowledge base entry. Global: every chat reads the same set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KnowledgeRow {
    pub id: SourceId,
    pub name: String,
    pub content: Option<String>,
    pub url: Option<String>,
    pub created_at: String,
}

pub struct KnowledgeRepo {
    db: Database,
}

impl KnowledgeRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Store a knowledge source. Validation (name present, content or url
    /// present) happens in the flow layer before this is called.
    #[instrument(skip(self, content), fields(name))]
    pub fn create(
        &self,
        name: &str,
        content: Option<&str>,
        url: Option<&str>,
    ) -> Result<KnowledgeRow, StoreError> {
        let id = SourceId::new();
        let now = Utc::now().to_rfc3339();

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO knowledge_sources (id, name, content, url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id.as_str(), name, content, url, now],
            )?;

            Ok(KnowledgeRow {
                id,
                name: name.to_string(),
                content: content.map(str::to_string),
                url: url.map(str::to_string),
                created_at: now,
            })
        })
    }

    /// List all sources in insertion order. IDs are time-ordered, so
    /// ordering by id preserves the order sources were added, which is
    /// also the order their content is concatenated into prompts.
    #[instrument(skip(self))]
    pub fn list(&self) -> Result<Vec<KnowledgeRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, content, url, created_at
                 FROM knowledge_sources ORDER BY id ASC",
            )?;
            let mut rows = stmt.query([])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_source(row)?);
            }
            Ok(results)
        })
    }

    /// Delete a source.
    #[instrument(skip(self), fields(source_id = %id))]
    pub fn delete(&self, id: &SourceId) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let rows = conn.execute(
                "DELETE FROM knowledge_sources WHERE id = ?1",
                [id.as_str()],
            )?;
            if rows == 0 {
                return Err(StoreError::NotFound(format!("knowledge source {id}")));
            }
            Ok(())
        })
    }

    /// Count stored sources.
    #[instrument(skip(self))]
    pub fn count(&self) -> Result<i64, StoreError> {
        self.db.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM knowledge_sources", [], |row| row.get(0))?)
        })
    }
}

fn row_to_source(row: &rusqlite::Row<'_>) -> Result<KnowledgeRow, StoreError> {
    Ok(KnowledgeRow {
        id: SourceId::from_raw(row_helpers::get::<String>(row, 0, "knowledge_sources", "id")?),
        name: row_helpers::get(row, 1, "knowledge_sources", "name")?,
        content: row_helpers::get_opt(row, 2, "knowledge_sources", "content")?,
        url: row_helpers::get_opt(row, 3, "knowledge_sources", "url")?,
        created_at: row_helpers::get(row, 4, "knowledge_sources", "created_at")?,
    })
}
