use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use conecta_core::ids::FiscalId;

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

/// Where a poll worker is assigned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FiscalRole {
    /// Covers the whole school.
    General,
    /// Assigned to a single table.
    Mesa,
}

impl std::fmt::Display for FiscalRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::General => write!(f, "general"),
            Self::Mesa => write!(f, "mesa"),
        }
    }
}

impl std::str::FromStr for FiscalRole {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "general" => Ok(Self::General),
            "mesa" => Ok(Self::Mesa),
            other => Err(format!("unknown fiscal role: {other}")),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FiscalRow {
    pub id: FiscalId,
    pub full_name: String,
    pub dni: String,
    pub role: FiscalRole,
    pub school: String,
    pub mesa: String,
    pub phone: String,
    pub created_at: String,
}

pub struct FiscalRepo {
    db: Database,
}

impl FiscalRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Add a poll worker to the roster.
    #[instrument(skip(self), fields(dni, role = %role))]
    pub fn create(
        &self,
        full_name: &str,
        dni: &str,
        role: FiscalRole,
        school: &str,
        mesa: &str,
        phone: &str,
    ) -> Result<FiscalRow, StoreError> {
        let id = FiscalId::new();
        let now = Utc::now().to_rfc3339();

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO fiscales (id, full_name, dni, role, school, mesa, phone, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    id.as_str(),
                    full_name,
                    dni,
                    role.to_string(),
                    school,
                    mesa,
                    phone,
                    now,
                ],
            )?;

            Ok(FiscalRow {
                id,
                full_name: full_name.to_string(),
                dni: dni.to_string(),
                role,
                school: school.to_string(),
                mesa: mesa.to_string(),
                phone: phone.to_string(),
                created_at: now,
            })
        })
    }

    /// List the roster alphabetically, optionally filtered by a search
    /// term matched against name, national ID, and school.
    #[instrument(skip(self), fields(query))]
    pub fn list(&self, query: Option<&str>) -> Result<Vec<FiscalRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut results = Vec::new();
            match query {
                Some(q) if !q.trim().is_empty() => {
                    let pattern = format!("%{}%", row_helpers::escape_like(q.trim()));
                    let mut stmt = conn.prepare(
                        "SELECT id, full_name, dni, role, school, mesa, phone, created_at
                         FROM fiscales
                         WHERE full_name LIKE ?1 ESCAPE '\\'
                            OR dni LIKE ?1 ESCAPE '\\'
                            OR school LIKE ?1 ESCAPE '\\'
                         ORDER BY full_name COLLATE NOCASE ASC",
                    )?;
                    let mut rows = stmt.query([&pattern])?;
                    while let Some(row) = rows.next()? {
                        results.push(row_to_fiscal(row)?);
                    }
                }
                _ => {
                    let mut stmt = conn.prepare(
                        "SELECT id, full_name, dni, role, school, mesa, phone, created_at
                         FROM fiscales ORDER BY full_name COLLATE NOCASE ASC",
                    )?;
                    let mut rows = stmt.query([])?;
                    while let Some(row) = rows.next()? {
                        results.push(row_to_fiscal(row)?);
                    }
                }
            }
            Ok(results)
        })
    }

    /// Remove a poll worker from the roster.
    #[instrument(skip(self), fields(fiscal_id = %id))]
    pub fn delete(&self, id: &FiscalId) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let rows = conn.execute("DELETE FROM fiscales WHERE id = ?1", [id.as_str()])?;
            if rows == 0 {
                return Err(StoreError::NotFound(format!("fiscal {id}")));
            }
            Ok(())
        })
    }

    /// Count roster entries.
    #[instrument(skip(self))]
    pub fn count(&self) -> Result<i64, StoreError> {
        self.db.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM fiscales", [], |row| row.get(0))?)
        })
    }
}

fn row_to_fiscal(row: &rusqlite::Row<'_>) -> Result<FiscalRow, StoreError> {
    let role_str: String = row_helpers::get(row, 3, "fiscales", "role")?;

    Ok(FiscalRow {
        id: FiscalId::from_raw(row_helpers::get::<String>(row, 0, "fiscales", "id")?),
        full_name: row_helpers::get(row, 1, "fiscales", "full_name")?,
        dni: row_helpers::get(row, 2, "fiscales", "dni")?,
        role: row_helpers::parse_enum(&role_str, "fiscales", "role")?,
        school: row_helpers::get(row, 4, "fiscales", "school")?,
        mesa: row_helpers::get(row, 5, "fiscales", "mesa")?,
        phone: row_helpers::get(row, 6, "fiscales", "phone")?,
        created_at: row_helpers::get(row, 7, "fiscales", "created_at")?,
    })
}
