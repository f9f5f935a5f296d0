use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use conecta_core::ids::UserId;

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

/// How the account was created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignInProvider {
    Password,
    Google,
}

impl std::fmt::Display for SignInProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password => write!(f, "password"),
            Self::Google => write!(f, "google"),
        }
    }
}

impl std::str::FromStr for SignInProvider {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "password" => Ok(Self::Password),
            "google" => Ok(Self::Google),
            other => Err(format!("unknown sign-in provider: {other}")),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserRow {
    pub id: UserId,
    pub email: String,
    pub display_name: Option<String>,
    /// Argon2 PHC string. None for social-login accounts.
    /// Never serialized into responses.
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub provider: SignInProvider,
    pub created_at: String,
}

pub struct UserRepo {
    db: Database,
}

impl UserRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a new user. The caller normalizes the email beforehand.
    /// A duplicate email surfaces as Conflict via the UNIQUE constraint.
    #[instrument(skip(self, password_hash), fields(email))]
    pub fn create(
        &self,
        email: &str,
        display_name: Option<&str>,
        password_hash: Option<&str>,
        provider: SignInProvider,
    ) -> Result<UserRow, StoreError> {
        let id = UserId::new();
        let now = Utc::now().to_rfc3339();

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, display_name, password_hash, provider, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    id.as_str(),
                    email,
                    display_name,
                    password_hash,
                    provider.to_string(),
                    now,
                ],
            )?;

            Ok(UserRow {
                id,
                email: email.to_string(),
                display_name: display_name.map(str::to_string),
                password_hash: password_hash.map(str::to_string),
                provider,
                created_at: now,
            })
        })
    }

    /// Get a user by ID.
    #[instrument(skip(self), fields(user_id = %id))]
    pub fn get(&self, id: &UserId) -> Result<UserRow, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, email, display_name, password_hash, provider, created_at
                 FROM users WHERE id = ?1",
            )?;
            let mut rows = stmt.query([id.as_str()])?;
            match rows.next()? {
                Some(row) => row_to_user(row),
                None => Err(StoreError::NotFound(format!("user {id}"))),
            }
        })
    }

    /// Get a user by email.
    #[instrument(skip(self), fields(email))]
    pub fn get_by_email(&self, email: &str) -> Result<UserRow, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, email, display_name, password_hash, provider, created_at
                 FROM users WHERE email = ?1",
            )?;
            let mut rows = stmt.query([email])?;
            match rows.next()? {
                Some(row) => row_to_user(row),
                None => Err(StoreError::NotFound(format!("user {email}"))),
            }
        })
    }

    /// Grant or revoke the admin role.
    #[instrument(skip(self), fields(user_id = %id, is_admin))]
    pub fn set_admin(&self, id: &UserId, is_admin: bool) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO admin_roles (user_id, is_admin, granted_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO UPDATE SET is_admin = ?2, granted_at = ?3",
                rusqlite::params![id.as_str(), is_admin as i64, now],
            )?;
            Ok(())
        })
    }

    /// A user is admin only when an admin_roles row exists with the flag set.
    #[instrument(skip(self), fields(user_id = %id))]
    pub fn is_admin(&self, id: &UserId) -> Result<bool, StoreError> {
        self.db.with_conn(|conn| {
            let flag: Option<i64> = conn
                .query_row(
                    "SELECT is_admin FROM admin_roles WHERE user_id = ?1",
                    [id.as_str()],
                    |row| row.get(0),
                )
                .ok();
            Ok(flag == Some(1))
        })
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> Result<UserRow, StoreError> {
    let provider_str: String = row_helpers::get(row, 4, "users", "provider")?;

    Ok(UserRow {
        id: UserId::from_raw(row_helpers::get::<String>(row, 0, "users", "id")?),
        email: row_helpers::get(row, 1, "users", "email")?,
        display_name: row_helpers::get_opt(row, 2, "users", "display_name")?,
        password_hash: row_helpers::get_opt(row, 3, "users", "password_hash")?,
        provider: row_helpers::parse_enum(&provider_str, "users", "provider")?,
        created_at: row_helpers::get(row, 5, "users", "created_at")?,
    })
}
