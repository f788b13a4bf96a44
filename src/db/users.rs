//! User repository: identity lookup and presence write-through.

use super::DbError;
use crate::state::Presence;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// A stored identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub status: String,
    pub last_seen: Option<i64>,
}

/// Repository for user operations.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a user, or rename it if the id already exists.
    pub async fn upsert(&self, id: &str, username: &str) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username) VALUES (?, ?)
            ON CONFLICT(id) DO UPDATE SET username = excluded.username
            "#,
        )
        .bind(id)
        .bind(username)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Find a user by id.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>, DbError> {
        let row = sqlx::query_as::<_, (String, String, String, Option<i64>)>(
            "SELECT id, username, status, last_seen FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|(id, username, status, last_seen)| UserRecord {
            id,
            username,
            status,
            last_seen,
        }))
    }

    /// Record a presence transition. Going offline stamps `last_seen`.
    pub async fn set_presence(
        &self,
        id: &str,
        status: Presence,
        at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let result = match status {
            Presence::Online => {
                sqlx::query("UPDATE users SET status = ? WHERE id = ?")
                    .bind(status.as_str())
                    .bind(id)
                    .execute(self.pool)
                    .await?
            }
            Presence::Offline => {
                sqlx::query("UPDATE users SET status = ?, last_seen = ? WHERE id = ?")
                    .bind(status.as_str())
                    .bind(at.timestamp_millis())
                    .bind(id)
                    .execute(self.pool)
                    .await?
            }
        };

        if result.rows_affected() == 0 {
            return Err(DbError::UserNotFound(id.to_string()));
        }
        Ok(())
    }
}
