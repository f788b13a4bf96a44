//! Room repository: room records and participant lists.

use super::{DbError, from_millis};
use chrono::{DateTime, Utc};
use roomcast_proto::{RoomId, RoomInfo, RoomKind, Sender};
use sqlx::SqlitePool;

/// A stored room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomRecord {
    pub id: RoomId,
    pub name: String,
    pub kind: RoomKind,
    pub created_at: DateTime<Utc>,
}

impl RoomRecord {
    /// Build the wire representation with the given participant list.
    pub fn into_info(self, participants: Vec<Sender>) -> RoomInfo {
        RoomInfo {
            id: self.id,
            name: self.name,
            kind: self.kind,
            participants,
            created_at: self.created_at,
        }
    }
}

fn kind_to_str(kind: RoomKind) -> &'static str {
    match kind {
        RoomKind::Public => "public",
        RoomKind::Private => "private",
    }
}

fn kind_from_str(raw: &str) -> Result<RoomKind, DbError> {
    match raw {
        "public" => Ok(RoomKind::Public),
        "private" => Ok(RoomKind::Private),
        other => Err(DbError::Corrupt(format!("room type {other:?}"))),
    }
}

type RoomRow = (String, String, String, i64);

fn decode_row((id, name, kind, created_at): RoomRow) -> Result<RoomRecord, DbError> {
    Ok(RoomRecord {
        id: RoomId::parse(id).map_err(|e| DbError::Corrupt(e.to_string()))?,
        name,
        kind: kind_from_str(&kind)?,
        created_at: from_millis(created_at)?,
    })
}

/// Repository for room operations.
pub struct RoomRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> RoomRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a room. The creator is always a participant; unknown participant
    /// ids are skipped.
    pub async fn create(
        &self,
        name: &str,
        kind: RoomKind,
        creator_id: &str,
        participant_ids: &[String],
    ) -> Result<RoomRecord, DbError> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let created_at = Utc::now();

        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO rooms (id, name, type, created_at) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(name)
            .bind(kind_to_str(kind))
            .bind(created_at.timestamp_millis())
            .execute(&mut *tx)
            .await?;

        for user_id in std::iter::once(creator_id).chain(participant_ids.iter().map(String::as_str)) {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO room_participants (room_id, user_id)
                SELECT ?, id FROM users WHERE id = ?
                "#,
            )
            .bind(&id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(RoomRecord {
            id: RoomId::parse(id).map_err(|e| DbError::Corrupt(e.to_string()))?,
            name: name.to_string(),
            kind,
            // Stored precision is milliseconds.
            created_at: from_millis(created_at.timestamp_millis())?,
        })
    }

    /// Find a room by id.
    pub async fn find(&self, id: &RoomId) -> Result<Option<RoomRecord>, DbError> {
        let row = sqlx::query_as::<_, RoomRow>(
            "SELECT id, name, type, created_at FROM rooms WHERE id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(decode_row).transpose()
    }

    /// Participants of a room, in name order.
    pub async fn participants(&self, id: &RoomId) -> Result<Vec<Sender>, DbError> {
        let rows = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT u.id, u.username
            FROM room_participants p
            JOIN users u ON u.id = p.user_id
            WHERE p.room_id = ?
            ORDER BY u.username
            "#,
        )
        .bind(id.as_str())
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, username)| Sender { id, username })
            .collect())
    }

    /// Whether `user_id` is a participant of the room.
    pub async fn is_participant(&self, id: &RoomId, user_id: &str) -> Result<bool, DbError> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM room_participants WHERE room_id = ? AND user_id = ?",
        )
        .bind(id.as_str())
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(found.is_some())
    }

    /// Rooms the user participates in, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<RoomRecord>, DbError> {
        let rows = sqlx::query_as::<_, RoomRow>(
            r#"
            SELECT r.id, r.name, r.type, r.created_at
            FROM rooms r
            JOIN room_participants p ON p.room_id = r.id
            WHERE p.user_id = ?
            ORDER BY r.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(decode_row).collect()
    }
}
