//! Message repository: history write-through and recent-history reads.

use super::{DbError, from_millis};
use roomcast_proto::{MessageBody, RoomId, Sender};
use sqlx::SqlitePool;

/// Repository for message operations.
pub struct MessageRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MessageRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a delivered message and bump the room's last message.
    pub async fn insert(&self, room_id: &RoomId, message: &MessageBody) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO messages (id, room_id, sender_id, content, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&message.id)
        .bind(room_id.as_str())
        .bind(&message.sender.id)
        .bind(&message.content)
        .bind(message.created_at.timestamp_millis())
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE rooms SET last_message_id = ? WHERE id = ?")
            .bind(&message.id)
            .bind(room_id.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// The latest `limit` messages of a room, oldest first.
    pub async fn recent(&self, room_id: &RoomId, limit: u32) -> Result<Vec<MessageBody>, DbError> {
        let rows = sqlx::query_as::<_, (String, String, String, String, i64)>(
            r#"
            SELECT m.id, m.content, u.id, u.username, m.created_at
            FROM messages m
            JOIN users u ON u.id = m.sender_id
            WHERE m.room_id = ?
            ORDER BY m.created_at DESC, m.rowid DESC
            LIMIT ?
            "#,
        )
        .bind(room_id.as_str())
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        let mut messages = rows
            .into_iter()
            .map(|(id, content, sender_id, username, created_at)| {
                Ok(MessageBody {
                    id,
                    content,
                    sender: Sender {
                        id: sender_id,
                        username,
                    },
                    created_at: from_millis(created_at)?,
                })
            })
            .collect::<Result<Vec<_>, DbError>>()?;
        messages.reverse();
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::{Duration, Utc};

    fn message(id: &str, content: &str, offset_ms: i64) -> MessageBody {
        let base = Utc::now();
        MessageBody {
            id: id.into(),
            content: content.into(),
            sender: Sender {
                id: "a".into(),
                username: "alice".into(),
            },
            created_at: base + Duration::milliseconds(offset_ms),
        }
    }

    #[tokio::test]
    async fn recent_returns_latest_oldest_first() {
        let db = Database::new(":memory:").await.unwrap();
        db.users().upsert("a", "alice").await.unwrap();
        let room = RoomId::parse("r1").unwrap();

        for (i, text) in ["one", "two", "three"].iter().enumerate() {
            db.messages()
                .insert(&room, &message(&format!("m{i}"), text, i as i64 * 10))
                .await
                .unwrap();
        }

        let recent = db.messages().recent(&room, 2).await.unwrap();
        let contents: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["two", "three"]);
        assert_eq!(recent[0].sender.username, "alice");
    }

    #[tokio::test]
    async fn other_rooms_are_not_mixed_in() {
        let db = Database::new(":memory:").await.unwrap();
        db.users().upsert("a", "alice").await.unwrap();
        let r1 = RoomId::parse("r1").unwrap();
        let r2 = RoomId::parse("r2").unwrap();

        db.messages().insert(&r1, &message("m1", "hi", 0)).await.unwrap();
        assert!(db.messages().recent(&r2, 50).await.unwrap().is_empty());
    }
}
