/// Chat message model and database operations
///
/// # Schema
///
/// ```sql
/// CREATE TABLE chat_messages (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     seq BIGSERIAL NOT NULL,
///     group_id UUID NOT NULL,
///     user_id UUID NOT NULL REFERENCES users(id),
///     content TEXT NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// `group_id` carries no foreign key: history outlives its group.
/// Ordering is `(created_at, seq)`, so messages committed within the same
/// timestamp keep their insertion order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::user::UserSummary;

/// A persisted chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,

    /// Store-assigned insertion sequence, breaks timestamp ties
    #[serde(skip)]
    pub seq: i64,

    pub group_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a new message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChatMessage {
    pub group_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
}

/// A message with its author resolved, as returned to clients and pushed to
/// realtime rooms
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulatedMessage {
    pub id: Uuid,
    pub group_id: Uuid,
    pub author: UserSummary,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl PopulatedMessage {
    pub fn new(message: ChatMessage, author: UserSummary) -> Self {
        Self {
            id: message.id,
            group_id: message.group_id,
            author,
            content: message.content,
            created_at: message.created_at,
        }
    }
}

impl ChatMessage {
    pub async fn create(pool: &PgPool, data: CreateChatMessage) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, ChatMessage>(
            r#"
            INSERT INTO chat_messages (group_id, user_id, content)
            VALUES ($1, $2, $3)
            RETURNING id, seq, group_id, user_id, content, created_at
            "#,
        )
        .bind(data.group_id)
        .bind(data.user_id)
        .bind(data.content)
        .fetch_one(pool)
        .await
    }

    /// Lists a group's messages oldest first
    pub async fn list_by_group(pool: &PgPool, group_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ChatMessage>(
            r#"
            SELECT id, seq, group_id, user_id, content, created_at
            FROM chat_messages
            WHERE group_id = $1
            ORDER BY created_at ASC, seq ASC
            "#,
        )
        .bind(group_id)
        .fetch_all(pool)
        .await
    }
}
