/// Task model and database operations
///
/// Tasks always belong to a group and are removed with it
/// (see [`Group::delete_with_tasks`](super::group::Group::delete_with_tasks)).
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_status AS ENUM ('todo', 'done');
///
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     title VARCHAR(200) NOT NULL,
///     image_url VARCHAR(512),
///     status task_status NOT NULL DEFAULT 'todo',
///     group_id UUID NOT NULL REFERENCES groups(id),
///     created_by UUID NOT NULL REFERENCES users(id),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

const TASK_COLUMNS: &str =
    "id, title, image_url, status, group_id, created_by, created_at, updated_at";

/// Task completion state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Todo,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::Done => "done",
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(TaskStatus::Todo),
            "done" => Ok(TaskStatus::Done),
            other => Err(format!("Unknown task status: {}", other)),
        }
    }
}

/// Task model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,

    /// Public path of the attached image (e.g. `/uploads/cat_<uuid>.png`)
    pub image_url: Option<String>,

    pub status: TaskStatus,
    pub group_id: Uuid,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTask {
    pub title: String,
    pub image_url: Option<String>,
    pub group_id: Uuid,
    pub created_by: Uuid,
}

/// Partial update of task fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub title: Option<String>,
    pub status: Option<TaskStatus>,
    pub image_url: Option<String>,
}

impl Task {
    /// Inserts a task
    ///
    /// # Errors
    ///
    /// Fails with a foreign key violation if the group was deleted in between
    pub async fn create(pool: &PgPool, data: CreateTask) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO tasks (title, image_url, group_id, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING {TASK_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Task>(&query)
            .bind(data.title)
            .bind(data.image_url)
            .bind(data.group_id)
            .bind(data.created_by)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1");

        sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lists tasks, newest first
    ///
    /// `group_ids = None` lists every task; otherwise only tasks whose group
    /// is in the slice.
    pub async fn list(pool: &PgPool, group_ids: Option<&[Uuid]>) -> Result<Vec<Self>, sqlx::Error> {
        match group_ids {
            Some(ids) => {
                let query = format!(
                    "SELECT {TASK_COLUMNS} FROM tasks WHERE group_id = ANY($1) ORDER BY created_at DESC"
                );
                sqlx::query_as::<_, Task>(&query).bind(ids).fetch_all(pool).await
            }
            None => {
                let query = format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY created_at DESC");
                sqlx::query_as::<_, Task>(&query).fetch_all(pool).await
            }
        }
    }

    /// Applies a partial update and bumps `updated_at`
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        patch: TaskPatch,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE tasks
            SET title = COALESCE($2, title),
                status = COALESCE($3, status),
                image_url = COALESCE($4, image_url),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {TASK_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .bind(patch.title)
            .bind(patch.status)
            .bind(patch.image_url)
            .fetch_optional(pool)
            .await
    }

    /// Deletes a task, returning whether it existed
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
