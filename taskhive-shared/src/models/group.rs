/// Group model and database operations
///
/// A group owns tasks and a chat room. Its member set is stored inline as a
/// `UUID[]` column so that every membership change is a single-row update,
/// which PostgreSQL applies atomically.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE group_visibility AS ENUM ('public', 'private');
///
/// CREATE TABLE groups (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(100) NOT NULL,
///     description TEXT,
///     visibility group_visibility NOT NULL DEFAULT 'private',
///     owner_id UUID NOT NULL REFERENCES users(id),
///     member_ids UUID[] NOT NULL DEFAULT '{}',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Invariant
///
/// `owner_id` is always contained in `member_ids`. The group service keeps it
/// that way; the queries here do not check it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

const GROUP_COLUMNS: &str =
    "id, name, description, visibility, owner_id, member_ids, created_at, updated_at";

/// Who can discover and join a group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "group_visibility", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Listed to everyone, open to join
    Public,

    /// Only visible to members, joined via admin member overwrite
    #[default]
    Private,
}

impl Visibility {
    /// Converts visibility to string for display
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

/// Group model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Unique group ID
    pub id: Uuid,

    /// Group name
    pub name: String,

    /// Optional free-form description
    pub description: Option<String>,

    /// Public or private
    pub visibility: Visibility,

    /// Creator of the group; never reassigned
    pub owner_id: Uuid,

    /// Members in join order, owner included
    pub member_ids: Vec<Uuid>,

    /// When the group was created
    pub created_at: DateTime<Utc>,

    /// When the group was last modified (fields or membership)
    pub updated_at: DateTime<Utc>,
}

impl Group {
    /// Returns true if `user_id` is in the member set
    pub fn is_member(&self, user_id: Uuid) -> bool {
        self.member_ids.contains(&user_id)
    }

    /// Returns true if `user_id` owns the group
    pub fn is_owner(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id
    }
}

/// Input for creating a new group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGroup {
    pub name: String,
    pub description: Option<String>,
    pub visibility: Visibility,
    pub owner_id: Uuid,
}

/// Partial update of group fields
///
/// Owner and members are deliberately absent: ownership is fixed and
/// membership only changes through join, leave, or member overwrite.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPatch {
    pub name: Option<String>,

    /// An empty string clears the description
    pub description: Option<String>,

    pub visibility: Option<Visibility>,
}

impl GroupPatch {
    /// Returns true if no field would change
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.visibility.is_none()
    }
}

impl Group {
    /// Creates a new group with the owner as its only member
    ///
    /// # Errors
    ///
    /// Returns an error if the owner doesn't exist or the database fails
    pub async fn create(pool: &PgPool, data: CreateGroup) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO groups (name, description, visibility, owner_id, member_ids)
            VALUES ($1, $2, $3, $4, ARRAY[$4]::UUID[])
            RETURNING {GROUP_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Group>(&query)
            .bind(data.name)
            .bind(data.description)
            .bind(data.visibility)
            .bind(data.owner_id)
            .fetch_one(pool)
            .await
    }

    /// Finds a group by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {GROUP_COLUMNS} FROM groups WHERE id = $1");

        sqlx::query_as::<_, Group>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lists groups that are public or that the user belongs to
    ///
    /// Most recently updated first.
    pub async fn list_visible(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {GROUP_COLUMNS}
            FROM groups
            WHERE visibility = 'public' OR $1 = ANY(member_ids)
            ORDER BY updated_at DESC
            "#
        );

        sqlx::query_as::<_, Group>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Lists every group, newest first (admin view)
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!("SELECT {GROUP_COLUMNS} FROM groups ORDER BY created_at DESC");

        sqlx::query_as::<_, Group>(&query).fetch_all(pool).await
    }

    /// Applies a partial update and bumps `updated_at`
    ///
    /// Only fields present in `patch` are written.
    ///
    /// # Returns
    ///
    /// The updated group, or None if it doesn't exist
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        patch: GroupPatch,
    ) -> Result<Option<Self>, sqlx::Error> {
        // Build dynamic update query based on which fields are present
        let mut query = String::from("UPDATE groups SET updated_at = NOW()");
        let mut bind_count = 1;

        if patch.name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", name = ${}", bind_count));
        }
        if patch.description.is_some() {
            bind_count += 1;
            query.push_str(&format!(", description = NULLIF(${}, '')", bind_count));
        }
        if patch.visibility.is_some() {
            bind_count += 1;
            query.push_str(&format!(", visibility = ${}", bind_count));
        }

        query.push_str(&format!(" WHERE id = $1 RETURNING {GROUP_COLUMNS}"));

        let mut q = sqlx::query_as::<_, Group>(&query).bind(id);

        if let Some(name) = patch.name {
            q = q.bind(name);
        }
        if let Some(description) = patch.description {
            q = q.bind(description);
        }
        if let Some(visibility) = patch.visibility {
            q = q.bind(visibility);
        }

        q.fetch_optional(pool).await
    }

    /// Appends a member unless already present
    ///
    /// The membership check and the append happen in one statement.
    ///
    /// # Returns
    ///
    /// The updated group, or None if the group is missing or the user was
    /// already a member
    pub async fn add_member(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE groups
            SET member_ids = array_append(member_ids, $2), updated_at = NOW()
            WHERE id = $1 AND NOT ($2 = ANY(member_ids))
            RETURNING {GROUP_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Group>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Removes a member (no-op if absent)
    pub async fn remove_member(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE groups
            SET member_ids = array_remove(member_ids, $2), updated_at = NOW()
            WHERE id = $1
            RETURNING {GROUP_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Group>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Overwrites the whole member set
    pub async fn replace_members(
        pool: &PgPool,
        id: Uuid,
        member_ids: &[Uuid],
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE groups
            SET member_ids = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {GROUP_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Group>(&query)
            .bind(id)
            .bind(member_ids)
            .fetch_optional(pool)
            .await
    }

    /// Deletes a group together with all of its tasks
    ///
    /// Both deletes run in one transaction, so a failure leaves neither
    /// orphaned tasks nor a half-deleted group. Chat messages are kept.
    ///
    /// # Returns
    ///
    /// Number of tasks removed, or None if the group didn't exist
    pub async fn delete_with_tasks(pool: &PgPool, id: Uuid) -> Result<Option<u64>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let tasks = sqlx::query("DELETE FROM tasks WHERE group_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let groups = sqlx::query("DELETE FROM groups WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if groups.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(tasks.rows_affected()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_defaults_to_private() {
        assert_eq!(Visibility::default(), Visibility::Private);
        assert_eq!(Visibility::Public.as_str(), "public");
        assert_eq!(Visibility::Private.as_str(), "private");
    }

    #[test]
    fn test_visibility_wire_format() {
        let v: Visibility = serde_json::from_str("\"public\"").unwrap();
        assert_eq!(v, Visibility::Public);
        assert!(serde_json::from_str::<Visibility>("\"secret\"").is_err());
    }

    #[test]
    fn test_membership_helpers() {
        let owner = Uuid::new_v4();
        let member = Uuid::new_v4();
        let group = Group {
            id: Uuid::new_v4(),
            name: "Chores".to_string(),
            description: None,
            visibility: Visibility::Private,
            owner_id: owner,
            member_ids: vec![owner, member],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert!(group.is_owner(owner));
        assert!(!group.is_owner(member));
        assert!(group.is_member(member));
        assert!(!group.is_member(Uuid::new_v4()));
    }

    #[test]
    fn test_patch_is_empty() {
        assert!(GroupPatch::default().is_empty());
        let patch = GroupPatch {
            visibility: Some(Visibility::Public),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
