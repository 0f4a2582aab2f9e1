/// Group lifecycle
///
/// Every operation follows the same shape: load the group, ask the
/// authorization engine, then make one store call. The group is re-read on
/// each call, so decisions always reflect the current member set.
///
/// The owner is a member of their group after every operation here, including
/// the admin member overwrite.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use taskhive_shared::auth::authorization::Actor;
/// use taskhive_shared::groups::{GroupService, NewGroup};
/// use taskhive_shared::models::group::Visibility;
/// use taskhive_shared::models::user::CreateUser;
/// use taskhive_shared::store::{memory::MemoryStore, UserStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = Arc::new(MemoryStore::new());
/// let owner = store.create_user(CreateUser {
///     email: "owner@example.com".to_string(),
///     display_name: "Owner".to_string(),
///     password_hash: "hash".to_string(),
///     is_admin: false,
/// }).await?;
///
/// let groups = GroupService::new(store);
/// let group = groups.create(&Actor::user(owner.id), NewGroup {
///     name: "Household".to_string(),
///     description: None,
///     visibility: Visibility::Public,
/// }).await?;
/// assert_eq!(group.member_ids, vec![owner.id]);
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::authorization::{can_perform, Actor, AuthzError, GroupAction};
use crate::models::group::{CreateGroup, Group, GroupPatch, Visibility};
use crate::store::{Store, StoreError};

/// Longest accepted group name, in characters
pub const MAX_GROUP_NAME_LENGTH: usize = 100;

/// Error type for group operations
#[derive(Debug, thiserror::Error)]
pub enum GroupError {
    #[error("Group not found")]
    NotFound,

    #[error("{0}")]
    Forbidden(String),

    #[error("Already a member of this group")]
    AlreadyMember,

    #[error("Group owner cannot leave the group")]
    OwnerCannotLeave,

    #[error("Not a member of this group")]
    NotMember,

    /// Input rejected; carries the offending field and a message
    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<AuthzError> for GroupError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::AlreadyMember => GroupError::AlreadyMember,
            AuthzError::OwnerCannotLeave => GroupError::OwnerCannotLeave,
            AuthzError::NotMember => GroupError::NotMember,
            other => GroupError::Forbidden(other.to_string()),
        }
    }
}

/// Input for [`GroupService::create`]
#[derive(Debug, Clone)]
pub struct NewGroup {
    pub name: String,
    pub description: Option<String>,
    pub visibility: Visibility,
}

/// Trims and checks a group name
pub fn normalize_group_name(name: &str) -> Result<String, GroupError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(GroupError::Validation {
            field: "name",
            message: "Group name is required".to_string(),
        });
    }
    if name.chars().count() > MAX_GROUP_NAME_LENGTH {
        return Err(GroupError::Validation {
            field: "name",
            message: format!("Group name must be at most {} characters", MAX_GROUP_NAME_LENGTH),
        });
    }
    Ok(name.to_string())
}

/// Group lifecycle operations over a shared store
#[derive(Clone)]
pub struct GroupService {
    store: Arc<dyn Store>,
}

impl GroupService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Loads a group or fails with `NotFound`
    pub async fn load(&self, group_id: Uuid) -> Result<Group, GroupError> {
        self.store
            .find_group(group_id)
            .await?
            .ok_or(GroupError::NotFound)
    }

    /// Loads a group and checks `action` against it
    pub async fn authorize(
        &self,
        actor: &Actor,
        group_id: Uuid,
        action: GroupAction,
    ) -> Result<Group, GroupError> {
        let group = self.load(group_id).await?;
        can_perform(actor, &group, action)?;
        Ok(group)
    }

    /// Creates a group owned by `actor`, who becomes its only member
    pub async fn create(&self, actor: &Actor, input: NewGroup) -> Result<Group, GroupError> {
        let name = normalize_group_name(&input.name)?;
        let description = input
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let group = self
            .store
            .insert_group(CreateGroup {
                name,
                description,
                visibility: input.visibility,
                owner_id: actor.user_id,
            })
            .await?;

        info!(group_id = %group.id, owner_id = %actor.user_id, visibility = group.visibility.as_str(), "Group created");
        Ok(group)
    }

    /// Public groups plus the ones `actor` belongs to
    pub async fn list_visible(&self, actor: &Actor) -> Result<Vec<Group>, GroupError> {
        Ok(self.store.list_visible_groups(actor.user_id).await?)
    }

    /// Every group; admins only
    pub async fn list_all(&self, actor: &Actor) -> Result<Vec<Group>, GroupError> {
        if !actor.is_admin {
            return Err(GroupError::Forbidden("Admin access required".to_string()));
        }
        Ok(self.store.list_all_groups().await?)
    }

    pub async fn join(&self, actor: &Actor, group_id: Uuid) -> Result<Group, GroupError> {
        self.authorize(actor, group_id, GroupAction::Join).await?;

        // A concurrent join may have landed since the check
        let group = match self.store.add_member(group_id, actor.user_id).await? {
            Some(group) => group,
            None => {
                let current = self.load(group_id).await?;
                return Err(if current.is_member(actor.user_id) {
                    GroupError::AlreadyMember
                } else {
                    GroupError::NotFound
                });
            }
        };

        info!(group_id = %group_id, user_id = %actor.user_id, "User joined group");
        Ok(group)
    }

    pub async fn leave(&self, actor: &Actor, group_id: Uuid) -> Result<Group, GroupError> {
        self.authorize(actor, group_id, GroupAction::Leave).await?;

        let group = self
            .store
            .remove_member(group_id, actor.user_id)
            .await?
            .ok_or(GroupError::NotFound)?;

        info!(group_id = %group_id, user_id = %actor.user_id, "User left group");
        Ok(group)
    }

    /// Overwrites the member set
    ///
    /// The owner is kept (placed first if missing), duplicates are dropped
    /// keeping the first occurrence, and every id must be an existing user.
    pub async fn update_members(
        &self,
        actor: &Actor,
        group_id: Uuid,
        member_ids: Vec<Uuid>,
    ) -> Result<Group, GroupError> {
        let group = self
            .authorize(actor, group_id, GroupAction::ManageMembers)
            .await?;

        let mut members = Vec::with_capacity(member_ids.len() + 1);
        if !member_ids.contains(&group.owner_id) {
            members.push(group.owner_id);
        }
        for id in member_ids {
            if !members.contains(&id) {
                members.push(id);
            }
        }

        let known = self.store.find_users(&members).await?;
        let unknown: Vec<String> = members
            .iter()
            .filter(|id| !known.iter().any(|u| u.id == **id))
            .map(|id| id.to_string())
            .collect();
        if !unknown.is_empty() {
            return Err(GroupError::Validation {
                field: "memberIds",
                message: format!("Unknown users: {}", unknown.join(", ")),
            });
        }

        let group = self
            .store
            .replace_members(group_id, &members)
            .await?
            .ok_or(GroupError::NotFound)?;

        info!(group_id = %group_id, actor_id = %actor.user_id, member_count = group.member_ids.len(), "Group members replaced");
        Ok(group)
    }

    /// Updates name, description or visibility
    pub async fn update(
        &self,
        actor: &Actor,
        group_id: Uuid,
        mut patch: GroupPatch,
    ) -> Result<Group, GroupError> {
        let group = self
            .authorize(actor, group_id, GroupAction::UpdateGroup)
            .await?;

        if let Some(name) = patch.name.take() {
            patch.name = Some(normalize_group_name(&name)?);
        }
        // Blank clears the description, same as omitting it at create
        patch.description = patch.description.map(|d| d.trim().to_string());
        if patch.is_empty() {
            debug!(group_id = %group_id, "Empty group patch, nothing to update");
            return Ok(group);
        }

        let group = self
            .store
            .update_group(group_id, patch)
            .await?
            .ok_or(GroupError::NotFound)?;

        info!(group_id = %group_id, actor_id = %actor.user_id, "Group updated");
        Ok(group)
    }

    /// Deletes the group and all of its tasks; returns the task count removed
    pub async fn delete(&self, actor: &Actor, group_id: Uuid) -> Result<u64, GroupError> {
        self.authorize(actor, group_id, GroupAction::DeleteGroup)
            .await?;

        let deleted_tasks = self
            .store
            .delete_group_cascade(group_id)
            .await?
            .ok_or(GroupError::NotFound)?;

        info!(group_id = %group_id, actor_id = %actor.user_id, deleted_tasks, "Group deleted");
        Ok(deleted_tasks)
    }
}
