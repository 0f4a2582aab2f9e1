/// Authorization engine
///
/// Decides whether an actor may perform an action on a group. Decisions are
/// pure: they look only at the actor (from the verified token) and the group
/// record as currently stored. Callers re-load the group for every request,
/// so nothing here is cached.
///
/// # Rules
///
/// Evaluated in order, first match wins:
///
/// 1. Admins may do anything, except leave a group they own
/// 2. `View`, `PostTask`, `PostMessage` require membership
/// 3. `Join` is refused for private groups and for existing members
/// 4. `Leave` is refused for the owner and for non-members
/// 5. `UpdateGroup`, `DeleteGroup`, `ManageMembers` require ownership
///
/// # Example
///
/// ```
/// use taskhive_shared::auth::authorization::{can_perform, Actor, AuthzError, GroupAction};
/// use taskhive_shared::models::group::{Group, Visibility};
/// use chrono::Utc;
/// use uuid::Uuid;
///
/// let owner = Uuid::new_v4();
/// let group = Group {
///     id: Uuid::new_v4(),
///     name: "Household".to_string(),
///     description: None,
///     visibility: Visibility::Private,
///     owner_id: owner,
///     member_ids: vec![owner],
///     created_at: Utc::now(),
///     updated_at: Utc::now(),
/// };
///
/// let outsider = Actor::user(Uuid::new_v4());
/// assert!(matches!(
///     can_perform(&outsider, &group, GroupAction::Join),
///     Err(AuthzError::Forbidden(_))
/// ));
/// assert!(can_perform(&Actor::user(owner), &group, GroupAction::DeleteGroup).is_ok());
/// ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::group::{Group, Visibility};

/// The authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub is_admin: bool,
}

impl Actor {
    pub fn user(user_id: Uuid) -> Self {
        Self {
            user_id,
            is_admin: false,
        }
    }

    pub fn admin(user_id: Uuid) -> Self {
        Self {
            user_id,
            is_admin: true,
        }
    }
}

/// Actions subject to authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupAction {
    View,
    PostTask,
    PostMessage,
    UpdateGroup,
    DeleteGroup,
    Join,
    Leave,
    ManageMembers,
}

impl GroupAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupAction::View => "view",
            GroupAction::PostTask => "post_task",
            GroupAction::PostMessage => "post_message",
            GroupAction::UpdateGroup => "update_group",
            GroupAction::DeleteGroup => "delete_group",
            GroupAction::Join => "join",
            GroupAction::Leave => "leave",
            GroupAction::ManageMembers => "manage_members",
        }
    }
}

/// Error type for authorization checks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    /// Actor lacks the required role or membership
    #[error("{0}")]
    Forbidden(String),

    /// Leave attempted by someone who isn't in the group
    #[error("Not a member of this group")]
    NotMember,

    /// Join attempted by an existing member
    #[error("Already a member of this group")]
    AlreadyMember,

    /// Owner attempted to leave
    #[error("Group owner cannot leave the group")]
    OwnerCannotLeave,
}

/// Decides whether `actor` may perform `action` on `group`
pub fn can_perform(actor: &Actor, group: &Group, action: GroupAction) -> Result<(), AuthzError> {
    let is_owner = group.is_owner(actor.user_id);
    let is_member = group.is_member(actor.user_id);

    if actor.is_admin {
        if action == GroupAction::Leave && is_owner {
            return Err(AuthzError::OwnerCannotLeave);
        }
        return Ok(());
    }

    match action {
        GroupAction::View | GroupAction::PostTask | GroupAction::PostMessage => {
            if is_member {
                Ok(())
            } else {
                Err(AuthzError::Forbidden(
                    "You must be a member of this group".to_string(),
                ))
            }
        }
        GroupAction::Join => {
            if group.visibility == Visibility::Private {
                Err(AuthzError::Forbidden(
                    "This group is private and cannot be joined".to_string(),
                ))
            } else if is_member {
                Err(AuthzError::AlreadyMember)
            } else {
                Ok(())
            }
        }
        GroupAction::Leave => {
            if is_owner {
                Err(AuthzError::OwnerCannotLeave)
            } else if !is_member {
                Err(AuthzError::NotMember)
            } else {
                Ok(())
            }
        }
        GroupAction::UpdateGroup | GroupAction::DeleteGroup | GroupAction::ManageMembers => {
            if is_owner {
                Ok(())
            } else {
                Err(AuthzError::Forbidden(
                    "Only the group owner can do this".to_string(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use GroupAction::*;

    const ALL_ACTIONS: [GroupAction; 8] = [
        View,
        PostTask,
        PostMessage,
        UpdateGroup,
        DeleteGroup,
        Join,
        Leave,
        ManageMembers,
    ];

    struct Fixture {
        owner: Uuid,
        member: Uuid,
        outsider: Uuid,
    }

    fn fixture() -> Fixture {
        Fixture {
            owner: Uuid::new_v4(),
            member: Uuid::new_v4(),
            outsider: Uuid::new_v4(),
        }
    }

    fn group(f: &Fixture, visibility: Visibility) -> Group {
        Group {
            id: Uuid::new_v4(),
            name: "g".to_string(),
            description: None,
            visibility,
            owner_id: f.owner,
            member_ids: vec![f.owner, f.member],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_admin_allowed_everything_on_foreign_group() {
        let f = fixture();
        let admin = Actor::admin(f.outsider);

        for visibility in [Visibility::Public, Visibility::Private] {
            let g = group(&f, visibility);
            for action in ALL_ACTIONS {
                assert_eq!(
                    can_perform(&admin, &g, action),
                    Ok(()),
                    "admin denied {}",
                    action.as_str()
                );
            }
        }
    }

    #[test]
    fn test_admin_owner_cannot_leave() {
        let f = fixture();
        let g = group(&f, Visibility::Public);

        assert_eq!(
            can_perform(&Actor::admin(f.owner), &g, Leave),
            Err(AuthzError::OwnerCannotLeave)
        );
    }

    #[test]
    fn test_member_actions_require_membership() {
        let f = fixture();
        let g = group(&f, Visibility::Public);

        for action in [View, PostTask, PostMessage] {
            assert!(can_perform(&Actor::user(f.owner), &g, action).is_ok());
            assert!(can_perform(&Actor::user(f.member), &g, action).is_ok());
            assert!(matches!(
                can_perform(&Actor::user(f.outsider), &g, action),
                Err(AuthzError::Forbidden(_))
            ));
        }
    }

    #[test]
    fn test_join_rules() {
        let f = fixture();

        let public = group(&f, Visibility::Public);
        assert!(can_perform(&Actor::user(f.outsider), &public, Join).is_ok());
        assert_eq!(
            can_perform(&Actor::user(f.member), &public, Join),
            Err(AuthzError::AlreadyMember)
        );

        // Private wins over already-member
        let private = group(&f, Visibility::Private);
        assert!(matches!(
            can_perform(&Actor::user(f.outsider), &private, Join),
            Err(AuthzError::Forbidden(_))
        ));
        assert!(matches!(
            can_perform(&Actor::user(f.member), &private, Join),
            Err(AuthzError::Forbidden(_))
        ));
    }

    #[test]
    fn test_leave_rules() {
        let f = fixture();
        let g = group(&f, Visibility::Private);

        assert!(can_perform(&Actor::user(f.member), &g, Leave).is_ok());
        assert_eq!(
            can_perform(&Actor::user(f.owner), &g, Leave),
            Err(AuthzError::OwnerCannotLeave)
        );
        assert_eq!(
            can_perform(&Actor::user(f.outsider), &g, Leave),
            Err(AuthzError::NotMember)
        );
    }

    #[test]
    fn test_owner_only_actions() {
        let f = fixture();
        let g = group(&f, Visibility::Public);

        for action in [UpdateGroup, DeleteGroup, ManageMembers] {
            assert!(can_perform(&Actor::user(f.owner), &g, action).is_ok());
            assert!(matches!(
                can_perform(&Actor::user(f.member), &g, action),
                Err(AuthzError::Forbidden(_))
            ));
            assert!(matches!(
                can_perform(&Actor::user(f.outsider), &g, action),
                Err(AuthzError::Forbidden(_))
            ));
        }
    }

    #[test]
    fn test_decisions_follow_current_group_state() {
        let f = fixture();
        let mut g = group(&f, Visibility::Public);

        g.member_ids.retain(|m| *m != f.member);
        assert!(can_perform(&Actor::user(f.member), &g, View).is_err());
        assert!(can_perform(&Actor::user(f.member), &g, Join).is_ok());
    }
}
