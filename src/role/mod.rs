//! Role hierarchy, karma milestones and access checks.
//!
//! Everything here is a pure function of a role and a karma total. Writing a
//! promotion back to the database lives in [`promotion`].

pub mod promotion;

pub use crate::orm::sea_orm_active_enums::Role;

use serde::Serialize;

/// Karma needed to be promoted to editor.
pub const EDITOR_KARMA: i32 = 100;
/// Karma needed to be promoted to moderator.
pub const MODERATOR_KARMA: i32 = 2000;

/// Ranks reachable through karma, lowest first.
/// Admin ranks are only ever assigned by another administrator.
pub const PROMOTABLE_ROLES: [(Role, i32); 2] =
    [(Role::Editor, EDITOR_KARMA), (Role::Moderator, MODERATOR_KARMA)];

impl Role {
    /// Position in the hierarchy; higher outranks lower.
    pub fn level(self) -> u8 {
        match self {
            Role::User => 0,
            Role::Editor => 1,
            Role::Moderator => 2,
            Role::Admin => 3,
            Role::SuperAdmin => 4,
        }
    }

    /// Karma threshold for ranks reachable through karma.
    pub fn required_karma(self) -> Option<i32> {
        PROMOTABLE_ROLES
            .iter()
            .find(|(role, _)| *role == self)
            .map(|(_, karma)| *karma)
    }
}

/// The next karma-reachable rank and how close the user is to it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct RoleMilestone {
    pub next_role: Option<Role>,
    pub required_karma: Option<i32>,
    /// 0 to 100.
    pub progress: f64,
}

impl RoleMilestone {
    fn none() -> Self {
        Self {
            next_role: None,
            required_karma: None,
            progress: 100.0,
        }
    }
}

/// First promotable rank above `current_role` whose threshold has not been
/// passed yet. Users at moderator or above have no next milestone.
pub fn get_next_role_milestone(current_karma: i32, current_role: Role) -> RoleMilestone {
    for (role, required) in PROMOTABLE_ROLES {
        if role.level() > current_role.level() && current_karma <= required {
            let progress = (current_karma.max(0) as f64 / required as f64 * 100.0).min(100.0);
            return RoleMilestone {
                next_role: Some(role),
                required_karma: Some(required),
                progress,
            };
        }
    }

    RoleMilestone::none()
}

/// Rank the user should be promoted to, if any.
///
/// Picks the highest karma-reachable rank above the current one whose
/// threshold is met, so a user who jumps past a threshold in one award is
/// still promoted. Never returns an admin rank.
pub fn should_promote_user(current_karma: i32, current_role: Role) -> Option<Role> {
    PROMOTABLE_ROLES
        .iter()
        .rev()
        .find(|(role, required)| {
            role.level() > current_role.level() && current_karma >= *required
        })
        .map(|(role, _)| *role)
}

pub fn has_role_level(role: Role, required: Role) -> bool {
    role.level() >= required.level()
}

pub fn has_admin_access(role: Role) -> bool {
    has_role_level(role, Role::Admin)
}

pub fn has_moderator_access(role: Role) -> bool {
    has_role_level(role, Role::Moderator)
}

/// Editors and above may approve content.
pub fn has_editor_access(role: Role) -> bool {
    has_role_level(role, Role::Editor)
}

/// Only a strictly higher rank may change someone's role.
pub fn can_modify_role(actor: Role, target: Role) -> bool {
    actor.level() > target.level()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hierarchy_order() {
        let ordered = [
            Role::User,
            Role::Editor,
            Role::Moderator,
            Role::Admin,
            Role::SuperAdmin,
        ];
        for pair in ordered.windows(2) {
            assert!(pair[0].level() < pair[1].level());
        }
    }

    #[test]
    fn test_required_karma() {
        assert_eq!(Role::Editor.required_karma(), Some(100));
        assert_eq!(Role::Moderator.required_karma(), Some(2000));
        assert_eq!(Role::Admin.required_karma(), None);
        assert_eq!(Role::User.required_karma(), None);
    }

    #[test]
    fn test_milestone_for_new_user() {
        let milestone = get_next_role_milestone(0, Role::User);
        assert_eq!(milestone.next_role, Some(Role::Editor));
        assert_eq!(milestone.required_karma, Some(100));
        assert_eq!(milestone.progress, 0.0);
    }

    #[test]
    fn test_milestone_progress() {
        let milestone = get_next_role_milestone(50, Role::User);
        assert_eq!(milestone.next_role, Some(Role::Editor));
        assert_eq!(milestone.progress, 50.0);

        let milestone = get_next_role_milestone(100, Role::User);
        assert_eq!(milestone.next_role, Some(Role::Editor));
        assert_eq!(milestone.progress, 100.0);
    }

    #[test]
    fn test_milestone_skips_passed_threshold() {
        let milestone = get_next_role_milestone(500, Role::User);
        assert_eq!(milestone.next_role, Some(Role::Moderator));
        assert_eq!(milestone.progress, 25.0);
    }

    #[test]
    fn test_milestone_for_editor() {
        let milestone = get_next_role_milestone(1000, Role::Editor);
        assert_eq!(milestone.next_role, Some(Role::Moderator));
        assert_eq!(milestone.progress, 50.0);
    }

    #[test]
    fn test_no_milestone_above_moderator() {
        for role in [Role::Moderator, Role::Admin, Role::SuperAdmin] {
            let milestone = get_next_role_milestone(10, role);
            assert_eq!(milestone.next_role, None);
            assert_eq!(milestone.progress, 100.0);
        }
        let milestone = get_next_role_milestone(5000, Role::User);
        assert_eq!(milestone.next_role, None);
        assert_eq!(milestone.progress, 100.0);
    }

    #[test]
    fn test_promotion_boundary() {
        assert_eq!(should_promote_user(100, Role::User), Some(Role::Editor));
        assert_eq!(should_promote_user(99, Role::User), None);
        assert_eq!(should_promote_user(2000, Role::Editor), Some(Role::Moderator));
        assert_eq!(should_promote_user(1999, Role::Editor), None);
    }

    #[test]
    fn test_promotion_past_threshold() {
        assert_eq!(should_promote_user(119, Role::User), Some(Role::Editor));
        assert_eq!(should_promote_user(2500, Role::User), Some(Role::Moderator));
    }

    #[test]
    fn test_promotion_capped_below_admin() {
        assert_eq!(should_promote_user(1_000_000, Role::Moderator), None);
        assert_eq!(should_promote_user(1_000_000, Role::Admin), None);
        assert_eq!(should_promote_user(150, Role::Editor), None);
    }

    #[test]
    fn test_can_modify_role() {
        assert!(!can_modify_role(Role::Moderator, Role::Moderator));
        assert!(can_modify_role(Role::Admin, Role::Moderator));
        assert!(!can_modify_role(Role::User, Role::Admin));
        assert!(can_modify_role(Role::SuperAdmin, Role::Admin));
        assert!(!can_modify_role(Role::Moderator, Role::Admin));
    }

    #[test]
    fn test_access_helpers() {
        assert!(!has_editor_access(Role::User));
        assert!(has_editor_access(Role::Editor));
        assert!(has_editor_access(Role::SuperAdmin));
        assert!(!has_moderator_access(Role::Editor));
        assert!(has_moderator_access(Role::Moderator));
        assert!(!has_admin_access(Role::Moderator));
        assert!(has_admin_access(Role::Admin));
        assert!(has_role_level(Role::Admin, Role::Admin));
    }
}
