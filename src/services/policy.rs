//! Single declarative role policy. Handlers ask `allows(role, resource,
//! action)` (through `Session::require`) instead of matching roles inline.
//! Row-level narrowing, such as parents seeing only their own children,
//! happens in the services after this check passes.

use crate::{error::AppError, models::auth::Session, models::user::Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Users,
    Schools,
    Classrooms,
    Enrollments,
    Students,
    ParentLinks,
    Announcements,
    Attendance,
    Conversations,
    Messages,
    GradeCategories,
    Assignments,
    Scores,
    Grades,
    Forms,
    FormDecisions,
    Progression,
    Subscription,
    AuditLog,
    Dashboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

const ALL: &[Role] = &[Role::Admin, Role::Teacher, Role::Parent];
const STAFF: &[Role] = &[Role::Admin, Role::Teacher];
const ADMIN: &[Role] = &[Role::Admin];
const PARENT: &[Role] = &[Role::Parent];
const NONE: &[Role] = &[];

fn permitted(resource: Resource, action: Action) -> &'static [Role] {
    use Action::*;
    use Resource::*;

    match (resource, action) {
        (Users, _) => ADMIN,

        (Schools, Read) => ALL,
        (Schools, Create | Update) => ADMIN,
        (Classrooms, Read) => STAFF,
        (Classrooms, Create | Update) => ADMIN,
        (Enrollments, Create) => ADMIN,
        (Students, Read) => ALL,
        (Students, Create | Update) => ADMIN,
        (ParentLinks, Read) => STAFF,
        (ParentLinks, Create) => ADMIN,

        (Announcements, Read) => ALL,
        (Announcements, Create | Update | Delete) => STAFF,

        (Attendance, Read) => STAFF,
        (Attendance, Create | Update) => STAFF,

        (Conversations, Read | Create) => ALL,
        (Messages, Read | Create | Update) => ALL,

        (GradeCategories, Read) => ALL,
        (GradeCategories, Create) => STAFF,
        (Assignments, Read) => ALL,
        (Assignments, Create | Update) => STAFF,
        (Scores, Update) => STAFF,
        (Grades, Read) => ALL,

        (Forms, Read) => ALL,
        (Forms, Create) => PARENT,
        (FormDecisions, Update) => STAFF,

        (Progression, Read) => ALL,
        (Progression, Create) => STAFF,

        (Subscription, Read | Update) => ADMIN,
        (AuditLog, Read) => ADMIN,
        (Dashboard, Read) => ALL,

        _ => NONE,
    }
}

pub fn allows(role: Role, resource: Resource, action: Action) -> bool {
    permitted(resource, action).contains(&role)
}

impl Session {
    /// Fails with `RoleNotPermitted` unless the caller's role may perform
    /// `action` on `resource`.
    pub fn require(&self, resource: Resource, action: Action) -> Result<(), AppError> {
        if allows(self.role, resource, action) {
            Ok(())
        } else {
            tracing::debug!(
                user = %self.user_id,
                role = %self.role,
                ?resource,
                ?action,
                "role not permitted"
            );
            Err(AppError::RoleNotPermitted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_admins_manage_users() {
        for action in [Action::Read, Action::Create, Action::Update, Action::Delete] {
            assert!(allows(Role::Admin, Resource::Users, action));
            assert!(!allows(Role::Teacher, Resource::Users, action));
            assert!(!allows(Role::Parent, Resource::Users, action));
        }
    }

    #[test]
    fn staff_write_attendance_and_announcements() {
        for resource in [Resource::Attendance, Resource::Announcements] {
            assert!(allows(Role::Admin, resource, Action::Create));
            assert!(allows(Role::Teacher, resource, Action::Create));
            assert!(!allows(Role::Parent, resource, Action::Create));
        }
        assert!(allows(Role::Parent, Resource::Announcements, Action::Read));
    }

    #[test]
    fn only_parents_submit_forms_and_only_staff_decide() {
        assert!(allows(Role::Parent, Resource::Forms, Action::Create));
        assert!(!allows(Role::Teacher, Resource::Forms, Action::Create));
        assert!(!allows(Role::Admin, Resource::Forms, Action::Create));

        assert!(allows(Role::Teacher, Resource::FormDecisions, Action::Update));
        assert!(allows(Role::Admin, Resource::FormDecisions, Action::Update));
        assert!(!allows(Role::Parent, Resource::FormDecisions, Action::Update));
    }

    #[test]
    fn unlisted_pairs_are_denied() {
        assert!(!allows(Role::Admin, Resource::AuditLog, Action::Delete));
        assert!(!allows(Role::Admin, Resource::Subscription, Action::Delete));
        assert!(!allows(Role::Admin, Resource::Forms, Action::Delete));
    }
}
