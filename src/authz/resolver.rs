use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use uuid::Uuid;

use super::catalog::{Permission, ProjectRole, Role};
use super::snapshot::ResolvedPermissionSnapshot;
use super::store::RoleAssignmentStore;
use crate::errors::{AppError, AppResult};

/// Computes a [`ResolvedPermissionSnapshot`] from stored role assignments.
///
/// Read-only and idempotent: concurrent resolutions for the same user share
/// nothing and need no locking.
#[derive(Clone)]
pub struct PermissionResolver {
    store: Arc<dyn RoleAssignmentStore>,
}

impl PermissionResolver {
    pub fn new(store: Arc<dyn RoleAssignmentStore>) -> Self {
        Self { store }
    }

    /// Resolution steps:
    /// 1. global role -> global permissions (unknown or missing role grants nothing)
    /// 2. each membership row -> that project's permissions and role
    /// 3. accessible projects = member projects, plus every project when the
    ///    global set contains `project:view_all`
    pub async fn resolve(&self, user_id: Uuid) -> AppResult<ResolvedPermissionSnapshot> {
        let record = self
            .store
            .fetch_user_role(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("user not found"))?;

        let global_role = match record.role.as_deref() {
            Some(name) => match name.parse::<Role>() {
                Ok(role) => Some(role),
                Err(err) => {
                    tracing::warn!(user_id = %user_id, error = %err, "unrecognised global role, granting nothing");
                    None
                }
            },
            None => None,
        };

        let global_permissions: HashSet<Permission> = global_role
            .map(|role| role.permissions().iter().copied().collect())
            .unwrap_or_default();

        let mut project_permissions = HashMap::new();
        let mut project_roles = HashMap::new();

        for membership in self.store.fetch_memberships(user_id).await? {
            let role = match membership.project_role.parse::<ProjectRole>() {
                Ok(role) => role,
                Err(err) => {
                    tracing::warn!(
                        user_id = %user_id,
                        project_id = %membership.project_id,
                        error = %err,
                        "skipping membership with unrecognised project role"
                    );
                    continue;
                }
            };

            project_permissions.insert(
                membership.project_id,
                role.permissions().iter().copied().collect::<HashSet<_>>(),
            );
            project_roles.insert(membership.project_id, role);
        }

        let mut accessible_projects: HashSet<Uuid> = project_permissions.keys().copied().collect();
        if global_permissions.contains(&Permission::ProjectViewAll) {
            accessible_projects.extend(self.store.fetch_project_ids().await?);
        }

        tracing::debug!(
            user_id = %user_id,
            role = ?global_role,
            projects = project_roles.len(),
            accessible = accessible_projects.len(),
            "resolved permissions"
        );

        Ok(ResolvedPermissionSnapshot {
            user_id,
            global_role,
            global_permissions,
            project_permissions,
            project_roles,
            accessible_projects,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::store::InMemoryRoleStore;

    fn resolver(store: InMemoryRoleStore) -> PermissionResolver {
        PermissionResolver::new(Arc::new(store))
    }

    #[tokio::test]
    async fn missing_user_is_not_found() {
        let resolver = resolver(InMemoryRoleStore::new());
        let err = resolver.resolve(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn missing_role_grants_nothing() {
        let user = Uuid::new_v4();
        let resolver = resolver(InMemoryRoleStore::new().with_user(user, None));

        let snapshot = resolver.resolve(user).await.unwrap();
        assert_eq!(snapshot.global_role, None);
        assert!(snapshot.global_permissions.is_empty());
        assert!(snapshot.accessible_projects.is_empty());
    }

    #[tokio::test]
    async fn unknown_role_name_grants_nothing() {
        let user = Uuid::new_v4();
        let store = InMemoryRoleStore::new();
        store.insert_user_raw(user, Some("root".to_string()));

        let snapshot = resolver(store).resolve(user).await.unwrap();
        assert_eq!(snapshot.global_role, None);
        assert!(snapshot.global_permissions.is_empty());
    }

    #[tokio::test]
    async fn membership_with_unknown_project_role_is_skipped() {
        let user = Uuid::new_v4();
        let project = Uuid::new_v4();
        let store = InMemoryRoleStore::new()
            .with_user(user, Some(Role::TeamMember))
            .with_project(project);
        store.insert_membership_raw(user, project, "project_owner");

        let snapshot = resolver(store).resolve(user).await.unwrap();
        assert!(snapshot.project_permissions.is_empty());
        assert!(!snapshot.can_access_project(project));
    }

    #[tokio::test]
    async fn team_member_with_project_manager_role_on_one_project() {
        let user = Uuid::new_v4();
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        let resolver = resolver(
            InMemoryRoleStore::new()
                .with_user(user, Some(Role::TeamMember))
                .with_project(p1)
                .with_project(p2)
                .with_membership(user, p1, ProjectRole::ProjectManager),
        );

        let snapshot = resolver.resolve(user).await.unwrap();
        assert!(snapshot.has_permission(Permission::ProjectUpdate, Some(p1)));
        assert!(!snapshot.has_permission(Permission::ProjectUpdate, Some(p2)));
        assert!(snapshot.can_access_project(p1));
        assert!(!snapshot.can_access_project(p2));
        assert_eq!(snapshot.project_role(p1), Some(ProjectRole::ProjectManager));
    }

    #[tokio::test]
    async fn admin_without_memberships_reaches_every_project() {
        let user = Uuid::new_v4();
        let projects: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let mut store = InMemoryRoleStore::new().with_user(user, Some(Role::Admin));
        for project in &projects {
            store = store.with_project(*project);
        }

        let snapshot = resolver(store).resolve(user).await.unwrap();
        for project in &projects {
            assert!(snapshot.can_access_project(*project));
        }
        assert!(snapshot.has_permission(Permission::UserDelete, None));
        assert!(!snapshot.has_permission(Permission::TestExecutionCreate, None));
        assert!(snapshot.project_permissions.is_empty());
    }

    #[tokio::test]
    async fn accessible_projects_match_membership_or_view_all() {
        let member = Uuid::new_v4();
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        let store = InMemoryRoleStore::new()
            .with_user(member, Some(Role::Viewer))
            .with_project(p1)
            .with_project(p2)
            .with_membership(member, p2, ProjectRole::ProjectViewer);

        let snapshot = resolver(store).resolve(member).await.unwrap();
        assert_eq!(snapshot.accessible_projects, HashSet::from([p2]));
    }

    #[tokio::test]
    async fn store_failure_propagates_instead_of_granting() {
        let user = Uuid::new_v4();
        let store = Arc::new(InMemoryRoleStore::new().with_user(user, Some(Role::SuperAdmin)));
        store.set_unavailable(true);

        let resolver = PermissionResolver::new(store);
        assert!(resolver.resolve(user).await.is_err());
    }

    #[tokio::test]
    async fn resolution_is_idempotent() {
        let user = Uuid::new_v4();
        let project = Uuid::new_v4();
        let resolver = resolver(
            InMemoryRoleStore::new()
                .with_user(user, Some(Role::Tester))
                .with_project(project)
                .with_membership(user, project, ProjectRole::ProjectQaLead),
        );

        let (a, b) = tokio::join!(resolver.resolve(user), resolver.resolve(user));
        assert_eq!(a.unwrap(), b.unwrap());
    }
}
