use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::catalog::{Permission, ProjectRole, Role};

/// Everything a user may do, computed from role assignments at one instant.
///
/// Not persisted. A snapshot is a pure function of the assignment rows it
/// was built from, so it only goes stale by being old.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPermissionSnapshot {
    pub user_id: Uuid,
    pub global_role: Option<Role>,
    pub global_permissions: HashSet<Permission>,
    pub project_permissions: HashMap<Uuid, HashSet<Permission>>,
    pub project_roles: HashMap<Uuid, ProjectRole>,
    pub accessible_projects: HashSet<Uuid>,
}

impl ResolvedPermissionSnapshot {
    /// A snapshot that grants nothing.
    pub fn empty(user_id: Uuid) -> Self {
        Self {
            user_id,
            global_role: None,
            global_permissions: HashSet::new(),
            project_permissions: HashMap::new(),
            project_roles: HashMap::new(),
            accessible_projects: HashSet::new(),
        }
    }

    /// Global grants always win; a project scope can only add.
    pub fn has_permission(&self, permission: Permission, project_id: Option<Uuid>) -> bool {
        if self.global_permissions.contains(&permission) {
            return true;
        }

        project_id
            .and_then(|id| self.project_permissions.get(&id))
            .map(|granted| granted.contains(&permission))
            .unwrap_or(false)
    }

    /// False for an empty list.
    pub fn has_any_permission(&self, permissions: &[Permission], project_id: Option<Uuid>) -> bool {
        permissions
            .iter()
            .any(|permission| self.has_permission(*permission, project_id))
    }

    /// True for an empty list.
    pub fn has_all_permissions(&self, permissions: &[Permission], project_id: Option<Uuid>) -> bool {
        permissions
            .iter()
            .all(|permission| self.has_permission(*permission, project_id))
    }

    pub fn can_access_project(&self, project_id: Uuid) -> bool {
        self.accessible_projects.contains(&project_id)
    }

    pub fn can_manage_project(&self, project_id: Uuid) -> bool {
        self.has_permission(Permission::ProjectUpdate, Some(project_id))
    }

    pub fn project_role(&self, project_id: Uuid) -> Option<ProjectRole> {
        self.project_roles.get(&project_id).copied()
    }

    pub fn to_response(&self) -> PermissionsResponse {
        PermissionsResponse::from(self)
    }
}

/// Wire document served by `GET /permissions/me`.
///
/// Collections are sorted so two snapshots with equal content serialize identically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PermissionsResponse {
    #[schema(example = json!(["project:view", "task:create"]))]
    pub global_permissions: Vec<String>,
    #[schema(value_type = Object)]
    pub project_permissions: BTreeMap<Uuid, Vec<String>>,
    #[schema(value_type = Object)]
    pub project_roles: BTreeMap<Uuid, String>,
    #[schema(example = "team_member")]
    pub user_role: Option<String>,
    pub accessible_projects: Vec<Uuid>,
}

fn sorted_names(permissions: &HashSet<Permission>) -> Vec<String> {
    permissions
        .iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|permission| permission.as_str().to_string())
        .collect()
}

impl From<&ResolvedPermissionSnapshot> for PermissionsResponse {
    fn from(snapshot: &ResolvedPermissionSnapshot) -> Self {
        let mut accessible_projects: Vec<Uuid> = snapshot.accessible_projects.iter().copied().collect();
        accessible_projects.sort();

        Self {
            global_permissions: sorted_names(&snapshot.global_permissions),
            project_permissions: snapshot
                .project_permissions
                .iter()
                .map(|(project_id, granted)| (*project_id, sorted_names(granted)))
                .collect(),
            project_roles: snapshot
                .project_roles
                .iter()
                .map(|(project_id, role)| (*project_id, role.as_str().to_string()))
                .collect(),
            user_role: snapshot.global_role.map(|role| role.as_str().to_string()),
            accessible_projects,
        }
    }
}

impl PermissionsResponse {
    /// Rebuild a snapshot from the wire form.
    ///
    /// Unknown permission or role names are dropped and reported back, so a
    /// newer server never widens what an older client grants.
    pub fn into_snapshot(self, user_id: Uuid) -> (ResolvedPermissionSnapshot, Vec<String>) {
        let mut unknown = Vec::new();

        let mut parse_all = |names: Vec<String>| -> HashSet<Permission> {
            names
                .into_iter()
                .filter_map(|name| match name.parse::<Permission>() {
                    Ok(permission) => Some(permission),
                    Err(_) => {
                        unknown.push(name);
                        None
                    }
                })
                .collect()
        };

        let global_permissions = parse_all(self.global_permissions);
        let project_permissions = self
            .project_permissions
            .into_iter()
            .map(|(project_id, names)| (project_id, parse_all(names)))
            .collect();

        let mut project_roles = HashMap::new();
        for (project_id, name) in self.project_roles {
            match name.parse::<ProjectRole>() {
                Ok(role) => {
                    project_roles.insert(project_id, role);
                }
                Err(_) => unknown.push(name),
            }
        }

        let global_role = match self.user_role {
            Some(name) => match name.parse::<Role>() {
                Ok(role) => Some(role),
                Err(_) => {
                    unknown.push(name);
                    None
                }
            },
            None => None,
        };

        let snapshot = ResolvedPermissionSnapshot {
            user_id,
            global_role,
            global_permissions,
            project_permissions,
            project_roles,
            accessible_projects: self.accessible_projects.into_iter().collect(),
        };

        (snapshot, unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_for(role: Role, memberships: &[(Uuid, ProjectRole)]) -> ResolvedPermissionSnapshot {
        let mut snapshot = ResolvedPermissionSnapshot::empty(Uuid::new_v4());
        snapshot.global_role = Some(role);
        snapshot.global_permissions = role.permissions().iter().copied().collect();
        for (project_id, project_role) in memberships {
            snapshot
                .project_permissions
                .insert(*project_id, project_role.permissions().iter().copied().collect());
            snapshot.project_roles.insert(*project_id, *project_role);
            snapshot.accessible_projects.insert(*project_id);
        }
        snapshot
    }

    #[test]
    fn project_role_adds_to_global_role_on_that_project_only() {
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        let snapshot = snapshot_for(Role::TeamMember, &[(p1, ProjectRole::ProjectManager)]);

        assert!(snapshot.has_permission(Permission::ProjectUpdate, Some(p1)));
        assert!(!snapshot.has_permission(Permission::ProjectUpdate, Some(p2)));
        assert!(!snapshot.has_permission(Permission::ProjectUpdate, None));
        assert!(snapshot.can_manage_project(p1));
        assert!(!snapshot.can_manage_project(p2));
    }

    #[test]
    fn global_grant_holds_in_any_project_context() {
        let snapshot = snapshot_for(Role::TeamMember, &[(Uuid::new_v4(), ProjectRole::ProjectViewer)]);
        let unrelated = Uuid::new_v4();

        assert!(snapshot.has_permission(Permission::TaskCreate, Some(unrelated)));
        assert!(snapshot.has_permission(Permission::TaskCreate, None));
    }

    #[test]
    fn project_role_never_revokes_a_global_grant() {
        let p1 = Uuid::new_v4();
        let snapshot = snapshot_for(Role::TeamMember, &[(p1, ProjectRole::ProjectViewer)]);

        assert!(!ProjectRole::ProjectViewer.grants(Permission::TaskCreate));
        assert!(snapshot.has_permission(Permission::TaskCreate, Some(p1)));
    }

    #[test]
    fn permission_outside_both_tables_is_denied() {
        let p1 = Uuid::new_v4();
        let snapshot = snapshot_for(Role::Viewer, &[(p1, ProjectRole::ProjectClient)]);

        for permission in Permission::ALL {
            let expected = Role::Viewer.grants(*permission) || ProjectRole::ProjectClient.grants(*permission);
            assert_eq!(snapshot.has_permission(*permission, Some(p1)), expected, "{permission}");
        }
    }

    #[test]
    fn empty_lists_follow_vacuous_truth() {
        let snapshot = snapshot_for(Role::SuperAdmin, &[]);
        assert!(!snapshot.has_any_permission(&[], None));
        assert!(snapshot.has_all_permissions(&[], None));

        let nobody = ResolvedPermissionSnapshot::empty(Uuid::new_v4());
        assert!(!nobody.has_any_permission(&[], None));
        assert!(nobody.has_all_permissions(&[], None));
    }

    #[test]
    fn any_and_all_combine_global_and_project_grants() {
        let p1 = Uuid::new_v4();
        let snapshot = snapshot_for(Role::Viewer, &[(p1, ProjectRole::ProjectMember)]);
        let wanted = [Permission::TaskView, Permission::TaskCreate];

        assert!(snapshot.has_all_permissions(&wanted, Some(p1)));
        assert!(!snapshot.has_all_permissions(&wanted, None));
        assert!(snapshot.has_any_permission(&wanted, None));
        assert!(!snapshot.has_any_permission(&[Permission::BillingManage, Permission::UserDelete], Some(p1)));
    }

    #[test]
    fn empty_snapshot_denies_everything() {
        let snapshot = ResolvedPermissionSnapshot::empty(Uuid::new_v4());
        let project = Uuid::new_v4();
        for permission in Permission::ALL {
            assert!(!snapshot.has_permission(*permission, Some(project)));
        }
        assert!(!snapshot.can_access_project(project));
    }

    #[test]
    fn wire_form_uses_camel_case_keys() {
        let p1 = Uuid::new_v4();
        let snapshot = snapshot_for(Role::TeamMember, &[(p1, ProjectRole::ProjectManager)]);
        let value = serde_json::to_value(snapshot.to_response()).unwrap();

        for key in ["globalPermissions", "projectPermissions", "projectRoles", "userRole", "accessibleProjects"] {
            assert!(value.get(key).is_some(), "missing {key} in {value}");
        }
        assert_eq!(value["userRole"], "team_member");
        assert_eq!(value["projectRoles"][p1.to_string()], "project_manager");
    }

    #[test]
    fn wire_round_trip_preserves_every_answer() {
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        let outsider = Uuid::new_v4();
        let original = snapshot_for(
            Role::QaEngineer,
            &[(p1, ProjectRole::ProjectManager), (p2, ProjectRole::ProjectTester)],
        );

        let json = serde_json::to_string(&original.to_response()).unwrap();
        let parsed: PermissionsResponse = serde_json::from_str(&json).unwrap();
        let (restored, unknown) = parsed.into_snapshot(original.user_id);

        assert!(unknown.is_empty());
        assert_eq!(restored, original);
        for project in [None, Some(p1), Some(p2), Some(outsider)] {
            for permission in Permission::ALL {
                assert_eq!(
                    restored.has_permission(*permission, project),
                    original.has_permission(*permission, project),
                );
            }
        }
    }

    #[test]
    fn unknown_names_are_dropped_not_granted() {
        let p1 = Uuid::new_v4();
        let response = PermissionsResponse {
            global_permissions: vec!["task:view".into(), "task:teleport".into()],
            project_permissions: BTreeMap::from([(p1, vec!["sprint:warp".into()])]),
            project_roles: BTreeMap::from([(p1, "project_overlord".into())]),
            user_role: Some("emperor".into()),
            accessible_projects: vec![p1],
        };

        let (snapshot, unknown) = response.into_snapshot(Uuid::new_v4());

        assert_eq!(unknown.len(), 4);
        assert!(snapshot.has_permission(Permission::TaskView, None));
        assert_eq!(snapshot.global_permissions.len(), 1);
        assert!(snapshot.project_permissions[&p1].is_empty());
        assert!(snapshot.project_roles.is_empty());
        assert_eq!(snapshot.global_role, None);
        assert!(snapshot.can_access_project(p1));
    }
}
