use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::authz::{Permission, PermissionCategory, ProjectRole, Role};

#[derive(Debug, Serialize, ToSchema)]
pub struct PermissionEntry {
    #[schema(example = "task:create")]
    pub name: &'static str,
    pub description: &'static str,
}

impl From<Permission> for PermissionEntry {
    fn from(permission: Permission) -> Self {
        Self {
            name: permission.as_str(),
            description: permission.description(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryEntry {
    pub category: PermissionCategory,
    pub permissions: Vec<PermissionEntry>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleEntry {
    #[schema(example = "team_member")]
    pub role: &'static str,
    pub permissions: Vec<&'static str>,
}

/// The static catalog: every permission by category and both role tables.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CatalogResponse {
    pub categories: Vec<CategoryEntry>,
    pub roles: Vec<RoleEntry>,
    pub project_roles: Vec<RoleEntry>,
}

impl CatalogResponse {
    pub fn build() -> Self {
        let categories = PermissionCategory::ALL
            .into_iter()
            .map(|category| CategoryEntry {
                category,
                permissions: Permission::by_category(category).map(PermissionEntry::from).collect(),
            })
            .collect();

        let roles = Role::ALL
            .into_iter()
            .map(|role| RoleEntry {
                role: role.as_str(),
                permissions: role.permissions().iter().map(Permission::as_str).collect(),
            })
            .collect();

        let project_roles = ProjectRole::ALL
            .into_iter()
            .map(|role| RoleEntry {
                role: role.as_str(),
                permissions: role.permissions().iter().map(Permission::as_str).collect(),
            })
            .collect();

        Self {
            categories,
            roles,
            project_roles,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct CheckQuery {
    /// Permission name, e.g. `task:create`
    pub permission: String,
    pub project_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CheckResponse {
    pub allowed: bool,
}
