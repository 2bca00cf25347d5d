use uuid::Uuid;

use super::cache::PermissionCache;
use crate::authz::{MatchMode, Permission};

/// Renders its children only while the cache currently grants the requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionGate {
    permissions: Vec<Permission>,
    mode: MatchMode,
    project_id: Option<Uuid>,
}

impl PermissionGate {
    pub fn new(permission: Permission) -> Self {
        Self::all([permission])
    }

    pub fn any(permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            permissions: permissions.into_iter().collect(),
            mode: MatchMode::Any,
            project_id: None,
        }
    }

    pub fn all(permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            mode: MatchMode::All,
            ..Self::any(permissions)
        }
    }

    pub fn in_project(mut self, project_id: Uuid) -> Self {
        self.project_id = Some(project_id);
        self
    }

    pub fn allows(&self, cache: &PermissionCache) -> bool {
        match self.mode {
            MatchMode::Any => cache.has_any_permission(&self.permissions, self.project_id),
            MatchMode::All => cache.has_all_permissions(&self.permissions, self.project_id),
        }
    }

    /// `Some(children())` when allowed. `children` is not called otherwise.
    pub fn render<T>(&self, cache: &PermissionCache, children: impl FnOnce() -> T) -> Option<T> {
        self.allows(cache).then(children)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Enabled,
    Disabled,
}

/// A control that stays visible but is disabled without the permission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatedButton {
    gate: PermissionGate,
}

impl GatedButton {
    pub fn new(gate: PermissionGate) -> Self {
        Self { gate }
    }

    pub fn state(&self, cache: &PermissionCache) -> ButtonState {
        if self.gate.allows(cache) {
            ButtonState::Enabled
        } else {
            ButtonState::Disabled
        }
    }
}
