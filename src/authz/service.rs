use uuid::Uuid;

use super::catalog::Permission;
use super::resolver::PermissionResolver;
use super::snapshot::ResolvedPermissionSnapshot;
use crate::errors::{AppError, AppResult};

/// Yes/no permission questions for route guards and application code.
///
/// Every call resolves a fresh snapshot. Callers that ask several questions
/// in one request should resolve once with [`PermissionService::snapshot`]
/// and use the `ensure_*` helpers on it.
#[derive(Clone)]
pub struct PermissionService {
    resolver: PermissionResolver,
}

impl PermissionService {
    pub fn new(resolver: PermissionResolver) -> Self {
        Self { resolver }
    }

    /// Raw resolution; `NotFound` for an unknown user.
    pub async fn snapshot(&self, user_id: Uuid) -> AppResult<ResolvedPermissionSnapshot> {
        self.resolver.resolve(user_id).await
    }

    /// Resolution for an access decision. Any failure becomes a
    /// `Resolution` error so it can only ever deny.
    pub async fn snapshot_for_check(&self, user_id: Uuid) -> AppResult<ResolvedPermissionSnapshot> {
        self.resolver.resolve(user_id).await.map_err(|err| {
            tracing::error!(user_id = %user_id, error = %err, "permission resolution failed");
            AppError::resolution(err.to_string())
        })
    }

    pub async fn has_permission(&self, user_id: Uuid, permission: Permission, project_id: Option<Uuid>) -> AppResult<bool> {
        Ok(self
            .snapshot_for_check(user_id)
            .await?
            .has_permission(permission, project_id))
    }

    pub async fn has_any_permission(
        &self,
        user_id: Uuid,
        permissions: &[Permission],
        project_id: Option<Uuid>,
    ) -> AppResult<bool> {
        Ok(self
            .snapshot_for_check(user_id)
            .await?
            .has_any_permission(permissions, project_id))
    }

    pub async fn has_all_permissions(
        &self,
        user_id: Uuid,
        permissions: &[Permission],
        project_id: Option<Uuid>,
    ) -> AppResult<bool> {
        Ok(self
            .snapshot_for_check(user_id)
            .await?
            .has_all_permissions(permissions, project_id))
    }

    pub async fn can_access_project(&self, user_id: Uuid, project_id: Uuid) -> AppResult<bool> {
        Ok(self.snapshot_for_check(user_id).await?.can_access_project(project_id))
    }

    pub async fn can_manage_project(&self, user_id: Uuid, project_id: Uuid) -> AppResult<bool> {
        Ok(self.snapshot_for_check(user_id).await?.can_manage_project(project_id))
    }

    pub async fn require_permission(
        &self,
        user_id: Uuid,
        permission: Permission,
        project_id: Option<Uuid>,
    ) -> AppResult<ResolvedPermissionSnapshot> {
        let snapshot = self.snapshot_for_check(user_id).await?;
        ensure_permission(&snapshot, permission, project_id)?;
        Ok(snapshot)
    }

    pub async fn require_any_permission(
        &self,
        user_id: Uuid,
        permissions: &[Permission],
        project_id: Option<Uuid>,
    ) -> AppResult<ResolvedPermissionSnapshot> {
        let snapshot = self.snapshot_for_check(user_id).await?;
        ensure_any_permission(&snapshot, permissions, project_id)?;
        Ok(snapshot)
    }

    pub async fn require_all_permissions(
        &self,
        user_id: Uuid,
        permissions: &[Permission],
        project_id: Option<Uuid>,
    ) -> AppResult<ResolvedPermissionSnapshot> {
        let snapshot = self.snapshot_for_check(user_id).await?;
        ensure_all_permissions(&snapshot, permissions, project_id)?;
        Ok(snapshot)
    }

    pub async fn require_project_access(&self, user_id: Uuid, project_id: Uuid) -> AppResult<ResolvedPermissionSnapshot> {
        let snapshot = self.snapshot_for_check(user_id).await?;
        ensure_project_access(&snapshot, project_id)?;
        Ok(snapshot)
    }

    pub async fn require_project_management(
        &self,
        user_id: Uuid,
        project_id: Uuid,
    ) -> AppResult<ResolvedPermissionSnapshot> {
        let snapshot = self.snapshot_for_check(user_id).await?;
        ensure_project_management(&snapshot, project_id)?;
        Ok(snapshot)
    }
}

fn deny(snapshot: &ResolvedPermissionSnapshot, what: &str, project_id: Option<Uuid>) -> AppError {
    tracing::warn!(
        user_id = %snapshot.user_id,
        required = %what,
        project_id = ?project_id,
        "permission denied"
    );
    AppError::permission_denied()
}

pub fn ensure_permission(
    snapshot: &ResolvedPermissionSnapshot,
    permission: Permission,
    project_id: Option<Uuid>,
) -> AppResult<()> {
    if snapshot.has_permission(permission, project_id) {
        return Ok(());
    }
    Err(deny(snapshot, permission.as_str(), project_id))
}

pub fn ensure_any_permission(
    snapshot: &ResolvedPermissionSnapshot,
    permissions: &[Permission],
    project_id: Option<Uuid>,
) -> AppResult<()> {
    if snapshot.has_any_permission(permissions, project_id) {
        return Ok(());
    }
    Err(deny(snapshot, &join(permissions, " | "), project_id))
}

pub fn ensure_all_permissions(
    snapshot: &ResolvedPermissionSnapshot,
    permissions: &[Permission],
    project_id: Option<Uuid>,
) -> AppResult<()> {
    if snapshot.has_all_permissions(permissions, project_id) {
        return Ok(());
    }
    Err(deny(snapshot, &join(permissions, " & "), project_id))
}

pub fn ensure_project_access(snapshot: &ResolvedPermissionSnapshot, project_id: Uuid) -> AppResult<()> {
    if snapshot.can_access_project(project_id) {
        return Ok(());
    }
    Err(deny(snapshot, "project access", Some(project_id)))
}

pub fn ensure_project_management(snapshot: &ResolvedPermissionSnapshot, project_id: Uuid) -> AppResult<()> {
    if snapshot.can_manage_project(project_id) {
        return Ok(());
    }
    Err(deny(snapshot, "project management", Some(project_id)))
}

fn join(permissions: &[Permission], separator: &str) -> String {
    permissions
        .iter()
        .map(Permission::as_str)
        .collect::<Vec<_>>()
        .join(separator)
}
