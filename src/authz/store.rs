//! Role assignment storage.
//!
//! The resolver only ever reads through [`RoleAssignmentStore`]. Writes
//! (role changes, membership edits) live on [`SqliteRoleStore`] itself and
//! are used by the admin routes and the CLI.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::catalog::{ProjectRole, Role};
use crate::db::row_parsers::parse_uuid;
use crate::errors::{AppError, AppResult};

/// The user's global role column, as stored. `None` when the column is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRoleRecord {
    pub user_id: Uuid,
    pub role: Option<String>,
}

/// One `(userId, projectId, projectRole)` membership row, as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipRecord {
    pub user_id: Uuid,
    pub project_id: Uuid,
    pub project_role: String,
}

#[async_trait]
pub trait RoleAssignmentStore: Send + Sync {
    /// `Ok(None)` when the user does not exist (or was deleted).
    async fn fetch_user_role(&self, user_id: Uuid) -> AppResult<Option<UserRoleRecord>>;

    /// Membership rows for live projects only.
    async fn fetch_memberships(&self, user_id: Uuid) -> AppResult<Vec<MembershipRecord>>;

    /// Ids of every live project.
    async fn fetch_project_ids(&self) -> AppResult<Vec<Uuid>>;
}

// =============================================================================
// SQLITE
// =============================================================================

#[derive(Debug, Clone)]
pub struct SqliteRoleStore {
    pool: SqlitePool,
}

impl SqliteRoleStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Replace the user's global role.
    pub async fn set_user_role(&self, user_id: Uuid, role: Role) -> AppResult<()> {
        let affected = sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL")
            .bind(role.as_str())
            .bind(Utc::now())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;

        if affected.rows_affected() == 0 {
            return Err(AppError::not_found("user not found"));
        }

        Ok(())
    }

    /// Insert or replace the single membership row for `(user, project)`.
    pub async fn upsert_membership(&self, user_id: Uuid, project_id: Uuid, role: ProjectRole) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO project_members (user_id, project_id, project_role, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (user_id, project_id) DO UPDATE SET project_role = excluded.project_role
            "#,
        )
        .bind(user_id.to_string())
        .bind(project_id.to_string())
        .bind(role.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Returns whether a row was removed.
    pub async fn remove_membership(&self, user_id: Uuid, project_id: Uuid) -> AppResult<bool> {
        let affected = sqlx::query("DELETE FROM project_members WHERE user_id = ? AND project_id = ?")
            .bind(user_id.to_string())
            .bind(project_id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(affected.rows_affected() > 0)
    }

    pub async fn list_project_members(&self, project_id: Uuid) -> AppResult<Vec<MembershipRecord>> {
        let rows = sqlx::query(
            "SELECT user_id, project_id, project_role FROM project_members WHERE project_id = ? ORDER BY created_at",
        )
        .bind(project_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(membership_from_row).collect()
    }
}

fn membership_from_row(row: &sqlx::sqlite::SqliteRow) -> AppResult<MembershipRecord> {
    Ok(MembershipRecord {
        user_id: parse_uuid(&row.try_get::<String, _>("user_id")?)?,
        project_id: parse_uuid(&row.try_get::<String, _>("project_id")?)?,
        project_role: row.try_get("project_role")?,
    })
}

#[async_trait]
impl RoleAssignmentStore for SqliteRoleStore {
    async fn fetch_user_role(&self, user_id: Uuid) -> AppResult<Option<UserRoleRecord>> {
        let row = sqlx::query("SELECT role FROM users WHERE id = ? AND deleted_at IS NULL")
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            Ok(UserRoleRecord {
                user_id,
                role: row.try_get::<Option<String>, _>("role")?,
            })
        })
        .transpose()
    }

    async fn fetch_memberships(&self, user_id: Uuid) -> AppResult<Vec<MembershipRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT pm.user_id, pm.project_id, pm.project_role
            FROM project_members pm
            INNER JOIN projects p ON p.id = pm.project_id
            WHERE pm.user_id = ? AND p.deleted_at IS NULL
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(membership_from_row).collect()
    }

    async fn fetch_project_ids(&self) -> AppResult<Vec<Uuid>> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM projects WHERE deleted_at IS NULL")
            .fetch_all(&self.pool)
            .await?;

        ids.iter().map(|id| parse_uuid(id)).collect()
    }
}

// =============================================================================
// IN-MEMORY
// =============================================================================

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<Uuid, Option<String>>,
    memberships: Vec<MembershipRecord>,
    projects: Vec<Uuid>,
    unavailable: bool,
}

/// Store backed by process memory, for tests and tooling.
#[derive(Debug, Default)]
pub struct InMemoryRoleStore {
    state: RwLock<MemoryState>,
}

impl InMemoryRoleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, user_id: Uuid, role: Option<Role>) -> Self {
        self.insert_user_raw(user_id, role.map(|r| r.as_str().to_string()));
        self
    }

    pub fn with_project(self, project_id: Uuid) -> Self {
        self.write().projects.push(project_id);
        self
    }

    pub fn with_membership(self, user_id: Uuid, project_id: Uuid, role: ProjectRole) -> Self {
        self.insert_membership_raw(user_id, project_id, role.as_str());
        self
    }

    /// Store a role string verbatim, including names outside the catalog.
    pub fn insert_user_raw(&self, user_id: Uuid, role: Option<String>) {
        self.write().users.insert(user_id, role);
    }

    pub fn insert_membership_raw(&self, user_id: Uuid, project_id: Uuid, role: &str) {
        let mut state = self.write();
        state
            .memberships
            .retain(|m| !(m.user_id == user_id && m.project_id == project_id));
        state.memberships.push(MembershipRecord {
            user_id,
            project_id,
            project_role: role.to_string(),
        });
    }

    /// Make every read fail, as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.write().unavailable = unavailable;
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, MemoryState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read(&self) -> AppResult<std::sync::RwLockReadGuard<'_, MemoryState>> {
        let state = self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        if state.unavailable {
            return Err(AppError::internal("role store unavailable"));
        }
        Ok(state)
    }
}

#[async_trait]
impl RoleAssignmentStore for InMemoryRoleStore {
    async fn fetch_user_role(&self, user_id: Uuid) -> AppResult<Option<UserRoleRecord>> {
        let state = self.read()?;
        Ok(state.users.get(&user_id).map(|role| UserRoleRecord {
            user_id,
            role: role.clone(),
        }))
    }

    async fn fetch_memberships(&self, user_id: Uuid) -> AppResult<Vec<MembershipRecord>> {
        let state = self.read()?;
        Ok(state
            .memberships
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn fetch_project_ids(&self) -> AppResult<Vec<Uuid>> {
        Ok(self.read()?.projects.clone())
    }
}
