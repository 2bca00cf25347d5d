use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{ProjectRole, ResolvedAccess};
use crate::db::row_parsers::db_project_from_row;
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::jwt::AuthUser;
use crate::models::project::{Project, ProjectCreateRequest, ProjectDetail, ProjectUpdateRequest};

const DEFAULT_THEME: &str = "#3498db";
const PROJECT_COLUMNS: &str = "id, owner_id, name, description, theme_color, created_at, updated_at, deleted_at";

/// Projects the caller can access: their memberships, or everything with `project:view_all`.
/// Needs no permission beyond signing in; the list is simply empty otherwise.
#[utoipa::path(
    get,
    path = "/projects",
    tag = "Projects",
    responses((status = 200, description = "Accessible projects", body = [Project])),
    security(("bearerAuth" = []))
)]
pub async fn list_projects(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Vec<Project>>> {
    let snapshot = state.permissions.snapshot_for_check(auth.user_id).await?;
    let rows = sqlx::query(&format!(
        "SELECT {PROJECT_COLUMNS} FROM projects WHERE deleted_at IS NULL ORDER BY created_at DESC"
    ))
    .fetch_all(&state.pool)
    .await?;

    let mut projects = Vec::new();
    for row in &rows {
        let project: Project = db_project_from_row(row)?.into();
        if snapshot.can_access_project(project.id) {
            projects.push(project);
        }
    }

    Ok(Json(projects))
}

#[utoipa::path(
    post,
    path = "/projects",
    tag = "Projects",
    request_body = ProjectCreateRequest,
    responses(
        (status = 201, description = "Project created; the creator manages it", body = Project),
        (status = 403, description = "Caller lacks project:create")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_project(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Json(payload): Json<ProjectCreateRequest>,
) -> AppResult<(StatusCode, Json<Project>)> {
    if payload.name.trim().is_empty() {
        return Err(AppError::bad_request("project name must not be empty"));
    }

    let now = Utc::now();
    let project_id = Uuid::new_v4();
    let theme_color = payload.theme_color.clone().unwrap_or_else(|| DEFAULT_THEME.to_string());

    let mut tx = state.pool.begin().await?;

    sqlx::query(
        "INSERT INTO projects (id, owner_id, name, description, theme_color, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(project_id.to_string())
    .bind(auth.user_id.to_string())
    .bind(&payload.name)
    .bind(&payload.description)
    .bind(&theme_color)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO project_members (user_id, project_id, project_role, created_at) VALUES (?, ?, ?, ?)")
        .bind(auth.user_id.to_string())
        .bind(project_id.to_string())
        .bind(ProjectRole::ProjectManager.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    let project = fetch_project(&state.pool, project_id).await?;
    log_activity_with_context(
        &state.event_bus,
        "created",
        Some(auth.user_id),
        &project,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(project)))
}

#[utoipa::path(
    get,
    path = "/projects/{project_id}",
    tag = "Projects",
    params(("project_id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project detail with the caller's role", body = ProjectDetail),
        (status = 403, description = "Caller cannot access the project")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_project(State(state): State<AppState>, access: ResolvedAccess) -> AppResult<Json<ProjectDetail>> {
    let project_id = access.project()?;
    let project = fetch_project(&state.pool, project_id).await?;

    // The guard already resolved the caller; read its snapshot rather than resolving again.
    Ok(Json(ProjectDetail {
        project,
        project_role: access
            .snapshot
            .project_role(project_id)
            .map(|role| role.as_str().to_string()),
        can_manage: access.snapshot.can_manage_project(project_id),
    }))
}

#[utoipa::path(
    put,
    path = "/projects/{project_id}",
    tag = "Projects",
    params(("project_id" = Uuid, Path, description = "Project id")),
    request_body = ProjectUpdateRequest,
    responses(
        (status = 200, description = "Project updated", body = Project),
        (status = 403, description = "Caller cannot manage the project")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_project(
    State(state): State<AppState>,
    auth: AuthUser,
    access: ResolvedAccess,
    headers: HeaderMap,
    Json(payload): Json<ProjectUpdateRequest>,
) -> AppResult<Json<Project>> {
    let before = fetch_project(&state.pool, access.project()?).await?;
    let mut project = before.clone();

    if let Some(name) = payload.name.as_ref() {
        project.name = name.clone();
    }
    if payload.description.is_some() {
        project.description = payload.description.clone();
    }
    if let Some(theme_color) = payload.theme_color.as_ref() {
        project.theme_color = theme_color.clone();
    }
    project.updated_at = Utc::now();

    sqlx::query("UPDATE projects SET name = ?, description = ?, theme_color = ?, updated_at = ? WHERE id = ?")
        .bind(&project.name)
        .bind(&project.description)
        .bind(&project.theme_color)
        .bind(project.updated_at)
        .bind(project.id.to_string())
        .execute(&state.pool)
        .await?;

    log_activity_with_context(
        &state.event_bus,
        "updated",
        Some(auth.user_id),
        &project,
        Some(&before),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(project))
}

/// Soft delete. Memberships stay in place but stop resolving.
#[utoipa::path(
    delete,
    path = "/projects/{project_id}",
    tag = "Projects",
    params(("project_id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 204, description = "Project soft deleted"),
        (status = 403, description = "Caller lacks project:delete")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_project(
    State(state): State<AppState>,
    auth: AuthUser,
    access: ResolvedAccess,
    headers: HeaderMap,
) -> AppResult<StatusCode> {
    let mut project = fetch_project(&state.pool, access.project()?).await?;

    let now = Utc::now();
    let affected = sqlx::query("UPDATE projects SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL")
        .bind(now)
        .bind(now)
        .bind(project.id.to_string())
        .execute(&state.pool)
        .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("project not found"));
    }

    project.deleted_at = Some(now);
    log_activity_with_context(
        &state.event_bus,
        "deleted",
        Some(auth.user_id),
        &project,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn fetch_project(pool: &SqlitePool, project_id: Uuid) -> AppResult<Project> {
    let row = sqlx::query(&format!(
        "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ? AND deleted_at IS NULL"
    ))
    .bind(project_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("project not found"))?;

    Ok(db_project_from_row(&row)?.into())
}
