use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use uuid::Uuid;

use super::projects::fetch_project;
use crate::app::AppState;
use crate::authz::ResolvedAccess;
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::jwt::AuthUser;
use crate::models::membership::{AddMemberRequest, ProjectMember};

#[utoipa::path(
    get,
    path = "/projects/{project_id}/members",
    tag = "Members",
    params(("project_id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project members", body = [ProjectMember]),
        (status = 403, description = "Caller cannot access the project")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_members(State(state): State<AppState>, access: ResolvedAccess) -> AppResult<Json<Vec<ProjectMember>>> {
    let members = state
        .roles
        .list_project_members(access.project()?)
        .await?
        .into_iter()
        .map(ProjectMember::from)
        .collect();

    Ok(Json(members))
}

/// Grant or replace a user's role on the project. A user holds at most one.
#[utoipa::path(
    post,
    path = "/projects/{project_id}/members",
    tag = "Members",
    params(("project_id" = Uuid, Path, description = "Project id")),
    request_body = AddMemberRequest,
    responses(
        (status = 200, description = "Membership stored", body = ProjectMember),
        (status = 400, description = "Unknown project role"),
        (status = 403, description = "Caller lacks project:manage_members"),
        (status = 404, description = "User not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn add_member(
    State(state): State<AppState>,
    auth: AuthUser,
    access: ResolvedAccess,
    headers: HeaderMap,
    Json(payload): Json<AddMemberRequest>,
) -> AppResult<Json<ProjectMember>> {
    let project_id = access.project()?;
    let role = payload.role().map_err(|err| AppError::bad_request(err.to_string()))?;

    fetch_project(&state.pool, project_id).await?;
    ensure_user_exists(&state, payload.user_id).await?;

    state.roles.upsert_membership(payload.user_id, project_id, role).await?;

    let member = ProjectMember {
        user_id: payload.user_id,
        project_id,
        project_role: role.as_str().to_string(),
    };

    tracing::info!(
        actor_id = %auth.user_id,
        user_id = %member.user_id,
        project_id = %project_id,
        project_role = role.as_str(),
        "project role assigned"
    );
    log_activity_with_context(
        &state.event_bus,
        "assigned",
        Some(auth.user_id),
        &member,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(member))
}

#[utoipa::path(
    delete,
    path = "/projects/{project_id}/members/{user_id}",
    tag = "Members",
    params(
        ("project_id" = Uuid, Path, description = "Project id"),
        ("user_id" = Uuid, Path, description = "Member's user id")
    ),
    responses(
        (status = 204, description = "Membership removed"),
        (status = 403, description = "Caller lacks project:manage_members"),
        (status = 404, description = "No such membership")
    ),
    security(("bearerAuth" = []))
)]
pub async fn remove_member(
    State(state): State<AppState>,
    auth: AuthUser,
    access: ResolvedAccess,
    headers: HeaderMap,
    Path((_project_id, user_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    let project_id = access.project()?;

    let existing = state
        .roles
        .list_project_members(project_id)
        .await?
        .into_iter()
        .find(|record| record.user_id == user_id)
        .ok_or_else(|| AppError::not_found("membership not found"))?;

    if !state.roles.remove_membership(user_id, project_id).await? {
        return Err(AppError::not_found("membership not found"));
    }

    tracing::info!(
        actor_id = %auth.user_id,
        user_id = %user_id,
        project_id = %project_id,
        "project role revoked"
    );
    log_activity_with_context(
        &state.event_bus,
        "revoked",
        Some(auth.user_id),
        &ProjectMember::from(existing),
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn ensure_user_exists(state: &AppState, user_id: Uuid) -> AppResult<()> {
    let found: Option<String> = sqlx::query_scalar("SELECT id FROM users WHERE id = ? AND deleted_at IS NULL")
        .bind(user_id.to_string())
        .fetch_optional(&state.pool)
        .await?;

    found
        .map(|_| ())
        .ok_or_else(|| AppError::not_found("user not found"))
}
