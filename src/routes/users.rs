use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::Role;
use crate::db::row_parsers::db_user_from_row;
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::jwt::AuthUser;
use crate::models::user::{DbUser, RoleChange, SetRoleRequest, User};

/// Replace a user's organization-wide role.
#[utoipa::path(
    put,
    path = "/users/{user_id}/role",
    tag = "Users",
    params(("user_id" = Uuid, Path, description = "User id")),
    request_body = SetRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = User),
        (status = 400, description = "Unknown role"),
        (status = 403, description = "Caller lacks user:manage_roles"),
        (status = 404, description = "User not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn set_user_role(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<SetRoleRequest>,
) -> AppResult<Json<User>> {
    let role: Role = payload
        .role
        .parse()
        .map_err(|err: crate::authz::UnknownName| AppError::bad_request(err.to_string()))?;

    let previous = fetch_user(&state, user_id).await?;
    state.roles.set_user_role(user_id, role).await?;

    let change = RoleChange {
        user_id,
        previous_role: previous.role,
        role,
    };

    tracing::info!(
        actor_id = %auth.user_id,
        user_id = %user_id,
        previous_role = ?change.previous_role,
        role = role.as_str(),
        "global role assigned"
    );
    log_activity_with_context(
        &state.event_bus,
        "assigned",
        Some(auth.user_id),
        &change,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(fetch_user(&state, user_id).await?.into()))
}

async fn fetch_user(state: &AppState, user_id: Uuid) -> AppResult<DbUser> {
    let row = sqlx::query(
        "SELECT id, name, email, role, created_at, updated_at, deleted_at FROM users WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(user_id.to_string())
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::not_found("user not found"))?;

    db_user_from_row(&row)
}
