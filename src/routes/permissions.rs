use axum::extract::{Path, Query, State};
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{Permission, PermissionsResponse};
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::permission::{CatalogResponse, CheckQuery, CheckResponse};

/// The caller's resolved permissions, in the shape the client cache loads.
#[utoipa::path(
    get,
    path = "/permissions/me",
    tag = "Permissions",
    responses(
        (status = 200, description = "Caller's permission snapshot", body = PermissionsResponse),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearerAuth" = []))
)]
pub async fn my_permissions(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<PermissionsResponse>> {
    let snapshot = state.permissions.snapshot_for_check(auth.user_id).await?;
    Ok(Json(PermissionsResponse::from(&snapshot)))
}

#[utoipa::path(
    get,
    path = "/permissions/catalog",
    tag = "Permissions",
    responses((status = 200, description = "Permission catalog and role tables", body = CatalogResponse)),
    security(("bearerAuth" = []))
)]
pub async fn catalog(_auth: AuthUser) -> Json<CatalogResponse> {
    Json(CatalogResponse::build())
}

#[utoipa::path(
    get,
    path = "/permissions/check",
    tag = "Permissions",
    params(CheckQuery),
    responses(
        (status = 200, description = "Whether the caller holds the permission", body = CheckResponse),
        (status = 400, description = "Unknown permission name")
    ),
    security(("bearerAuth" = []))
)]
pub async fn check_permission(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<CheckQuery>,
) -> AppResult<Json<CheckResponse>> {
    let permission: Permission = query
        .permission
        .parse()
        .map_err(|err: crate::authz::UnknownName| AppError::bad_request(err.to_string()))?;

    let allowed = state
        .permissions
        .has_permission(auth.user_id, permission, query.project_id)
        .await?;

    Ok(Json(CheckResponse { allowed }))
}

/// Another user's snapshot, for administrators.
#[utoipa::path(
    get,
    path = "/permissions/users/{user_id}",
    tag = "Permissions",
    params(("user_id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User's permission snapshot", body = PermissionsResponse),
        (status = 403, description = "Caller lacks user:view"),
        (status = 404, description = "User not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn user_permissions(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<PermissionsResponse>> {
    let snapshot = state.permissions.snapshot(user_id).await?;
    Ok(Json(PermissionsResponse::from(&snapshot)))
}
