//! Route guards.
//!
//! A [`Guard`] names what a route needs. [`enforce`] is the axum middleware
//! that authenticates the caller, resolves their snapshot, decides, and only
//! then runs the wrapped handler:
//!
//! ```ignore
//! .route(
//!     "/projects/:project_id",
//!     put(update_project).route_layer(from_fn_with_state(
//!         state.guard(Guard::require(Permission::ProjectUpdate).scoped_to("project_id").managing()),
//!         enforce,
//!     )),
//! )
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use axum::async_trait;
use axum::extract::{FromRequestParts, Path, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use super::catalog::Permission;
use super::snapshot::ResolvedPermissionSnapshot;
use crate::app::AppState;
use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// At least one listed permission.
    Any,
    /// Every listed permission.
    All,
}

/// Extra project-level verification after the permission test passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectCheck {
    Access,
    Manage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guard {
    permissions: Vec<Permission>,
    mode: MatchMode,
    project_param: Option<&'static str>,
    project_check: ProjectCheck,
}

impl Guard {
    pub fn require(permission: Permission) -> Self {
        Self::all([permission])
    }

    pub fn any(permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            permissions: permissions.into_iter().collect(),
            mode: MatchMode::Any,
            project_param: None,
            project_check: ProjectCheck::Access,
        }
    }

    pub fn all(permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            mode: MatchMode::All,
            ..Self::any(permissions)
        }
    }

    /// Read the project id from this route parameter and check against it.
    pub fn scoped_to(mut self, param: &'static str) -> Self {
        self.project_param = Some(param);
        self
    }

    /// For scoped guards, also require `can_manage_project` instead of plain access.
    pub fn managing(mut self) -> Self {
        self.project_check = ProjectCheck::Manage;
        self
    }

    pub fn project_param(&self) -> Option<&'static str> {
        self.project_param
    }

    /// Pure decision over an already-resolved snapshot.
    pub fn authorize(&self, snapshot: &ResolvedPermissionSnapshot, project_id: Option<Uuid>) -> Decision {
        let granted = match self.mode {
            MatchMode::Any => snapshot.has_any_permission(&self.permissions, project_id),
            MatchMode::All => snapshot.has_all_permissions(&self.permissions, project_id),
        };

        if !granted {
            return Decision::Denied;
        }

        let project_ok = match (project_id, self.project_check) {
            (None, _) => true,
            (Some(id), ProjectCheck::Access) => snapshot.can_access_project(id),
            (Some(id), ProjectCheck::Manage) => snapshot.can_manage_project(id),
        };

        if project_ok {
            Decision::Authorized
        } else {
            Decision::Denied
        }
    }

    fn describe(&self) -> String {
        let separator = match self.mode {
            MatchMode::Any => " | ",
            MatchMode::All => " & ",
        };
        self.permissions
            .iter()
            .map(Permission::as_str)
            .collect::<Vec<_>>()
            .join(separator)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Authorized,
    Denied,
}

/// Middleware state: the app plus the guard for one route.
#[derive(Clone)]
pub struct GuardContext {
    pub app: AppState,
    pub guard: Arc<Guard>,
}

/// Left in request extensions by [`enforce`] for the handler to reuse.
#[derive(Debug, Clone)]
pub struct ResolvedAccess {
    pub snapshot: Arc<ResolvedPermissionSnapshot>,
    pub project_id: Option<Uuid>,
}

impl ResolvedAccess {
    /// The project id the guard checked; only absent on unscoped routes.
    pub fn project(&self) -> AppResult<Uuid> {
        self.project_id
            .ok_or_else(|| AppError::internal("route guard is not project scoped"))
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ResolvedAccess {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ResolvedAccess>()
            .cloned()
            .ok_or_else(|| AppError::internal("handler reached without a route guard"))
    }
}

fn project_from_params(
    guard: &Guard,
    params: Option<&HashMap<String, String>>,
) -> AppResult<Option<Uuid>> {
    let Some(name) = guard.project_param() else {
        return Ok(None);
    };

    let raw = params
        .and_then(|params| params.get(name))
        .ok_or_else(|| AppError::internal(format!("route has no `{name}` parameter")))?;

    Uuid::parse_str(raw)
        .map(Some)
        .map_err(|_| AppError::bad_request("invalid project id"))
}

/// Authenticate, resolve, decide, then call the handler. Nothing downstream
/// runs unless every step succeeds.
///
/// Failures surface in that order: 401 for a missing or invalid token, 400
/// for a malformed project id on a scoped route, 500 when the snapshot cannot
/// be resolved, and 403 when the decision denies.
pub async fn enforce(
    State(ctx): State<GuardContext>,
    params: Option<Path<HashMap<String, String>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = ctx.app.jwt.authenticate(req.headers())?;
    let project_id = project_from_params(&ctx.guard, params.as_ref().map(|Path(p)| p))?;
    let snapshot = ctx.app.permissions.snapshot_for_check(user.user_id).await?;

    match ctx.guard.authorize(&snapshot, project_id) {
        Decision::Authorized => {
            tracing::debug!(
                user_id = %user.user_id,
                required = %ctx.guard.describe(),
                project_id = ?project_id,
                "access granted"
            );
        }
        Decision::Denied => {
            tracing::warn!(
                user_id = %user.user_id,
                required = %ctx.guard.describe(),
                project_id = ?project_id,
                "access denied"
            );
            return Err(AppError::permission_denied());
        }
    }

    req.extensions_mut().insert(user);
    req.extensions_mut().insert(ResolvedAccess {
        snapshot: Arc::new(snapshot),
        project_id,
    });

    Ok(next.run(req).await)
}
