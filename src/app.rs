use std::sync::Arc;

use axum::http::Method;
use axum::routing::{delete, get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::{Guard, GuardContext, Permission, PermissionResolver, PermissionService, RoleAssignmentStore, SqliteRoleStore};
use crate::errors::AppError;
use crate::events::{init_event_bus, start_activity_listener, EventBus};
use crate::jwt::JwtConfig;
use crate::routes::{health, members, permissions, projects, users};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub permissions: PermissionService,
    pub roles: SqliteRoleStore,
    pub event_bus: EventBus,
}

impl AppState {
    /// Resolve permissions from the same database the routes write to.
    pub fn new(pool: SqlitePool, jwt: JwtConfig, event_bus: EventBus) -> Self {
        let roles = SqliteRoleStore::new(pool.clone());
        let store: Arc<dyn RoleAssignmentStore> = Arc::new(roles.clone());
        Self {
            roles,
            pool,
            jwt: Arc::new(jwt),
            permissions: PermissionService::new(PermissionResolver::new(store)),
            event_bus,
        }
    }

    pub fn guard(&self, guard: Guard) -> GuardContext {
        GuardContext {
            app: self.clone(),
            guard: Arc::new(guard),
        }
    }
}

/// Wrap a method router in check-then-call for `$guard`.
macro_rules! guarded {
    ($state:expr, $guard:expr) => {
        axum::middleware::from_fn_with_state($state.guard($guard), crate::authz::enforce)
    };
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let (event_bus, rx) = init_event_bus();
    tokio::spawn(start_activity_listener(rx, pool.clone()));

    Ok(router(AppState::new(pool, jwt_config, event_bus)))
}

pub fn router(state: AppState) -> Router {
    use Permission::*;

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let permission_routes = Router::new()
        .route("/permissions/me", get(permissions::my_permissions))
        .route("/permissions/catalog", get(permissions::catalog))
        .route("/permissions/check", get(permissions::check_permission))
        .route(
            "/permissions/users/:user_id",
            get(permissions::user_permissions).route_layer(guarded!(state, Guard::require(UserView))),
        )
        .route(
            "/users/:user_id/role",
            put(users::set_user_role).route_layer(guarded!(state, Guard::require(UserManageRoles))),
        );

    let project_routes = Router::new()
        .route("/projects", get(projects::list_projects))
        .route(
            "/projects",
            post(projects::create_project).route_layer(guarded!(state, Guard::require(ProjectCreate))),
        )
        .route(
            "/projects/:project_id",
            get(projects::get_project)
                .route_layer(guarded!(state, Guard::require(ProjectView).scoped_to("project_id"))),
        )
        .route(
            "/projects/:project_id",
            put(projects::update_project).route_layer(guarded!(
                state,
                Guard::require(ProjectUpdate).scoped_to("project_id").managing()
            )),
        )
        .route(
            "/projects/:project_id",
            delete(projects::delete_project)
                .route_layer(guarded!(state, Guard::require(ProjectDelete).scoped_to("project_id"))),
        );

    let member_routes = Router::new()
        .route(
            "/projects/:project_id/members",
            get(members::list_members)
                .route_layer(guarded!(state, Guard::require(ProjectView).scoped_to("project_id"))),
        )
        .route(
            "/projects/:project_id/members",
            post(members::add_member).route_layer(guarded!(
                state,
                Guard::require(ProjectManageMembers).scoped_to("project_id")
            )),
        )
        .route(
            "/projects/:project_id/members/:user_id",
            delete(members::remove_member).route_layer(guarded!(
                state,
                Guard::require(ProjectManageMembers).scoped_to("project_id")
            )),
        );

    Router::new()
        .route("/api/health", get(health::health))
        .merge(permission_routes)
        .merge(project_routes)
        .merge(member_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
