use serde_json::{json, Map, Value};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{authz, models, routes};

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::health::health,
		routes::permissions::my_permissions,
		routes::permissions::catalog,
		routes::permissions::check_permission,
		routes::permissions::user_permissions,
		routes::users::set_user_role,
		routes::projects::list_projects,
		routes::projects::create_project,
		routes::projects::get_project,
		routes::projects::update_project,
		routes::projects::delete_project,
		routes::members::list_members,
		routes::members::add_member,
		routes::members::remove_member
	),
	components(
		schemas(
			authz::PermissionCategory,
			authz::Role,
			authz::ProjectRole,
			authz::PermissionsResponse,
			models::permission::CatalogResponse,
			models::permission::CategoryEntry,
			models::permission::PermissionEntry,
			models::permission::RoleEntry,
			models::permission::CheckResponse,
			models::user::User,
			models::user::SetRoleRequest,
			models::user::RoleChange,
			models::project::Project,
			models::project::ProjectDetail,
			models::project::ProjectCreateRequest,
			models::project::ProjectUpdateRequest,
			models::membership::ProjectMember,
			models::membership::AddMemberRequest,
			routes::health::HealthResponse
		)
	),
	tags(
		(name = "Health", description = "Liveness"),
		(name = "Permissions", description = "Resolved permissions and the static catalog"),
		(name = "Users", description = "Organization role administration"),
		(name = "Projects", description = "Projects, visible per accessible-project set"),
		(name = "Members", description = "Project role administration")
	)
)]
pub struct ApiDoc;

/// The generated document plus the bearer scheme and a local server entry.
pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(ApiDoc::openapi())?;

	let root = doc
		.as_object_mut()
		.ok_or_else(|| anyhow::anyhow!("OpenAPI root must be an object"))?;
	ensure_security_components(root)?;
	root.entry("security")
		.or_insert_with(|| json!([{ "bearerAuth": [] }]));
	ensure_servers(root, port);

	Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> SwaggerUi {
	SwaggerUi::new("/docs").url("/api-docs/openapi.json", doc)
}

fn ensure_security_components(root: &mut Map<String, Value>) -> anyhow::Result<()> {
	let schemes = root
		.entry("components")
		.or_insert_with(|| Value::Object(Map::new()))
		.as_object_mut()
		.ok_or_else(|| anyhow::anyhow!("components must be an object"))?
		.entry("securitySchemes")
		.or_insert_with(|| Value::Object(Map::new()))
		.as_object_mut()
		.ok_or_else(|| anyhow::anyhow!("securitySchemes must be an object"))?;

	schemes.insert(
		"bearerAuth".to_string(),
		json!({
			"type": "http",
			"scheme": "bearer",
			"bearerFormat": "JWT"
		}),
	);
	Ok(())
}

fn ensure_servers(root: &mut Map<String, Value>, port: u16) {
	let server_url = format!("http://localhost:{}", port);

	match root.get_mut("servers") {
		Some(Value::Array(arr)) => {
			let has = arr.iter().any(|v| v.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
			if !has {
				arr.push(json!({ "url": server_url }));
			}
		}
		_ => {
			root.insert("servers".to_string(), json!([{ "url": server_url }]));
		}
	}
}
