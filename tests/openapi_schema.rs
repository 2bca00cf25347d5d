use serde_json::Value;

#[test]
fn openapi_documents_the_permission_surface() -> anyhow::Result<()> {
    let doc = agile_authz::docs::build_openapi(8000)?;
    let v = serde_json::to_value(&doc)?;

    let props = v
        .pointer("/components/schemas/PermissionsResponse/properties")
        .and_then(Value::as_object)
        .expect("components.schemas.PermissionsResponse.properties must exist");
    for key in ["globalPermissions", "projectPermissions", "projectRoles", "userRole", "accessibleProjects"] {
        assert!(props.contains_key(key), "PermissionsResponse schema missing '{}'", key);
    }

    for path in [
        "/permissions/me",
        "/permissions/check",
        "/permissions/catalog",
        "/users/{user_id}/role",
        "/projects/{project_id}/members/{user_id}",
    ] {
        assert!(v["paths"].get(path).is_some(), "OpenAPI missing path {}", path);
    }

    Ok(())
}
