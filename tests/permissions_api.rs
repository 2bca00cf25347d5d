use anyhow::Result;
use axum::http::StatusCode;
use uuid::Uuid;

mod common;
use common::{add_member, create_project, create_user, send, setup, token};

#[tokio::test]
async fn me_returns_the_wire_document() -> Result<()> {
    let t = setup().await?;
    let owner = create_user(&t.pool, Some("admin")).await?;
    let user = create_user(&t.pool, Some("team_member")).await?;
    let p1 = create_project(&t.pool, owner, "P1").await?;
    add_member(&t.pool, user, p1, "project_manager").await?;

    let (status, body) = send(&t.app, "GET", "/permissions/me", Some(&token(user)), None).await?;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(body["userRole"], "team_member");
    let global: Vec<&str> = body["globalPermissions"].as_array().unwrap().iter().filter_map(|v| v.as_str()).collect();
    assert!(global.contains(&"task:create"));
    assert!(!global.contains(&"project:update"));

    let key = p1.to_string();
    assert_eq!(body["projectRoles"][&key], "project_manager");
    assert!(body["projectPermissions"][&key]
        .as_array()
        .unwrap()
        .iter()
        .any(|v| v == "project:update"));
    assert_eq!(body["accessibleProjects"], serde_json::json!([key]));
    Ok(())
}

#[tokio::test]
async fn missing_global_role_grants_nothing() -> Result<()> {
    let t = setup().await?;
    let user = create_user(&t.pool, None).await?;
    let odd = create_user(&t.pool, Some("chief_wizard")).await?;

    for id in [user, odd] {
        let (status, body) = send(&t.app, "GET", "/permissions/me", Some(&token(id)), None).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["globalPermissions"], serde_json::json!([]));
        assert!(body["userRole"].is_null());
    }
    Ok(())
}

#[tokio::test]
async fn check_endpoint_answers_for_the_caller() -> Result<()> {
    let t = setup().await?;
    let owner = create_user(&t.pool, Some("admin")).await?;
    let user = create_user(&t.pool, Some("team_member")).await?;
    let p1 = create_project(&t.pool, owner, "P1").await?;
    let p2 = create_project(&t.pool, owner, "P2").await?;
    add_member(&t.pool, user, p1, "project_manager").await?;
    let user_token = token(user);

    let cases = [
        (format!("/permissions/check?permission=project:update&projectId={p1}"), true),
        (format!("/permissions/check?permission=project:update&projectId={p2}"), false),
        ("/permissions/check?permission=project:update".to_string(), false),
        ("/permissions/check?permission=task:create".to_string(), true),
    ];
    for (uri, expected) in cases {
        let (status, body) = send(&t.app, "GET", &uri, Some(&user_token), None).await?;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(body["allowed"], expected, "{uri}");
    }

    let (status, _) = send(&t.app, "GET", "/permissions/check?permission=task:teleport", Some(&user_token), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn catalog_lists_every_permission_and_role() -> Result<()> {
    let t = setup().await?;
    let user = create_user(&t.pool, Some("viewer")).await?;

    let (status, _) = send(&t.app, "GET", "/permissions/catalog", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&t.app, "GET", "/permissions/catalog", Some(&token(user)), None).await?;
    assert_eq!(status, StatusCode::OK);

    let total: usize = body["categories"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["permissions"].as_array().unwrap().len())
        .sum();
    assert_eq!(total, agile_authz::authz::Permission::ALL.len());
    assert_eq!(body["roles"].as_array().unwrap().len(), 8);
    assert_eq!(body["projectRoles"].as_array().unwrap().len(), 6);
    Ok(())
}

#[tokio::test]
async fn viewing_another_users_permissions_needs_user_view() -> Result<()> {
    let t = setup().await?;
    let admin = create_user(&t.pool, Some("admin")).await?;
    let member = create_user(&t.pool, Some("team_member")).await?;

    let (status, _) = send(&t.app, "GET", &format!("/permissions/users/{admin}"), Some(&token(member)), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&t.app, "GET", &format!("/permissions/users/{member}"), Some(&token(admin)), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["userRole"], "team_member");

    let (status, _) = send(
        &t.app,
        "GET",
        &format!("/permissions/users/{}", Uuid::new_v4()),
        Some(&token(admin)),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}
