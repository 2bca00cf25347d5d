use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

mod common;
use common::{add_member, create_project, create_user, send, setup, token};

#[tokio::test]
async fn missing_or_bad_token_is_rejected_before_authorization() -> Result<()> {
    let t = setup().await?;
    let owner = create_user(&t.pool, Some("admin")).await?;
    let project = create_project(&t.pool, owner, "P1").await?;
    let uri = format!("/projects/{project}");

    let (status, body) = send(&t.app, "GET", &uri, None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = send(&t.app, "GET", &uri, Some("not-a-jwt"), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let forged = agile_authz::jwt::JwtConfig::new("other-secret", 1).encode(owner)?;
    let (status, _) = send(&t.app, "GET", &uri, Some(&forged), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn denials_share_one_message() -> Result<()> {
    let t = setup().await?;
    let owner = create_user(&t.pool, Some("admin")).await?;
    let viewer = create_user(&t.pool, Some("viewer")).await?;
    let project = create_project(&t.pool, owner, "P1").await?;
    let viewer_token = token(viewer);

    // Missing permission.
    let (status, missing) = send(&t.app, "POST", "/projects", Some(&viewer_token), Some(json!({"name": "x"}))).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Has project:view globally but no access to this project.
    let (status, no_access) = send(&t.app, "GET", &format!("/projects/{project}"), Some(&viewer_token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    assert_eq!(missing, no_access);
    assert_eq!(missing["message"], "forbidden: insufficient permissions");
    Ok(())
}

#[tokio::test]
async fn resolution_failure_denies_with_a_generic_error() -> Result<()> {
    let t = setup().await?;
    let user = create_user(&t.pool, Some("super_admin")).await?;
    sqlx::query("UPDATE users SET deleted_at = CURRENT_TIMESTAMP WHERE id = ?")
        .bind(user.to_string())
        .execute(&t.pool)
        .await?;

    let (status, body) = send(&t.app, "POST", "/projects", Some(&token(user)), Some(json!({"name": "x"}))).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "internal server error");

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM projects").fetch_one(&t.pool).await?;
    assert_eq!(count, 0, "handler must not run");
    Ok(())
}

#[tokio::test]
async fn project_role_adds_to_a_weaker_global_role() -> Result<()> {
    let t = setup().await?;
    let owner = create_user(&t.pool, Some("admin")).await?;
    let member = create_user(&t.pool, Some("team_member")).await?;
    let p1 = create_project(&t.pool, owner, "P1").await?;
    let p2 = create_project(&t.pool, owner, "P2").await?;
    add_member(&t.pool, member, p1, "project_manager").await?;
    let member_token = token(member);

    let update = json!({"name": "Renamed"});
    let (status, body) = send(&t.app, "PUT", &format!("/projects/{p1}"), Some(&member_token), Some(update.clone())).await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["name"], "Renamed");

    let (status, _) = send(&t.app, "PUT", &format!("/projects/{p2}"), Some(&member_token), Some(update)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&t.app, "GET", &format!("/projects/{p2}"), Some(&member_token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // project_manager on a project does not grant project:delete.
    let (status, _) = send(&t.app, "DELETE", &format!("/projects/{p1}"), Some(&member_token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, list) = send(&t.app, "GET", "/projects", Some(&member_token), None).await?;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = list.as_array().unwrap().iter().filter_map(|p| p["id"].as_str()).collect();
    assert_eq!(ids, vec![p1.to_string().as_str()]);
    Ok(())
}

#[tokio::test]
async fn admin_sees_every_project_through_view_all() -> Result<()> {
    let t = setup().await?;
    let admin = create_user(&t.pool, Some("admin")).await?;
    let other = create_user(&t.pool, Some("project_manager")).await?;
    let p1 = create_project(&t.pool, other, "P1").await?;
    let p2 = create_project(&t.pool, other, "P2").await?;
    let admin_token = token(admin);

    let (status, list) = send(&t.app, "GET", "/projects", Some(&admin_token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 2);

    let (status, _) = send(&t.app, "GET", &format!("/projects/{p2}"), Some(&admin_token), None).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&t.app, "DELETE", &format!("/projects/{p1}"), Some(&admin_token), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Soft-deleted projects leave the accessible set.
    let (status, _) = send(&t.app, "GET", &format!("/projects/{p1}"), Some(&admin_token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (_, list) = send(&t.app, "GET", "/projects", Some(&admin_token), None).await?;
    assert_eq!(list.as_array().unwrap().len(), 1);
    Ok(())
}

#[tokio::test]
async fn creator_becomes_project_manager() -> Result<()> {
    let t = setup().await?;
    let pm = create_user(&t.pool, Some("project_manager")).await?;
    let pm_token = token(pm);

    let (status, project) = send(
        &t.app,
        "POST",
        "/projects",
        Some(&pm_token),
        Some(json!({"name": "Launch", "description": "Q3"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "{project}");
    assert_eq!(project["theme_color"], "#3498db");
    let id = project["id"].as_str().unwrap().to_string();

    let (status, me) = send(&t.app, "GET", "/permissions/me", Some(&pm_token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["projectRoles"][&id], "project_manager");

    let (status, _) = send(&t.app, "GET", &format!("/projects/{id}"), Some(&pm_token), None).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn project_detail_reports_the_callers_standing() -> Result<()> {
    let t = setup().await?;
    let admin = create_user(&t.pool, Some("admin")).await?;
    let member = create_user(&t.pool, Some("viewer")).await?;
    let project = create_project(&t.pool, admin, "P1").await?;
    add_member(&t.pool, member, project, "project_viewer").await?;

    let (status, detail) = send(&t.app, "GET", &format!("/projects/{project}"), Some(&token(member)), None).await?;
    assert_eq!(status, StatusCode::OK, "{detail}");
    assert_eq!(detail["name"], "P1");
    assert_eq!(detail["project_role"], "project_viewer");
    assert_eq!(detail["can_manage"], false);

    // Admin manages through the global role without any membership row.
    let (status, detail) = send(&t.app, "GET", &format!("/projects/{project}"), Some(&token(admin)), None).await?;
    assert_eq!(status, StatusCode::OK, "{detail}");
    assert!(detail["project_role"].is_null());
    assert_eq!(detail["can_manage"], true);
    Ok(())
}

#[tokio::test]
async fn malformed_project_id_is_a_bad_request() -> Result<()> {
    let t = setup().await?;
    let admin = create_user(&t.pool, Some("admin")).await?;

    let (status, _) = send(&t.app, "GET", "/projects/not-a-uuid", Some(&token(admin)), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Authentication is checked before the path is parsed.
    let (status, _) = send(&t.app, "GET", "/projects/not-a-uuid", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&t.app, "GET", &format!("/projects/{}", Uuid::new_v4()), Some(&token(admin)), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}
