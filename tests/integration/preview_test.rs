//! Integration tests for preview resolution against hot-loaded plugins.

mod helpers;

use axum::http::StatusCode;
use serde_json::json;

use cloudservice_entity::user::UserRole;

#[tokio::test]
async fn test_builtin_preview_without_plugins() {
    let app = helpers::TestApp::new().await;
    let token = app.token(UserRole::User);
    app.write_file("notes/todo.txt", b"buy <milk>");

    let response = app
        .request("GET", "/api/preview?path=notes/todo.txt", None, Some(&token))
        .await;
    assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);

    let preview = response.data();
    assert_eq!(preview["name"], "todo.txt");
    assert_eq!(preview["mime_type"], "text/plain");
    assert_eq!(preview["size"], 10);
    assert!(preview["provider"].is_null());
    assert!(preview["fallback_reason"].is_null());
    assert_eq!(
        preview["html"],
        "<pre class=\"preview-text\">buy &lt;milk&gt;</pre>"
    );
}

#[tokio::test]
async fn test_preview_rejects_bad_paths() {
    let app = helpers::TestApp::new().await;
    let token = app.token(UserRole::User);

    let anonymous = app.request("GET", "/api/preview?path=a.txt", None, None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let traversal = app
        .request("GET", "/api/preview?path=../secret.txt", None, Some(&token))
        .await;
    assert_eq!(traversal.status, StatusCode::BAD_REQUEST);

    let missing = app
        .request("GET", "/api/preview?path=nowhere.txt", None, Some(&token))
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_markdown_plugin_hot_load() {
    let app = helpers::TestApp::new().await;
    let admin = app.admin_token();
    let user = app.token(UserRole::User);
    app.write_file("docs/guide.md", b"# Guide\n\n<script>alert(1)</script>\n");
    let url = "/api/preview?path=docs/guide.md";

    let before = app.request("GET", url, None, Some(&user)).await;
    assert!(before.data()["provider"].is_null());
    assert!(before.data()["html"].as_str().unwrap().starts_with("<pre"));

    let id = app.install(&helpers::markdown_archive()).await;
    app.request("POST", &format!("/api/admin/plugins/{id}/activate"), None, Some(&admin))
        .await;

    let during = app.request("GET", url, None, Some(&user)).await;
    assert_eq!(during.data()["provider"], id.as_str());
    let html = during.data()["html"].as_str().unwrap();
    assert!(html.contains("class=\"markdown-preview\""));
    assert!(html.contains("<h1>Guide</h1>"));
    assert!(!html.contains("<script>"));

    app.request("POST", &format!("/api/admin/plugins/{id}/deactivate"), None, Some(&admin))
        .await;

    let after = app.request("GET", url, None, Some(&user)).await;
    assert!(after.data()["provider"].is_null());
    assert!(after.data()["html"].as_str().unwrap().starts_with("<pre"));
}

#[tokio::test]
async fn test_plain_text_stays_builtin_with_markdown_plugin() {
    let app = helpers::TestApp::new().await;
    let admin = app.admin_token();
    let id = app.install(&helpers::markdown_archive()).await;
    app.request("POST", &format!("/api/admin/plugins/{id}/activate"), None, Some(&admin))
        .await;
    app.write_file("plain.txt", b"*not markdown*");

    let response = app
        .request("GET", "/api/preview?path=plain.txt", None, Some(&admin))
        .await;
    assert!(response.data()["provider"].is_null());
    assert!(response.data()["fallback_reason"].is_null());
}

#[tokio::test]
async fn test_clock_plugin_by_mime_override() {
    let app = helpers::TestApp::new().await;
    let admin = app.admin_token();
    app.write_file("lobby.clock", b"");
    let id = app.install(&helpers::clock_archive()).await;
    let url = |mime: &str| format!("/api/preview?path=lobby.clock&mime_type={mime}");

    let inactive = app.request("GET", &url("application/plugin"), None, Some(&admin)).await;
    assert!(
        inactive.data()["html"]
            .as_str()
            .unwrap()
            .contains("class=\"preview-download\"")
    );

    app.request("POST", &format!("/api/admin/plugins/{id}/activate"), None, Some(&admin))
        .await;

    let response = app.request("GET", &url("application/plugin"), None, Some(&admin)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data()["mime_type"], "application/plugin");
    assert_eq!(response.data()["provider"], id.as_str());
    assert!(
        response.data()["html"]
            .as_str()
            .unwrap()
            .contains("clock-container")
    );

    let other = app.request("GET", &url("application/clock"), None, Some(&admin)).await;
    assert!(other.data()["provider"].is_null());
}

#[tokio::test]
async fn test_dashboard_widgets_follow_activation() {
    let app = helpers::TestApp::new().await;
    let admin = app.admin_token();
    let user = app.token(UserRole::User);

    let anonymous = app.request("GET", "/api/dashboard/widgets", None, None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let empty = app.request("GET", "/api/dashboard/widgets", None, Some(&user)).await;
    assert_eq!(empty.status, StatusCode::OK);
    assert_eq!(empty.data(), &json!([]));

    let id = app.install(&helpers::clock_archive()).await;
    app.request("POST", &format!("/api/admin/plugins/{id}/activate"), None, Some(&admin))
        .await;

    let widgets = app.request("GET", "/api/dashboard/widgets", None, Some(&user)).await;
    assert_eq!(widgets.status, StatusCode::OK);
    let list = widgets.data().as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"], "clock_widget");
    assert_eq!(list[0]["icon"], "bi-clock");
    assert_eq!(list[0]["size"], "small");
    assert_eq!(list[0]["css_classes"], "col-md-4");
    assert_eq!(list[0]["order"], 5);
    assert_eq!(list[0]["provider"], id.as_str());
    assert!(list[0]["html"].as_str().unwrap().contains("clock-widget"));

    app.request(
        "PUT",
        &format!("/api/admin/plugins/{id}/settings"),
        Some(json!({ "dashboard_widget": false })),
        Some(&admin),
    )
    .await;
    app.request("POST", &format!("/api/admin/plugins/{id}/deactivate"), None, Some(&admin))
        .await;
    app.request("POST", &format!("/api/admin/plugins/{id}/activate"), None, Some(&admin))
        .await;

    let hidden = app.request("GET", "/api/dashboard/widgets", None, Some(&user)).await;
    assert_eq!(hidden.data(), &json!([]));
}

#[tokio::test]
async fn test_failing_provider_falls_back() {
    let app = helpers::TestApp::new().await;
    let admin = app.admin_token();
    let id = app.install(&helpers::markdown_archive()).await;
    app.request(
        "PUT",
        &format!("/api/admin/plugins/{id}/settings"),
        Some(json!({ "max_bytes": 4 })),
        Some(&admin),
    )
    .await;
    app.request("POST", &format!("/api/admin/plugins/{id}/activate"), None, Some(&admin))
        .await;
    app.write_file("big.md", b"# far more than four bytes");

    let response = app
        .request("GET", "/api/preview?path=big.md", None, Some(&admin))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.data()["provider"].is_null());
    assert!(
        response.data()["fallback_reason"]
            .as_str()
            .is_some_and(|r| r.contains("markdown limit"))
    );
    assert!(response.data()["html"].as_str().unwrap().starts_with("<pre"));
}

#[tokio::test]
async fn test_health_reports_loaded_plugins() {
    let app = helpers::TestApp::new().await;
    let admin = app.admin_token();

    let empty = app.request("GET", "/api/health", None, None).await;
    assert_eq!(empty.status, StatusCode::OK);
    assert_eq!(empty.data()["loaded_plugins"], 0);

    let id = app.install(&helpers::clock_archive()).await;
    app.request("POST", &format!("/api/admin/plugins/{id}/activate"), None, Some(&admin))
        .await;

    let health = app.request("GET", "/api/health", None, None).await;
    assert_eq!(health.data()["status"], "ok");
    assert_eq!(health.data()["loaded_plugins"], 1);
}
