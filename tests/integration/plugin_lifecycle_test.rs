//! Integration tests for plugin upload, activation, deactivation and removal.

mod helpers;

use axum::http::StatusCode;
use serde_json::json;

use cloudservice_entity::user::UserRole;
use cloudservice_plugin::HookPoint;

#[tokio::test]
async fn test_upload_installs_inactive_plugin() {
    let app = helpers::TestApp::new().await;
    let token = app.admin_token();

    let response = app.upload(&helpers::clock_archive(), &token).await;
    assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);

    let plugin = response.data();
    assert_eq!(plugin["slug"], "clock-preview");
    assert_eq!(plugin["module_name"], "clock_preview");
    assert_eq!(plugin["status"], "inactive");
    assert_eq!(plugin["enabled"], false);
    assert_eq!(plugin["is_local"], false);
    assert_eq!(plugin["loaded"], false);
    assert_eq!(plugin["settings"]["show_digital"], true);
    assert_eq!(plugin["position"], "left");
    assert_eq!(plugin["has_settings"], true);
    assert_eq!(plugin["settings_schema"]["type"], "object");

    let extracted = app.root.path().join("plugins/clock_preview/plugin.json");
    assert!(extracted.is_file(), "wrapper directory should be stripped");

    let list = app.request("GET", "/api/admin/plugins", None, Some(&token)).await;
    assert_eq!(list.status, StatusCode::OK);
    assert_eq!(list.data().as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_upload_requires_admin() {
    let app = helpers::TestApp::new().await;

    let anonymous = app
        .request("GET", "/api/admin/plugins", None, None)
        .await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let user = app.token(UserRole::User);
    let response = app.upload(&helpers::clock_archive(), &user).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body["error"], "FORBIDDEN");
    assert!(app.manager.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_rejects_bad_archives() {
    let app = helpers::TestApp::new().await;
    let token = app.admin_token();

    let not_zip = app.upload(b"definitely not a zip", &token).await;
    assert_eq!(not_zip.status, StatusCode::BAD_REQUEST);

    let no_manifest = app
        .upload(&helpers::zip_archive(&[("readme.txt", "hi")]), &token)
        .await;
    assert_eq!(no_manifest.status, StatusCode::BAD_REQUEST);

    let bad_slug = helpers::zip_archive(&[(
        "plugin.json",
        r#"{"name":"Bad","slug":"Bad Slug","version":"1.0.0","entry_point":"bad.apps.BadConfig"}"#,
    )]);
    let response = app.upload(&bad_slug, &token).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    assert!(app.manager.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_slug_conflicts() {
    let app = helpers::TestApp::new().await;
    let token = app.admin_token();

    app.install(&helpers::clock_archive()).await;
    let again = app.upload(&helpers::clock_archive(), &token).await;
    assert_eq!(again.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_activate_and_deactivate_round_trip() {
    let app = helpers::TestApp::new().await;
    let token = app.admin_token();
    let id = app.install(&helpers::clock_archive()).await;

    let active = app
        .request("POST", &format!("/api/admin/plugins/{id}/activate"), None, Some(&token))
        .await;
    assert_eq!(active.status, StatusCode::OK);
    assert_eq!(active.data()["status"], "active");
    assert_eq!(active.data()["enabled"], true);
    assert_eq!(active.data()["loaded"], true);
    // the preview provider and the dashboard widget
    assert_eq!(active.data()["hook_registrations"], 2);
    assert!(active.data()["activated_at"].is_string());

    let hooks = app
        .request("GET", "/api/admin/plugins/hooks", None, Some(&token))
        .await;
    assert_eq!(
        hooks.data(),
        &json!([
            { "hook": "file_preview_provider", "handlers": 1 },
            { "hook": "ui_dashboard_widget", "handlers": 1 }
        ])
    );

    let again = app
        .request("POST", &format!("/api/admin/plugins/{id}/activate"), None, Some(&token))
        .await;
    assert_eq!(again.data()["hook_registrations"], 2);

    let inactive = app
        .request("POST", &format!("/api/admin/plugins/{id}/deactivate"), None, Some(&token))
        .await;
    assert_eq!(inactive.status, StatusCode::OK);
    assert_eq!(inactive.data()["status"], "inactive");
    assert_eq!(inactive.data()["enabled"], false);
    assert_eq!(inactive.data()["loaded"], false);
    assert_eq!(inactive.data()["hook_registrations"], 0);

    let hooks = app
        .request("GET", "/api/admin/plugins/hooks", None, Some(&token))
        .await;
    assert_eq!(hooks.data().as_array().map(Vec::len), Some(0));

    let logs = app
        .request("GET", &format!("/api/admin/plugins/{id}/logs"), None, Some(&token))
        .await;
    let actions: Vec<&str> = logs.data()["items"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|l| l["action"].as_str())
        .collect();
    assert_eq!(actions, ["deactivated", "activated", "uploaded"]);
}

#[tokio::test]
async fn test_failed_activation_is_recorded() {
    let app = helpers::TestApp::new().await;
    let token = app.admin_token();
    let archive = helpers::zip_archive(&[(
        "plugin.json",
        r#"{"name":"Ghost","slug":"ghost","version":"0.1.0","entry_point":"ghost.apps.GhostConfig"}"#,
    )]);
    let id = app.install(&archive).await;

    let response = app
        .request("POST", &format!("/api/admin/plugins/{id}/activate"), None, Some(&token))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data()["status"], "error");
    assert_eq!(response.data()["loaded"], false);
    assert!(
        response.data()["error_message"]
            .as_str()
            .is_some_and(|m| !m.is_empty())
    );

    let logs = app
        .request("GET", "/api/admin/plugins/logs?action=error", None, Some(&token))
        .await;
    assert_eq!(logs.data()["total_items"], 1);
    assert_eq!(logs.data()["items"][0]["plugin_id"], id.as_str());
}

#[tokio::test]
async fn test_settings_update() {
    let app = helpers::TestApp::new().await;
    let token = app.admin_token();
    let id = app.install(&helpers::clock_archive()).await;
    let path = format!("/api/admin/plugins/{id}/settings");

    let rejected = app.request("PUT", &path, Some(json!([1, 2])), Some(&token)).await;
    assert_eq!(rejected.status, StatusCode::BAD_REQUEST);

    let updated = app
        .request(
            "PUT",
            &path,
            Some(json!({ "show_digital": false, "caption": "Lobby" })),
            Some(&token),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.data()["settings"]["caption"], "Lobby");
}

#[tokio::test]
async fn test_uninstall_removes_record_and_files() {
    let app = helpers::TestApp::new().await;
    let token = app.admin_token();
    let id = app.install(&helpers::clock_archive()).await;
    app.request("POST", &format!("/api/admin/plugins/{id}/activate"), None, Some(&token))
        .await;

    let response = app
        .request("DELETE", &format!("/api/admin/plugins/{id}"), None, Some(&token))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(app.manager.registry().handler_count(HookPoint::FilePreviewProvider), 0);
    assert_eq!(app.manager.registry().handler_count(HookPoint::DashboardWidget), 0);
    assert!(!app.root.path().join("plugins/clock_preview").exists());

    let gone = app
        .request("GET", &format!("/api/admin/plugins/{id}"), None, Some(&token))
        .await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);

    let logs = app
        .request("GET", &format!("/api/admin/plugins/{id}/logs"), None, Some(&token))
        .await;
    assert_eq!(logs.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_discover_registers_local_plugin() {
    let app = helpers::TestApp::new().await;
    let token = app.admin_token();

    let dir = app.root.path().join("plugins/markdown_preview");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("plugin.json"), plugin_markdown_preview::MANIFEST).unwrap();
    let stray = app.root.path().join("plugins/not_a_plugin");
    std::fs::create_dir_all(&stray).unwrap();
    std::fs::write(stray.join("plugin.json"), "{ broken").unwrap();

    let response = app
        .request("POST", "/api/admin/plugins/discover", None, Some(&token))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data()["created"], json!(["markdown-preview"]));
    assert_eq!(response.data()["invalid"], json!(["not_a_plugin"]));

    let plugins = app.manager.list().await.unwrap();
    assert_eq!(plugins.len(), 1);
    assert!(plugins[0].is_local);
    assert!(plugins[0].archive_path.is_none());

    let again = app
        .request("POST", "/api/admin/plugins/discover", None, Some(&token))
        .await;
    assert_eq!(again.data()["created"], json!([]));
}

#[tokio::test]
async fn test_restart_restores_enabled_plugins() {
    let app = helpers::TestApp::new().await;
    let id = app.install(&helpers::clock_archive()).await;
    let token = app.admin_token();
    app.request("POST", &format!("/api/admin/plugins/{id}/activate"), None, Some(&token))
        .await;

    // a process restart loses loaded modules but keeps the store
    app.manager.shutdown().await;
    assert_eq!(app.manager.registry().owned_count(id.parse().unwrap()), 0);

    let summary = app.manager.load_all_enabled().await.unwrap();
    assert_eq!(summary.activated, 1);
    assert_eq!(summary.failed, 0);

    let plugin = app
        .request("GET", &format!("/api/admin/plugins/{id}"), None, Some(&token))
        .await;
    assert_eq!(plugin.data()["loaded"], true);
    assert_eq!(plugin.data()["hook_registrations"], 2);
}

#[tokio::test]
async fn test_manifest_hooks_are_not_registered_twice() {
    let app = helpers::TestApp::new().await;
    let admin = app.admin_token();
    let manifest = json!({
        "name": "Clock",
        "slug": "clock-preview",
        "version": "1.0.0",
        "author": "X",
        "entry_point": "clock_preview.apps.ClockPreviewConfig",
        "hooks": {
            "file_preview_provider": {
                "handler": "clock_preview.handlers.ClockPreviewProvider",
                "mime_types": ["application/plugin"]
            }
        }
    })
    .to_string();
    let archive = helpers::zip_archive(&[("clock-preview/plugin.json", &manifest)]);
    let id = app.install(&archive).await;

    let active = app
        .request("POST", &format!("/api/admin/plugins/{id}/activate"), None, Some(&admin))
        .await;
    assert_eq!(active.status, StatusCode::OK);
    assert_eq!(active.data()["status"], "active");
    assert_eq!(active.data()["hook_registrations"], 1);

    let registry = app.manager.registry();
    let providers = registry.get_handlers(HookPoint::FilePreviewProvider, Some("application/plugin"));
    assert_eq!(providers.len(), 1);
    assert_eq!(providers[0].owner.to_string(), id);
    assert_eq!(registry.handler_count(HookPoint::DashboardWidget), 0);

    app.write_file("demo.plug", b"");
    let preview = app
        .request(
            "GET",
            "/api/preview?path=demo.plug&mime_type=application/plugin",
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(preview.data()["provider"], id.as_str());
    assert!(preview.data()["html"].as_str().unwrap().contains("clock-container"));

    app.request("POST", &format!("/api/admin/plugins/{id}/deactivate"), None, Some(&admin))
        .await;
    assert_eq!(registry.handler_count(HookPoint::FilePreviewProvider), 0);

    let after = app
        .request(
            "GET",
            "/api/preview?path=demo.plug&mime_type=application/plugin",
            None,
            Some(&admin),
        )
        .await;
    assert!(after.data()["provider"].is_null());
    assert!(
        after.data()["html"]
            .as_str()
            .unwrap()
            .contains("class=\"preview-download\"")
    );
}

#[tokio::test]
async fn test_position_update() {
    let app = helpers::TestApp::new().await;
    let admin = app.admin_token();
    let id = app.install(&helpers::clock_archive()).await;
    let path = format!("/api/admin/plugins/{id}/position");

    let user = app.token(UserRole::User);
    let forbidden = app
        .request("PUT", &path, Some(json!({ "position": "right" })), Some(&user))
        .await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);

    let invalid = app
        .request("PUT", &path, Some(json!({ "position": "top" })), Some(&admin))
        .await;
    assert!(invalid.status.is_client_error());

    let moved = app
        .request("PUT", &path, Some(json!({ "position": "center" })), Some(&admin))
        .await;
    assert_eq!(moved.status, StatusCode::OK, "{:?}", moved.body);
    assert_eq!(moved.data()["position"], "center");
    assert_eq!(moved.data()["status"], "inactive");

    let plugin = app
        .request("GET", &format!("/api/admin/plugins/{id}"), None, Some(&admin))
        .await;
    assert_eq!(plugin.data()["position"], "center");
}
