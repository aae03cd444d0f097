//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;

use cloudservice_auth::JwtEncoder;
use cloudservice_core::config::{AppConfig, DatabaseBackend};
use cloudservice_core::types::id::UserId;
use cloudservice_database::MemoryPluginStore;
use cloudservice_entity::user::UserRole;
use cloudservice_plugin::{HookRegistry, PluginManager, StaticEntryResolver};

const BOUNDARY: &str = "cloudservice-test-boundary";

/// Test application context
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// Plugin manager behind the router
    pub manager: Arc<PluginManager>,
    /// Application config
    pub config: AppConfig,
    /// Scratch directory holding plugins, archives and files
    pub root: tempfile::TempDir,
    encoder: JwtEncoder,
}

impl TestApp {
    /// Create a new test application backed by the in-memory store
    pub async fn new() -> Self {
        let root = tempfile::tempdir().expect("Failed to create temp dir");
        let path = |name: &str| root.path().join(name).to_string_lossy().into_owned();

        let mut config = AppConfig::default();
        config.database.backend = DatabaseBackend::Memory;
        config.auth.jwt_secret = "integration-test-secret".to_string();
        config.plugins.directory = path("plugins");
        config.plugins.archive_directory = path("archives");
        config.storage.data_root = path("files");
        std::fs::create_dir_all(&config.storage.data_root).expect("Failed to create data root");

        let mut catalog = StaticEntryResolver::new();
        plugin_clock_preview::register(&mut catalog);
        plugin_markdown_preview::register(&mut catalog);

        let manager = Arc::new(PluginManager::new(
            Arc::new(MemoryPluginStore::new()),
            Arc::new(HookRegistry::new()),
            config.plugins.clone(),
            vec![Arc::new(catalog)],
        ));

        let state = cloudservice_api::AppState::new(Arc::new(config.clone()), Arc::clone(&manager));
        let router = cloudservice_api::build_app(state);
        let encoder = JwtEncoder::new(&config.auth);

        Self {
            router,
            manager,
            config,
            root,
            encoder,
        }
    }

    /// Token for a user with `role`
    pub fn token(&self, role: UserRole) -> String {
        self.encoder
            .issue(UserId::new(), role, &role.to_string())
            .expect("Failed to issue token")
            .access_token
    }

    /// Token for an administrator
    pub fn admin_token(&self) -> String {
        self.token(UserRole::Admin)
    }

    /// Write a file under the storage data root
    pub fn write_file(&self, relative: &str, contents: &[u8]) -> PathBuf {
        let path = PathBuf::from(&self.config.storage.data_root).join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        std::fs::write(&path, contents).expect("Failed to write file");
        path
    }

    /// Make a JSON HTTP request to the test app
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let body_str = body
            .map(|b| serde_json::to_string(&b).expect("Failed to serialize body"))
            .unwrap_or_default();

        let mut req = Request::builder()
            .method(method)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json");

        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let req = req
            .body(Body::from(body_str))
            .expect("Failed to build request");
        self.send(req).await
    }

    /// Upload `archive` as the multipart field `archive`
    pub async fn upload(&self, archive: &[u8], token: &str) -> TestResponse {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\n\
                 Content-Disposition: form-data; name=\"archive\"; filename=\"plugin.zip\"\r\n\
                 Content-Type: application/zip\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(archive);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        let req = Request::builder()
            .method("POST")
            .uri("/api/admin/plugins")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::from(body))
            .expect("Failed to build request");
        self.send(req).await
    }

    /// Upload an archive and return the new plugin's ID
    pub async fn install(&self, archive: &[u8]) -> String {
        let response = self.upload(archive, &self.admin_token()).await;
        assert_eq!(
            response.status,
            StatusCode::CREATED,
            "Upload failed: {:?}",
            response.body
        );
        response.data()["id"]
            .as_str()
            .expect("No id in upload response")
            .to_string()
    }

    async fn send(&self, req: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), 4 * 1024 * 1024)
            .await
            .expect("Failed to read body");

        let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

        TestResponse { status, body }
    }
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Parsed JSON body
    pub body: Value,
}

impl TestResponse {
    /// The `data` member of a success envelope
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }
}

/// Build a zip archive from `(path, contents)` pairs
pub fn zip_archive(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (name, contents) in entries {
        writer.start_file(*name, options).expect("start zip entry");
        writer.write_all(contents.as_bytes()).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// Archive of the clock preview plugin
pub fn clock_archive() -> Vec<u8> {
    zip_archive(&[
        ("clock-preview/plugin.json", plugin_clock_preview::MANIFEST),
        ("clock-preview/README.md", "Analog clock preview"),
    ])
}

/// Archive of the markdown preview plugin
pub fn markdown_archive() -> Vec<u8> {
    zip_archive(&[("plugin.json", plugin_markdown_preview::MANIFEST)])
}
