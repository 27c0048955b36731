//! Test helpers: build AppState and router for integration tests.
//!
//! Run from workspace root: `cargo test -p ephemera-api`.

#![allow(dead_code)]

pub mod fixtures;

use axum::Router;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use ephemera_api::setup::routes;
use ephemera_api::state::AppState;
use ephemera_core::{Clock, Config, ManualClock};
use ephemera_storage::{LocalStorage, ObjectStore};
use std::sync::Arc;
use tempfile::TempDir;

pub const TEST_NOW: i64 = 1_700_000_000;
pub const TEST_TTL_LIMIT: i64 = 3_600;

/// Test application: server, storage, clock, and owned resources.
pub struct TestApp {
    pub server: TestServer,
    pub store: Arc<dyn ObjectStore>,
    pub clock: Arc<ManualClock>,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Names currently in the store, sorted.
    pub async fn stored_names(&self) -> Vec<String> {
        let mut names = self.store.list().await.expect("list store");
        names.sort();
        names
    }
}

/// Setup test app with an isolated upload directory and a manual clock.
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(|_| {}).await
}

pub async fn setup_test_app_with(configure: impl FnOnce(&mut Config)) -> TestApp {
    let parts = build_test_router(configure, None).await;
    TestApp::from_parts(parts)
}

/// Setup test app backed by `store` instead of local storage.
pub async fn setup_test_app_with_store(store: Arc<dyn ObjectStore>) -> TestApp {
    let parts = build_test_router(|_| {}, Some(store)).await;
    TestApp::from_parts(parts)
}

/// Router and owned resources, for tests that drive the service directly.
pub struct TestRouter {
    pub router: Router,
    pub store: Arc<dyn ObjectStore>,
    pub clock: Arc<ManualClock>,
    pub temp_dir: TempDir,
}

impl TestApp {
    fn from_parts(parts: TestRouter) -> Self {
        let server = TestServer::new(parts.router).expect("create test server");
        TestApp {
            server,
            store: parts.store,
            clock: parts.clock,
            _temp_dir: parts.temp_dir,
        }
    }
}

pub async fn build_test_router(
    configure: impl FnOnce(&mut Config),
    store: Option<Arc<dyn ObjectStore>>,
) -> TestRouter {
    let temp_dir = TempDir::new().expect("create temp dir");

    let mut config = Config {
        upload_dir: temp_dir.path().to_path_buf(),
        ttl_limit_secs: TEST_TTL_LIMIT,
        ..Config::default()
    };
    configure(&mut config);

    let store: Arc<dyn ObjectStore> = match store {
        Some(store) => store,
        None => Arc::new(
            LocalStorage::new(temp_dir.path())
                .await
                .expect("create local storage"),
        ),
    };
    let clock = Arc::new(ManualClock::new(TEST_NOW));
    let clock_dyn: Arc<dyn Clock> = clock.clone();

    let state = Arc::new(AppState::new(config.clone(), store.clone(), clock_dyn));
    let router = routes::setup_routes(&config, state);

    TestRouter {
        router,
        store,
        clock,
        temp_dir,
    }
}

/// Multipart form with `expires_in` first, then the file.
pub fn upload_form(expires_in: &str, bytes: Vec<u8>, file_name: &str) -> MultipartForm {
    MultipartForm::new()
        .add_text("expires_in", expires_in.to_string())
        .add_part("file", Part::bytes(bytes).file_name(file_name.to_string()))
}

/// Upload and return the URL from the response.
pub async fn upload_png(app: &TestApp, expires_in: i64) -> String {
    let response = app
        .client()
        .post("/upload")
        .multipart(upload_form(
            &expires_in.to_string(),
            fixtures::create_minimal_png(),
            "pixel.png",
        ))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    body["url"].as_str().expect("url in response").to_string()
}
