//! Server test utilities.

use super::fixtures::ADMIN_PASSWORD;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use depot_core::config::{AdminConfig, AppConfig, EngineSeed, MetadataConfig, StorageSeed};
use depot_engine::Engine;
use depot_metadata::{MetadataStore, SqliteStore};
use depot_server::{AppState, bootstrap, create_router};
use depot_storage::DriverRegistry;
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// Chunk size used by test servers, small enough to split test payloads.
pub const TEST_CHUNK_SIZE: u64 = 1024;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    temp_dir: TempDir,
}

/// A fully buffered response.
#[allow(dead_code)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

#[allow(dead_code)]
impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }
}

#[allow(dead_code)]
impl TestServer {
    /// Three local storages, chunk size 1 KiB, two replicas per chunk.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("metadata.db");

        let storages = ["alpha", "beta", "gamma"]
            .into_iter()
            .map(|name| {
                let path = temp_dir.path().join("storages").join(name);
                std::fs::create_dir_all(&path).expect("Failed to create storage directory");
                let mut settings = serde_json::Map::new();
                settings.insert("path".to_string(), json!(path));
                StorageSeed {
                    name: name.to_string(),
                    driver: "local".to_string(),
                    priority: 5,
                    enabled: true,
                    settings,
                }
            })
            .collect();

        let mut config = AppConfig {
            metadata: MetadataConfig::Sqlite {
                path: db_path.clone(),
                query_timeout_secs: None,
            },
            admin: AdminConfig::for_testing(),
            engine: EngineSeed {
                chunk_size: Some(TEST_CHUNK_SIZE),
                num_storages: Some(2),
                secret_key: Some("test-secret".to_string()),
            },
            storages,
            ..AppConfig::default()
        };
        modifier(&mut config);

        let metadata: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(&db_path, None)
                .await
                .expect("Failed to create metadata store"),
        );
        let engine = Arc::new(Engine::with_seed(metadata, DriverRegistry::builtin(), 7));
        bootstrap::run(&config, &engine)
            .await
            .expect("Failed to bootstrap");

        let state = AppState::new(config, engine);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            temp_dir,
        }
    }

    /// Get access to the underlying metadata.
    pub fn metadata(&self) -> Arc<dyn MetadataStore> {
        self.state.metadata.clone()
    }

    /// Directory holding the replicas of a seeded storage.
    pub fn storage_dir(&self, name: &str) -> std::path::PathBuf {
        self.temp_dir.path().join("storages").join(name)
    }

    /// Send a request and buffer the response.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Send a request with an optional JSON body and bearer token.
    pub async fn json(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let body = match body {
            Some(v) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(serde_json::to_vec(&v).unwrap())
            }
            None => Body::empty(),
        };
        let response = self.send(builder.body(body).unwrap()).await;
        (response.status, response.json())
    }

    /// Upload raw bytes as `filename`.
    pub async fn upload(&self, filename: &str, data: Vec<u8>, token: &str) -> TestResponse {
        let uri = format!(
            "/v1/files?filename={}",
            percent_encoding::utf8_percent_encode(filename, percent_encoding::NON_ALPHANUMERIC)
        );
        let request = Request::builder()
            .method("PUT")
            .uri(uri)
            .header("Authorization", format!("Bearer {}", token))
            .body(Body::from(data))
            .unwrap();
        self.send(request).await
    }

    /// GET a byte stream with a bearer token.
    pub async fn get_bytes(&self, uri: &str, token: &str) -> TestResponse {
        let request = Request::builder()
            .uri(uri)
            .header("Authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Log in and return the bearer token.
    pub async fn login(&self, username: &str, password: &str) -> String {
        let (status, body) = self
            .json(
                "POST",
                "/v1/users/login",
                Some(json!({"username": username, "password": password})),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["token"].as_str().unwrap().to_string()
    }

    /// Token for the bootstrap admin (`rwa`).
    pub async fn admin_token(&self) -> String {
        self.login("admin", ADMIN_PASSWORD).await
    }

    /// Register a user, grant `permissions` directly in the store and log in.
    pub async fn user_token(&self, username: &str, permissions: &str) -> String {
        let password = format!("{username}-password");
        let (status, _) = self
            .json(
                "POST",
                "/v1/users/register",
                Some(json!({"username": username, "password": password})),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let sqlite = SqliteStore::new(self.db_path(), None).await.unwrap();
        sqlx::query("UPDATE users SET permissions = ? WHERE username = ?")
            .bind(permissions)
            .bind(username)
            .execute(sqlite.pool())
            .await
            .unwrap();

        self.login(username, &password).await
    }

    fn db_path(&self) -> std::path::PathBuf {
        self.temp_dir.path().join("metadata.db")
    }
}
