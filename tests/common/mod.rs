#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use studio_gallery::assets::DiskAssetHost;
use studio_gallery::cart::CartSlot;
use studio_gallery::config::AdminAllowList;
use studio_gallery::error::AppError;
use studio_gallery::models::BookingCartItem;
use studio_gallery::notifier::OutboxNotifier;
use studio_gallery::AppState;

pub const ADMIN_EMAIL: &str = "admin@studio.test";

pub async fn test_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("Failed to create in-memory SQLite pool");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

/// Insert a customer account directly and return its id.
pub async fn insert_user(pool: &SqlitePool, name: &str, email: &str) -> String {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(name)
    .bind(email)
    .bind("unused")
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .expect("Failed to create test user");
    id
}

/// In-memory cart slot for driving the cart without a session.
#[derive(Clone, Default)]
pub struct MemorySlot(pub Arc<Mutex<Option<Vec<BookingCartItem>>>>);

#[async_trait]
impl CartSlot<BookingCartItem> for MemorySlot {
    async fn load(&self) -> Result<Option<Vec<BookingCartItem>>, AppError> {
        Ok(self.0.lock().unwrap().clone())
    }

    async fn store(&self, items: &[BookingCartItem]) -> Result<(), AppError> {
        *self.0.lock().unwrap() = Some(items.to_vec());
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub db: SqlitePool,
    pub state: AppState,
    pub assets: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let pool = test_pool().await;
        let assets = tempfile::tempdir().expect("Failed to create asset dir");
        let host = DiskAssetHost::new(assets.path(), "/assets");
        let notifier = OutboxNotifier::new(pool.clone(), "studio@studio.test".to_string());

        let state = AppState::new(
            pool.clone(),
            Arc::new(host.clone()),
            Arc::new(notifier),
            AdminAllowList::parse(ADMIN_EMAIL),
        )
        .await
        .expect("Failed to build app state");

        let router = studio_gallery::build_app(state.clone(), &host, false)
            .await
            .expect("Failed to build router");

        Self {
            router,
            db: pool,
            state,
            assets,
        }
    }

    /// Send a request through the app and return the response.
    pub async fn request(&self, req: Request<Body>) -> Response {
        tower::ServiceExt::oneshot(self.router.clone(), req)
            .await
            .unwrap()
    }

    /// Sign up a customer account and return the session cookie.
    pub async fn signup(&self, name: &str, email: &str) -> String {
        let body = serde_json::json!({ "name": name, "email": email, "password": "correct horse" });
        let resp = self.post_json("/signup", &body, None).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        session_cookie(&resp).expect("Signup should set a session cookie")
    }

    pub async fn admin(&self) -> String {
        self.signup("Studio Admin", ADMIN_EMAIL).await
    }

    /// Send a GET request with an optional session cookie.
    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }
        let req = builder.body(Body::empty()).unwrap();
        self.request(req).await
    }

    /// Send a POST JSON request with an optional session cookie.
    pub async fn post_json(&self, uri: &str, body: &Value, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder()
            .uri(uri)
            .method("POST")
            .header("content-type", "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }
        let req = builder.body(Body::from(body.to_string())).unwrap();
        self.request(req).await
    }

    /// Send a multipart upload with one part per `(file_name, bytes)`.
    pub async fn post_files(&self, uri: &str, files: &[(&str, &[u8])], cookie: Option<&str>) -> Response {
        let parts: Vec<(&str, &str, &[u8])> = files
            .iter()
            .map(|(file_name, bytes)| ("files", *file_name, *bytes))
            .collect();
        self.post_multipart(uri, &[], &parts, cookie).await
    }

    /// Send a multipart form with text `fields` and `(field, file_name, bytes)` files.
    pub async fn post_multipart(
        &self,
        uri: &str,
        fields: &[(&str, &str)],
        files: &[(&str, &str, &[u8])],
        cookie: Option<&str>,
    ) -> Response {
        let boundary = "studio-test-boundary";
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        for (name, file_name, bytes) in files {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: image/jpeg\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

        let mut builder = Request::builder()
            .uri(uri)
            .method("POST")
            .header("content-type", format!("multipart/form-data; boundary={boundary}"));
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }
        let req = builder.body(Body::from(body)).unwrap();
        self.request(req).await
    }

    /// Send a PATCH JSON request with an optional session cookie.
    pub async fn patch_json(&self, uri: &str, body: &Value, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder()
            .uri(uri)
            .method("PATCH")
            .header("content-type", "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }
        let req = builder.body(Body::from(body.to_string())).unwrap();
        self.request(req).await
    }

    /// Send a DELETE request with an optional session cookie.
    pub async fn delete(&self, uri: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder().uri(uri).method("DELETE");
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }
        let req = builder.body(Body::empty()).unwrap();
        self.request(req).await
    }
}

/// The `name=value` part of the response's session cookie, if it set one.
pub fn session_cookie(resp: &Response) -> Option<String> {
    resp.headers()
        .get("set-cookie")?
        .to_str()
        .ok()?
        .split(';')
        .next()
        .map(str::to_string)
}

/// Read the full response body as JSON.
pub async fn body_json(resp: Response) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
