#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use kitboard_server::{
    app,
    config::Config,
    db::Database,
    routes::auth::{create_token, AdminSummary},
    AppState,
};
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "test-secret";

pub struct TestApp {
    pub router: Router,
    pub db: Database,
    pub admin: AdminSummary,
    pub token: String,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub async fn spawn_app() -> TestApp {
    // A single connection that never recycles keeps the in-memory database alive.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("connect in-memory sqlite");

    let db = Database::from_pool(pool);
    db.run_migrations().await.expect("run migrations");

    let admin = AdminSummary {
        id: "admin-1".to_string(),
        email: "ops@example.com".to_string(),
        name: "Ops".to_string(),
        role: "admin".to_string(),
    };
    sqlx::query(
        "INSERT INTO admins (id, email, name, password_hash, role, created_at, updated_at) VALUES (?, ?, ?, NULL, ?, ?, ?)",
    )
    .bind(&admin.id)
    .bind(&admin.email)
    .bind(&admin.name)
    .bind(&admin.role)
    .bind("2025-01-01T00:00:00+00:00")
    .bind("2025-01-01T00:00:00+00:00")
    .execute(&db.pool)
    .await
    .expect("seed admin");

    let config = Config {
        port: 0,
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        token_ttl_hours: 1,
        bootstrap_admin: None,
    };
    let token = create_token(&admin, JWT_SECRET, 1).expect("mint token");

    let router = app(AppState {
        db: db.clone(),
        config,
    });

    TestApp {
        router,
        db,
        admin,
        token,
    }
}

impl TestApp {
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("read body")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request(Method::GET, uri, None, Some(&self.token)).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> TestResponse {
        self.request(Method::POST, uri, Some(body), Some(&self.token))
            .await
    }

    pub async fn patch(&self, uri: &str, body: Value) -> TestResponse {
        self.request(Method::PATCH, uri, Some(body), Some(&self.token))
            .await
    }

    pub async fn delete(&self, uri: &str) -> TestResponse {
        self.request(Method::DELETE, uri, None, Some(&self.token))
            .await
    }

    /// Creates a client through the API and returns its id.
    pub async fn create_client(&self, email: &str, plan: &str) -> String {
        let res = self
            .post(
                "/api/projects",
                serde_json::json!({ "email": email, "plan": plan, "name": "Acme Studio" }),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "{:?}", res.body);
        res.body["id"].as_str().expect("client id").to_string()
    }

    /// Creates a task through the API and returns its id.
    pub async fn create_task(&self, client_id: &str, title: &str) -> String {
        let res = self
            .post(
                "/api/tasks",
                serde_json::json!({ "client_id": client_id, "title": title, "type": "UPLOAD_FILE" }),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "{:?}", res.body);
        res.body["id"].as_str().expect("task id").to_string()
    }
}
