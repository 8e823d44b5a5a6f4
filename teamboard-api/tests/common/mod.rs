//! Common test utilities for integration tests
//!
//! Builds the full router over a test database and a temporary upload
//! directory, and offers small helpers for driving it with
//! `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool};
use teamboard_api::app::{build_router, AppState};
use teamboard_api::config::Config;
use teamboard_shared::storage::LocalAttachmentStore;
use tempfile::TempDir;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "integration-test-secret-0123456789abcdef";

/// Test context holding the router and what it writes to
pub struct TestContext {
    pub app: Router,
    pub db: PgPool,
    pub uploads: TempDir,
}

pub fn test_config(upload_dir: &std::path::Path) -> Config {
    let vars: HashMap<String, String> = [
        ("DATABASE_URL", "postgresql://localhost/unused"),
        ("JWT_SECRET", JWT_SECRET),
        ("UPLOAD_BASE_URL", "/uploads"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .chain([("UPLOAD_DIR".to_string(), upload_dir.display().to_string())])
    .collect();

    Config::from_vars(&vars).expect("test config")
}

impl TestContext {
    pub fn new(db: PgPool) -> Self {
        let uploads = tempfile::tempdir().expect("tempdir");
        let config = test_config(uploads.path());
        let store = Arc::new(LocalAttachmentStore::new(uploads.path(), "/uploads"));
        let app = build_router(AppState::new(db.clone(), config, store));

        Self { app, db, uploads }
    }

    /// Router over a pool that never connects, for tests that stop before
    /// touching the database
    pub fn offline() -> Self {
        let db = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy("postgresql://nobody@127.0.0.1:1/none")
            .expect("lazy pool");
        Self::new(db)
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");

        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into()))
        };

        (status, json)
    }

    pub async fn json(&self, method: &str, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        self.send(builder.body(Body::from(body.to_string())).expect("request"))
            .await
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .expect("request");

        self.send(request).await
    }

    /// Registers an account and returns its access token
    pub async fn register(&self, name: &str, email: &str) -> String {
        let (status, body) = self
            .json(
                "POST",
                "/auth/register",
                None,
                serde_json::json!({ "name": name, "email": email, "password": "secret1" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "register failed: {body}");

        body["access_token"].as_str().expect("access_token").to_string()
    }
}

/// Builds a `multipart/form-data` body from `(name, file_name, content)` parts
pub fn multipart_body(boundary: &str, parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, file_name, content) in parts {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        match file_name {
            Some(file_name) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}
