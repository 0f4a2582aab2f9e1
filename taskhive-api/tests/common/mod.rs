//! Common test utilities for integration tests
//!
//! This module provides shared infrastructure for integration tests:
//! - An in-memory store behind the real router
//! - A temporary upload directory
//! - User registration and token helpers
//! - JSON and multipart request builders

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use taskhive_api::app::{build_router, AppState};
use taskhive_api::config::{ApiConfig, Config, JwtConfig, UploadConfig};
use taskhive_shared::store::memory::MemoryStore;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

pub const JWT_SECRET: &str = "integration-test-secret-at-least-32-bytes";

/// Registered emails that get the admin flag
pub const ADMIN_EMAIL: &str = "admin@example.com";

/// Image cap used by the test server
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024;

const BOUNDARY: &str = "taskhive-test-boundary";

/// A registered user and their token
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub token: String,
}

impl TestUser {
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Test context containing all necessary resources
pub struct TestContext {
    pub state: AppState,
    pub app: axum::Router,
    pub upload_dir: TempDir,
}

impl TestContext {
    /// Fresh router over an empty in-memory store
    pub fn new() -> Self {
        let upload_dir = tempfile::tempdir().expect("create upload dir");
        let config = Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors_origins: vec!["*".to_string()],
                production: false,
            },
            database: None,
            jwt: JwtConfig {
                secret: JWT_SECRET.to_string(),
            },
            uploads: UploadConfig {
                dir: upload_dir.path().to_path_buf(),
                max_bytes: MAX_UPLOAD_BYTES,
            },
            admin_emails: vec![ADMIN_EMAIL.to_string()],
        };

        let state = AppState::new(Arc::new(MemoryStore::new()), config);
        let app = build_router(state.clone());

        Self {
            state,
            app,
            upload_dir,
        }
    }

    /// Sends a request and returns status plus raw body
    pub async fn send_raw(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    /// Sends a request and parses the body as JSON (`Null` when empty)
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let (status, body) = self.send_raw(request).await;
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or_else(|_| {
                panic!("non-JSON body ({}): {}", status, String::from_utf8_lossy(&body))
            })
        };
        (status, json)
    }

    /// Registers a user through the API
    pub async fn register(&self, email: &str, display_name: &str) -> TestUser {
        let (status, body) = self
            .send(json_request(
                Method::POST,
                "/api/users/register",
                None,
                serde_json::json!({
                    "email": email,
                    "password": "correct horse battery",
                    "displayName": display_name,
                }),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);

        TestUser {
            id: body["user"]["id"].as_str().unwrap().parse().unwrap(),
            email: email.to_string(),
            token: body["token"].as_str().unwrap().to_string(),
        }
    }

    /// Creates a group and returns its id
    pub async fn create_group(&self, owner: &TestUser, name: &str, visibility: &str) -> Uuid {
        let (status, body) = self
            .send(json_request(
                Method::POST,
                "/api/groups",
                Some(owner),
                serde_json::json!({ "name": name, "visibility": visibility }),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "create group failed: {}", body);
        body["id"].as_str().unwrap().parse().unwrap()
    }
}

/// Builds a JSON request, optionally authenticated
pub fn json_request(method: Method, uri: &str, user: Option<&TestUser>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(user) = user {
        builder = builder.header(header::AUTHORIZATION, user.auth_header());
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Builds a body-less request, optionally authenticated
pub fn empty_request(method: Method, uri: &str, user: Option<&TestUser>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(header::AUTHORIZATION, user.auth_header());
    }
    builder.body(Body::empty()).unwrap()
}

/// A file part for [`multipart_request`]
pub struct FilePart<'a> {
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub data: &'a [u8],
}

/// Builds a `multipart/form-data` request with text fields and an optional `image`
pub fn multipart_request(
    method: Method,
    uri: &str,
    user: &TestUser,
    fields: &[(&str, &str)],
    image: Option<FilePart<'_>>,
) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some(file) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                file.file_name, file.content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(file.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, user.auth_header())
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Minimal PNG-looking payload
pub fn png_bytes() -> Vec<u8> {
    let mut data = b"\x89PNG\r\n\x1a\n".to_vec();
    data.extend((0u8..=255).cycle().take(512));
    data
}
