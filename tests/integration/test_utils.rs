//! Shared helpers: app construction, request builders and a small
//! multipart encoder.

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use snapshelf::config::Config;
use snapshelf::db::init_in_memory;
use snapshelf::{api::create_router, AppState};

pub const TEST_SECRET: &str = "integration-test-signing-key";

/// File size ceiling used by test apps
pub const TEST_MAX_FILE_SIZE: usize = 16 * 1024;

const BOUNDARY: &str = "----snapshelf-test-boundary";

/// A router wired to a private database and upload directory
pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub uploads: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let uploads = TempDir::new().unwrap();

        let mut config = Config::default();
        config.auth.jwt_secret = Some(TEST_SECRET.to_string());
        config.upload.dir = uploads.path().to_path_buf();
        config.upload.max_file_size = TEST_MAX_FILE_SIZE;

        let db = tokio_test::assert_ok!(init_in_memory().await);
        let state = Arc::new(AppState::new(config, db));
        let router = create_router(state.clone());

        Self {
            router,
            state,
            uploads,
        }
    }

    /// Send a request and decode the body as JSON (`Value::Null` if empty or not JSON)
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    /// Send a request and return the raw body
    pub async fn send_raw(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    /// Register an account and return `(token, user_id)`
    pub async fn register(&self, username: &str, email: &str, password: &str) -> (String, String) {
        let (status, body) = self
            .send(json_request(
                Method::POST,
                "/api/auth/register",
                None,
                serde_json::json!({
                    "username": username,
                    "email": email,
                    "password": password,
                }),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);

        (
            body["token"].as_str().unwrap().to_string(),
            body["user"]["id"].as_str().unwrap().to_string(),
        )
    }

    /// Upload an image and return the created record
    pub async fn upload(&self, token: &str, parts: &[Part<'_>]) -> (StatusCode, Value) {
        self.send(multipart_request("/api/images/upload", Some(token), parts))
            .await
    }

    /// Upload a small PNG with the given title and visibility
    pub async fn upload_png(&self, token: &str, title: &str, is_public: bool) -> Value {
        let visibility = if is_public { "true" } else { "false" };
        let (status, body) = self
            .upload(
                token,
                &[
                    Part::file("image", "photo.png", "image/png", PNG_BYTES),
                    Part::text("title", title),
                    Part::text("isPublic", visibility),
                ],
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "upload failed: {}", body);
        body
    }

    pub fn upload_dir(&self) -> &Path {
        self.uploads.path()
    }

    /// Number of files currently in the upload directory
    pub fn stored_file_count(&self) -> usize {
        match std::fs::read_dir(self.upload_dir()) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }
}

/// PNG signature followed by filler; content is never decoded
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n0000IHDRtest-image-bytes";

pub fn empty_request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// One part of a multipart form
pub enum Part<'a> {
    Text {
        name: &'a str,
        value: &'a str,
    },
    File {
        name: &'a str,
        filename: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    },
}

impl<'a> Part<'a> {
    pub fn text(name: &'a str, value: &'a str) -> Self {
        Part::Text { name, value }
    }

    pub fn file(name: &'a str, filename: &'a str, content_type: &'a str, data: &'a [u8]) -> Self {
        Part::File {
            name,
            filename,
            content_type,
            data,
        }
    }
}

/// Encode parts as a `multipart/form-data` body
pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                filename,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                        name, filename
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn multipart_request(uri: &str, token: Option<&str>, parts: &[Part<'_>]) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(multipart_body(parts))).unwrap()
}
