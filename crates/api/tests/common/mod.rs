#![allow(dead_code)]

use std::io::Write;
use std::path::Path;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tempfile::TempDir;
use tower::ServiceExt;
use zip::write::SimpleFileOptions;

use pagekit_api::config::ServerConfig;
use pagekit_api::router::build_app_router;
use pagekit_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults and storage under `root`.
pub fn test_config(root: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        templates_dir: root.join("templates"),
        uploads_dir: root.join("uploads"),
        extraction_retention_days: 30,
        extraction_cleanup_interval_secs: 0,
        default_owner_id: 1,
    }
}

/// A fully wired application plus the temporary directory backing its
/// storage. The directory is removed when this value is dropped.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub dir: TempDir,
}

impl TestApp {
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    pub fn templates_dir(&self) -> std::path::PathBuf {
        self.state.config.templates_dir.clone()
    }
}

/// Build the full application router with all middleware layers, using the
/// given database pool and a fresh temporary storage root.
pub fn build_test_app(pool: PgPool) -> TestApp {
    let dir = tempfile::tempdir().expect("create temp dir");
    let config = test_config(dir.path());
    let state = AppState::new(pool, config.clone());
    let router = build_app_router(state.clone(), &config);
    TestApp { router, state, dir }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: Router, uri: &str, json: serde_json::Value) -> Response<Body> {
    send_json(app, Method::POST, uri, json).await
}

pub async fn put_json(app: Router, uri: &str, json: serde_json::Value) -> Response<Body> {
    send_json(app, Method::PUT, uri, json).await
}

async fn send_json(
    app: Router,
    method: Method,
    uri: &str,
    json: serde_json::Value,
) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(json.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_form(app: Router, uri: &str, body: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

// ---------------------------------------------------------------------------
// Multipart
// ---------------------------------------------------------------------------

const BOUNDARY: &str = "pagekit-test-boundary";

/// One part of a multipart form.
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        field: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        bytes: &'a [u8],
    },
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        write!(body, "--{BOUNDARY}\r\n").unwrap();
        match part {
            Part::Text(name, value) => {
                write!(
                    body,
                    "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .unwrap();
            }
            Part::File {
                field,
                file_name,
                content_type,
                bytes,
            } => {
                write!(
                    body,
                    "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
                     Content-Type: {content_type}\r\n\r\n"
                )
                .unwrap();
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    write!(body, "--{BOUNDARY}--\r\n").unwrap();
    body
}

pub async fn post_multipart(app: Router, uri: &str, parts: &[Part<'_>]) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap();
    send(app, request).await
}

/// Upload `archive` as a template named `name`; returns the response.
pub async fn upload_template(app: Router, name: &str, archive: &[u8]) -> Response<Body> {
    post_multipart(
        app,
        "/api/templates",
        &[
            Part::Text("name", name),
            Part::File {
                field: "template",
                file_name: "site.zip",
                content_type: "application/zip",
                bytes: archive,
            },
        ],
    )
    .await
}

// ---------------------------------------------------------------------------
// Bodies and fixtures
// ---------------------------------------------------------------------------

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

/// Build an in-memory ZIP. Names ending in `/` become directory entries.
pub fn zip_with(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, contents) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
    }
    writer.finish().unwrap().into_inner()
}

/// A template nested in a `site/` folder with one stylesheet and one image.
pub fn nested_site_zip() -> Vec<u8> {
    zip_with(&[
        ("site/", ""),
        (
            "site/index.html",
            r#"<html><head><link rel="stylesheet" href="css/app.css"></head><body><h1>Hello</h1><img src="img/logo.png"></body></html>"#,
        ),
        ("site/css/app.css", "body { color: red; }"),
        ("site/img/logo.png", "PNGDATA"),
    ])
}
