#![allow(dead_code)]

use axum::Router;
use std::{net::SocketAddr, path::Path, sync::Arc};
use tempfile::TempDir;

use blog_cms_gateway::{
    routes,
    services::{backend_client::BackendClient, image_store::ImageStore, temp_store::TempUploadStore},
    utils::config::AppConfig,
    AppState, StorageState,
};

pub const BOUNDARY: &str = "----BlogCmsTestBoundary";
pub const ADMIN_TOKEN: &str = "test-admin-token";
pub const ADMIN_COOKIE: &str = "admin_session=test-admin-token";

/// A relay router pointed at `backend_url`, plus the temp directory it streams uploads into.
pub fn setup_relay(backend_url: &str) -> (Router, TempDir) {
    let temp_dir = TempDir::new().unwrap();

    let config = AppConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        temp_dir: temp_dir.path().to_str().unwrap().to_string(),
        backend_url: backend_url.to_string(),
        backend_timeout_seconds: 5,
        ..AppConfig::default()
    };

    let temp_store = TempUploadStore::new(temp_dir.path()).expect("Failed to create temp store");
    let backend = BackendClient::new(&config).expect("Failed to create backend client");

    let app_state = AppState {
        config: Arc::new(config),
        backend: Arc::new(backend),
        temp_store: Arc::new(temp_store),
    };

    (routes::relay_router(app_state), temp_dir)
}

/// A storage router writing into a fresh uploads directory.
pub fn setup_storage() -> (Router, TempDir) {
    let uploads_dir = TempDir::new().unwrap();

    let config = AppConfig {
        uploads_dir: uploads_dir.path().to_str().unwrap().to_string(),
        admin_session_tokens: vec![ADMIN_TOKEN.to_string()],
        ..AppConfig::default()
    };

    let images = ImageStore::new(uploads_dir.path()).expect("Failed to create image store");

    let state = StorageState {
        config: Arc::new(config),
        images: Arc::new(images),
    };

    (routes::storage_router(state), uploads_dir)
}

/// Serve a router on an ephemeral local port and return its base URL.
pub async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A JPEG-signed payload of exactly `size` bytes.
pub fn jpeg_bytes(size: usize) -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0];
    data.resize(size.max(4), 0x42);
    data
}

/// A PNG-signed payload of exactly `size` bytes.
pub fn png_bytes(size: usize) -> Vec<u8> {
    let mut data = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    data.resize(size.max(8), 0x00);
    data
}

/// Build a multipart body with a single file field.
pub fn multipart_body(field: &str, filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// A multipart body with only a text field.
pub fn multipart_text_body(field: &str, value: &str) -> Vec<u8> {
    format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"{f}\"\r\n\r\n{v}\r\n--{b}--\r\n",
        b = BOUNDARY,
        f = field,
        v = value
    )
    .into_bytes()
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}

pub fn file_count(dir: &Path) -> usize {
    walk(dir)
}

fn walk(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|entry| {
                    let path = entry.path();
                    if path.is_dir() {
                        walk(&path)
                    } else {
                        1
                    }
                })
                .sum()
        })
        .unwrap_or(0)
}
