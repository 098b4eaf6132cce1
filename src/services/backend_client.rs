use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use tokio_util::io::ReaderStream;

use crate::models::errors::AppError;
use crate::models::upload::{BackendFailure, BackendUploadReply, StoredImage};
use crate::services::temp_store::TempUpload;
use crate::utils::config::AppConfig;

pub const EDITOR_IMAGE_PATH: &str = "/api/upload/editor-image";

/// A browser request re-addressed to the backend.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: Method,
    pub path: String,
    pub content_type: Option<String>,
    /// Raw inbound `Cookie` header; never decoded or re-encoded.
    pub cookie: Option<HeaderValue>,
    pub body: Option<Bytes>,
}

impl ForwardRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            content_type: None,
            cookie: None,
            body: None,
        }
    }

    pub fn with_cookie(mut self, cookie: Option<HeaderValue>) -> Self {
        self.cookie = cookie;
        self
    }
}

/// Whatever the backend answered, including error statuses.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub set_cookies: Vec<HeaderValue>,
    pub body: Bytes,
}

impl IntoResponse for BackendResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        if let Some(content_type) = self.content_type {
            headers.insert(header::CONTENT_TYPE, content_type);
        }
        for cookie in self.set_cookies {
            headers.append(header::SET_COOKIE, cookie);
        }

        response
    }
}

/// HTTP client for the blog backend, built once at startup and shared through `AppState`.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(config: &AppConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.backend_timeout_seconds))
            .build()
            .map_err(|e| AppError::internal_error(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.backend_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Send a request to the backend without treating error statuses as failures.
    pub async fn forward(&self, request: ForwardRequest) -> Result<BackendResponse, AppError> {
        let url = self.endpoint(&request.path);
        tracing::debug!("Forwarding {} {}", request.method, url);

        let mut builder = self.http.request(request.method, &url);
        if let Some(content_type) = request.content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        if let Some(cookie) = request.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::warn!("Backend unreachable at {}: {}", url, e);
            AppError::transport(e.to_string())
        })?;

        Self::capture(response).await
    }

    /// Stream a relayed image to the storage endpoint as multipart field `image`.
    pub async fn upload_editor_image(
        &self,
        upload: &TempUpload,
        cookie: Option<&HeaderValue>,
    ) -> Result<BackendResponse, AppError> {
        let file = tokio::fs::File::open(upload.path())
            .await
            .map_err(|e| AppError::storage_failed(format!("Failed to reopen temp file: {}", e)))?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));

        let part = reqwest::multipart::Part::stream_with_length(body, upload.size)
            .file_name(multipart_filename(&upload.filename))
            .mime_str(&upload.content_type)
            .map_err(|e| AppError::validation_failed(format!("Invalid content type: {}", e)))?;
        let form = reqwest::multipart::Form::new()
            .percent_encode_noop()
            .part("image", part);

        let url = self.endpoint(EDITOR_IMAGE_PATH);
        let mut builder = self.http.post(&url).multipart(form);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie.clone());
        }

        tracing::debug!(
            "Relaying {} ({} bytes) to {}",
            upload.filename,
            upload.size,
            url
        );

        let response = builder.send().await.map_err(|e| {
            tracing::warn!("Storage backend unreachable at {}: {}", url, e);
            AppError::transport(e.to_string())
        })?;

        Self::capture(response).await
    }

    /// Fetch a published file from the backend's `/uploads` tree.
    pub async fn fetch_asset(&self, path: &str) -> Result<BackendResponse, AppError> {
        self.forward(ForwardRequest::get(format!(
            "/uploads/{}",
            path.trim_start_matches('/')
        )))
        .await
    }

    async fn capture(response: reqwest::Response) -> Result<BackendResponse, AppError> {
        let status = response.status();
        let content_type = response.headers().get(header::CONTENT_TYPE).cloned();
        let set_cookies = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .cloned()
            .collect();
        let body = response.bytes().await?;

        Ok(BackendResponse {
            status,
            content_type,
            set_cookies,
            body,
        })
    }
}

/// Filename as a browser would write it into `Content-Disposition`: verbatim
/// apart from `"`, CR and LF, which become `%22`, `%0D` and `%0A`.
pub fn multipart_filename(filename: &str) -> String {
    filename
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Interpret the storage endpoint's reply.
///
/// 2xx with a well-formed body yields the stored image; 2xx without one is a
/// broken backend (502); anything else is passed through with the backend's
/// status and error text.
pub fn map_upload_response(response: BackendResponse) -> Result<StoredImage, AppError> {
    let reply = serde_json::from_slice::<BackendUploadReply>(&response.body).ok();

    if response.status.is_success() {
        return match reply {
            Some(BackendUploadReply::Stored(image)) => Ok(image),
            _ => Err(AppError::invalid_upstream(
                "storage reply is missing the image url",
            )),
        };
    }

    let failure = match reply {
        Some(BackendUploadReply::Failed(failure)) => failure,
        _ => BackendFailure::default(),
    };

    Err(AppError::upstream(
        response.status,
        failure
            .error
            .unwrap_or_else(|| "Failed to upload image".to_string()),
        failure.message,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string, header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(url: &str) -> BackendClient {
        let config = AppConfig {
            backend_url: url.to_string(),
            backend_timeout_seconds: 5,
            ..AppConfig::default()
        };
        BackendClient::new(&config).unwrap()
    }

    fn reply(status: StatusCode, body: serde_json::Value) -> BackendResponse {
        BackendResponse {
            status,
            content_type: Some(HeaderValue::from_static("application/json")),
            set_cookies: Vec::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    #[tokio::test]
    async fn test_forward_relays_cookie_and_set_cookie() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .and(header_eq("cookie", "PHPSESSID=abc"))
            .and(body_string(r#"{"username":"admin"}"#))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", "PHPSESSID=def; Path=/; HttpOnly")
                    .set_body_json(json!({ "success": true })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let response = client
            .forward(ForwardRequest {
                method: Method::POST,
                path: "/api/auth/login".to_string(),
                content_type: Some("application/json".to_string()),
                cookie: Some(HeaderValue::from_static("PHPSESSID=abc")),
                body: Some(Bytes::from_static(br#"{"username":"admin"}"#)),
            })
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.set_cookies.len(), 1);
        assert_eq!(
            response.set_cookies[0].to_str().unwrap(),
            "PHPSESSID=def; Path=/; HttpOnly"
        );
    }

    #[tokio::test]
    async fn test_forward_keeps_non_ascii_cookie_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/blogs/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
            .mount(&server)
            .await;

        let cookie = HeaderValue::from_bytes(b"sess=caf\xC3\xA9").unwrap();
        let client = client_for(&server.uri());
        client
            .forward(ForwardRequest::get("/api/blogs/1").with_cookie(Some(cookie)))
            .await
            .unwrap();

        let received = server.received_requests().await.unwrap();
        let forwarded = received[0].headers.get(header::COOKIE).unwrap();
        assert_eq!(forwarded.as_bytes(), b"sess=caf\xC3\xA9");
    }

    #[test]
    fn test_multipart_filename_escapes_only_header_breakers() {
        assert_eq!(multipart_filename("my photo (1).jpg"), "my photo (1).jpg");
        assert_eq!(multipart_filename("café.png"), "café.png");
        assert_eq!(multipart_filename("say \"hi\".gif"), "say %22hi%22.gif");
    }

    #[tokio::test]
    async fn test_forward_does_not_fail_on_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/blogs/99"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({ "success": false, "error": "Blog not found" })),
            )
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let response = client.forward(ForwardRequest::get("/api/blogs/99")).await.unwrap();

        assert_eq!(response.status, StatusCode::NOT_FOUND);
        let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body["error"], "Blog not found");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        let client = client_for("http://127.0.0.1:1");
        let err = client
            .forward(ForwardRequest::get("/api/blogs/1"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::TransportError { .. }));
    }

    #[test]
    fn test_map_upload_response_success() {
        let image = map_upload_response(reply(
            StatusCode::OK,
            json!({
                "success": true,
                "url": "/uploads/editor/editor_1.jpg",
                "filename": "editor_1.jpg",
                "size": 10,
                "mimetype": "image/jpeg"
            }),
        ))
        .unwrap();

        assert_eq!(image.url, "/uploads/editor/editor_1.jpg");
        assert_eq!(image.filename, "editor_1.jpg");
    }

    #[test]
    fn test_map_upload_response_passes_backend_error_through() {
        let err = map_upload_response(reply(
            StatusCode::UNAUTHORIZED,
            json!({ "error": "Authentication required" }),
        ))
        .unwrap_err();

        match err {
            AppError::UpstreamError { status, error, .. } => {
                assert_eq!(status, StatusCode::UNAUTHORIZED);
                assert_eq!(error, "Authentication required");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_map_upload_response_generic_message_for_opaque_failure() {
        let response = BackendResponse {
            status: StatusCode::BAD_GATEWAY,
            content_type: None,
            set_cookies: Vec::new(),
            body: Bytes::from_static(b"<html>bad gateway</html>"),
        };

        let err = map_upload_response(response).unwrap_err();
        assert!(matches!(err, AppError::UpstreamError { ref error, .. } if error == "Failed to upload image"));
    }

    #[test]
    fn test_map_upload_response_rejects_malformed_success() {
        let err = map_upload_response(reply(StatusCode::OK, json!({ "success": true }))).unwrap_err();
        assert!(matches!(err, AppError::InvalidUpstreamResponse { .. }));
    }
}
