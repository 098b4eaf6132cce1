use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method},
};

use crate::handlers::forward::{content_type, cookie_header};
use crate::models::errors::AppError;
use crate::services::backend_client::{BackendResponse, ForwardRequest};
use crate::AppState;

pub const LOGIN_PATH: &str = "/api/auth/login";

/// Proxy the login call so the backend's session cookie lands on the browser.
pub async fn login(
    State(app_state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<BackendResponse, AppError> {
    let request = ForwardRequest {
        method,
        path: LOGIN_PATH.to_string(),
        content_type: Some(
            content_type(&headers).unwrap_or_else(|| mime::APPLICATION_JSON.to_string()),
        ),
        cookie: cookie_header(&headers),
        body: (!body.is_empty()).then_some(body),
    };

    let response = app_state.backend.forward(request).await?;

    tracing::info!(
        "Login proxied: backend status {}, {} cookie(s) relayed",
        response.status,
        response.set_cookies.len()
    );

    Ok(response)
}
