use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, Method},
};

use crate::handlers::forward::{cookie_header, require_method, required_param};
use crate::models::errors::AppError;
use crate::services::backend_client::{BackendResponse, ForwardRequest};
use crate::AppState;

/// Get a single blog by ID
pub async fn get_by_id(
    State(app_state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    Path(params): Path<HashMap<String, String>>,
) -> Result<BackendResponse, AppError> {
    require_method(&method, Method::GET)?;
    let id = required_param(&params, "id", "ID parameter is required")?;

    fetch(&app_state, format!("/api/blogs/{}", id), &headers).await
}

/// Get a single blog by slug
pub async fn get_by_slug(
    State(app_state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    Path(params): Path<HashMap<String, String>>,
) -> Result<BackendResponse, AppError> {
    require_method(&method, Method::GET)?;
    let slug = required_param(&params, "slug", "Slug parameter is required")?;

    fetch(&app_state, format!("/api/blogs/slug/{}", slug), &headers).await
}

/// `/api/blogs/` with the id left out.
pub async fn missing_id(method: Method) -> Result<BackendResponse, AppError> {
    require_method(&method, Method::GET)?;
    Err(AppError::validation_failed("ID parameter is required"))
}

/// `/api/blogs/slug/` with the slug left out.
pub async fn missing_slug(method: Method) -> Result<BackendResponse, AppError> {
    require_method(&method, Method::GET)?;
    Err(AppError::validation_failed("Slug parameter is required"))
}

async fn fetch(
    app_state: &AppState,
    path: String,
    headers: &HeaderMap,
) -> Result<BackendResponse, AppError> {
    let request = ForwardRequest::get(path).with_cookie(cookie_header(headers));
    let response = app_state.backend.forward(request).await?;

    tracing::debug!("Blog lookup answered with {}", response.status);
    Ok(response)
}
