use axum::extract::{Path, State};

use crate::models::errors::AppError;
use crate::services::backend_client::BackendResponse;
use crate::AppState;

/// `GET /uploads/*path`, answered from the backend origin so the editor and
/// the published page load the same file.
pub async fn serve_upload(
    State(app_state): State<AppState>,
    Path(path): Path<String>,
) -> Result<BackendResponse, AppError> {
    if path.split('/').any(|segment| segment == "..") {
        return Err(AppError::validation_failed("Invalid upload path"));
    }

    let encoded: Vec<String> = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();

    app_state.backend.fetch_asset(&encoded.join("/")).await
}
