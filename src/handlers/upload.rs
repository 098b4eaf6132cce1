use crate::handlers::forward::cookie_header;
use crate::models::errors::AppError;
use crate::models::upload::{UploadResponse, UploadResult};
use crate::services::backend_client::map_upload_response;
use crate::services::temp_store::TempUpload;
use crate::services::upload_policy::{Rejection, UploadPolicy};
use crate::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, Method},
    response::Json,
};
use futures_util::TryStreamExt;
use multer::Multipart;

/// Multipart field names accepted for the image.
const IMAGE_FIELDS: &[&str] = &["image", "file"];

/// Relay an editor image to the storage backend.
///
/// The file is streamed to a temp file (never held whole in memory),
/// validated, forwarded with the caller's cookies, and the temp file is
/// released when the request finishes, whatever the outcome.
pub async fn relay_image(
    State(app_state): State<AppState>,
    request: Request<Body>,
) -> Result<Json<UploadResponse>, AppError> {
    if request.method() != Method::POST {
        return Err(AppError::MethodNotAllowed);
    }

    let cookie = cookie_header(request.headers());
    let boundary = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|ct| ct.to_str().ok())
        .and_then(|ct| multer::parse_boundary(ct).ok())
        .ok_or_else(|| AppError::validation_failed("Missing or invalid multipart boundary"))?;

    // Convert the request body to a stream
    let stream = request
        .into_body()
        .into_data_stream()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err));

    let mut multipart = Multipart::new(stream, boundary);
    let policy = UploadPolicy::with_max_file_size(app_state.config.max_file_size as u64);
    let mut upload: Option<TempUpload> = None;

    while let Some(field) = multipart.next_field().await? {
        let is_image = field
            .name()
            .map(|name| IMAGE_FIELDS.contains(&name))
            .unwrap_or(false);

        if !is_image || upload.is_some() {
            tracing::debug!("Skipping multipart field {:?}", field.name());
            continue;
        }

        upload = Some(app_state.temp_store.stream_field(field, &policy).await?);
    }

    let upload = upload.ok_or_else(|| AppError::validation_failed(Rejection::NoFile.to_string()))?;

    let response = app_state
        .backend
        .upload_editor_image(&upload, cookie.as_ref())
        .await?;
    let stored = map_upload_response(response)?;

    tracing::info!(
        "Relayed editor image {} -> {} ({} bytes, {})",
        upload.filename,
        stored.url,
        upload.size,
        upload.content_type
    );

    Ok(Json(UploadResponse::new(UploadResult {
        url: stored.url,
        filename: stored.filename,
        size: upload.size,
        mimetype: upload.content_type.clone(),
    })))
}
