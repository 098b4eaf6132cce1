use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, Method},
    response::Json,
};
use futures_util::TryStreamExt;
use multer::Multipart;

use crate::models::errors::AppError;
use crate::models::upload::UploadResponse;
use crate::services::upload_policy::{sniff_image_type, Rejection, UploadPolicy};
use crate::utils::config::AppConfig;
use crate::StorageState;

/// `POST /api/upload/editor-image`: validate and persist an editor image.
///
/// Authorization is checked before the body is read. Type validation uses the
/// file's magic bytes, not the declared content type.
pub async fn store_editor_image(
    State(state): State<StorageState>,
    request: Request<Body>,
) -> Result<Json<UploadResponse>, AppError> {
    authorize(&state.config, request.headers())?;

    if request.method() != Method::POST {
        return Err(AppError::MethodNotAllowed);
    }

    let boundary = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|ct| ct.to_str().ok())
        .and_then(|ct| multer::parse_boundary(ct).ok())
        .ok_or_else(|| AppError::validation_failed("No image file uploaded or upload error occurred"))?;

    let stream = request
        .into_body()
        .into_data_stream()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err));

    let mut multipart = Multipart::new(stream, boundary);
    let policy = UploadPolicy::with_max_file_size(state.config.max_file_size as u64);
    let mut image: Option<(Option<String>, Vec<u8>)> = None;

    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some("image") || image.is_some() {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let mut data = Vec::new();
        while let Some(chunk) = field.chunk().await? {
            policy
                .check_size((data.len() + chunk.len()) as u64)
                .map_err(|rejection| AppError::validation_failed(rejection.to_string()))?;
            data.extend_from_slice(&chunk);
        }

        image = Some((filename, data));
    }

    let (filename, data) = image.ok_or_else(|| {
        AppError::validation_failed("No image file uploaded or upload error occurred")
    })?;

    let mimetype = sniff_image_type(&data)
        .filter(|detected| policy.is_allowed_type(detected))
        .ok_or_else(|| {
            tracing::warn!(
                "Rejected editor image {:?}: content is not a supported image",
                filename
            );
            AppError::validation_failed(
                Rejection::UnsupportedType {
                    mime_type: "unknown".to_string(),
                }
                .to_string(),
            )
        })?;

    let result = state
        .images
        .store_editor_image(&data, filename.as_deref(), mimetype)
        .await?;

    Ok(Json(UploadResponse::new(result)))
}

/// Require an admin session cookie: absent is 401, unknown is 403.
fn authorize(config: &AppConfig, headers: &HeaderMap) -> Result<(), AppError> {
    let Some(token) = find_cookie(headers, &config.admin_session_cookie) else {
        return Err(AppError::unauthorized("Authentication required"));
    };

    if config.admin_session_tokens.iter().any(|allowed| allowed == &token) {
        Ok(())
    } else {
        tracing::warn!("Rejected editor upload with unknown admin session");
        Err(AppError::forbidden("Admin access required"))
    }
}

fn find_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn config_with_tokens(tokens: &[&str]) -> AppConfig {
        AppConfig {
            admin_session_tokens: tokens.iter().map(|t| t.to_string()).collect(),
            ..AppConfig::default()
        }
    }

    fn headers_with_cookie(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn test_find_cookie() {
        let headers = headers_with_cookie("theme=dark; admin_session=tok-1 ; other=x");
        assert_eq!(find_cookie(&headers, "admin_session").as_deref(), Some("tok-1"));
        assert_eq!(find_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_authorize() {
        let config = config_with_tokens(&["tok-1"]);

        assert!(authorize(&config, &headers_with_cookie("admin_session=tok-1")).is_ok());
        assert!(matches!(
            authorize(&config, &HeaderMap::new()),
            Err(AppError::Unauthorized { .. })
        ));
        assert!(matches!(
            authorize(&config, &headers_with_cookie("admin_session=stolen")),
            Err(AppError::Forbidden { .. })
        ));
    }

    #[test]
    fn test_no_tokens_configured_forbids_everyone() {
        let config = config_with_tokens(&[]);
        assert!(matches!(
            authorize(&config, &headers_with_cookie("admin_session=anything")),
            Err(AppError::Forbidden { .. })
        ));
    }
}
