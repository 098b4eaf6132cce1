use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::Utc;
use tokio::fs as async_fs;
use uuid::Uuid;

use crate::models::errors::AppError;
use crate::models::upload::UploadResult;
use crate::services::upload_policy::UploadPolicy;

const EDITOR_SUBDIR: &str = "editor";

/// Public image storage behind `/uploads`, used by the storage role.
#[derive(Debug, Clone)]
pub struct ImageStore {
    uploads_dir: PathBuf,
}

impl ImageStore {
    pub fn new(uploads_dir: impl Into<PathBuf>) -> Result<Self, AppError> {
        let uploads_dir = uploads_dir.into();
        let editor_dir = uploads_dir.join(EDITOR_SUBDIR);

        if !editor_dir.exists() {
            fs::create_dir_all(&editor_dir)
                .map_err(|e| AppError::storage_failed(format!("Failed to create upload directory: {}", e)))?;
        }

        Ok(Self { uploads_dir })
    }

    /// Root served under `/uploads`.
    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    /// Persist an already validated editor image and describe where it is served from.
    pub async fn store_editor_image(
        &self,
        data: &[u8],
        original_filename: Option<&str>,
        mimetype: &str,
    ) -> Result<UploadResult, AppError> {
        let extension = original_filename
            .and_then(extension_of)
            .filter(|extension| extension_matches(extension, mimetype))
            .or_else(|| UploadPolicy::extension_for(mimetype).map(str::to_string))
            .unwrap_or_else(|| "bin".to_string());
        let filename = unique_filename(&extension);
        let file_path = self.uploads_dir.join(EDITOR_SUBDIR).join(&filename);

        async_fs::write(&file_path, data).await.map_err(|e| {
            tracing::error!("Failed to write {}: {}", file_path.display(), e);
            AppError::storage_failed("Failed to save uploaded image")
        })?;

        tracing::info!("Stored editor image {} ({} bytes)", filename, data.len());

        Ok(UploadResult {
            url: format!("/uploads/{}/{}", EDITOR_SUBDIR, filename),
            filename,
            size: data.len() as u64,
            mimetype: mimetype.to_string(),
        })
    }
}

/// `editor_<random>_<unix seconds>.<ext>`
fn unique_filename(extension: &str) -> String {
    format!(
        "editor_{}_{}.{}",
        Uuid::new_v4().simple(),
        Utc::now().timestamp(),
        extension
    )
}

/// Final path component reduced to characters that are safe on disk.
fn sanitize_filename(filename: &str) -> String {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    name.chars()
        .filter(|c| c.is_alphanumeric() || *c == '.' || *c == '-' || *c == '_')
        .take(255)
        .collect()
}

fn extension_of(filename: &str) -> Option<String> {
    let sanitized = sanitize_filename(filename);
    let (stem, extension) = sanitized.rsplit_once('.')?;
    if stem.is_empty() || extension.is_empty() || extension.len() > 8 {
        return None;
    }
    Some(extension.to_ascii_lowercase())
}

/// Original extensions survive only when they agree with the detected type.
fn extension_matches(extension: &str, mimetype: &str) -> bool {
    let detected = UploadPolicy::extension_for(mimetype);
    detected.is_some() && UploadPolicy::extension_for(&format!("image/{}", extension)) == detected
}
