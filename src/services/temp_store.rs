use std::{
    fs,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use tempfile::TempPath;
use tokio::{fs as async_fs, io::AsyncWriteExt};

use crate::models::errors::AppError;
use crate::services::upload_policy::UploadPolicy;

/// Every temp file this store creates starts with this; the sweep touches nothing else.
const TEMP_PREFIX: &str = "relay-";

/// An uploaded file parked on disk while it is relayed to the backend.
///
/// The file is removed when this value is dropped, so every exit path of a
/// request handler releases it.
#[derive(Debug)]
pub struct TempUpload {
    pub filename: String,
    pub content_type: String,
    pub size: u64,
    path: TempPath,
}

impl TempUpload {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug, Clone)]
pub struct TempUploadStore {
    temp_dir: PathBuf,
    max_file_age: Duration,
}

impl TempUploadStore {
    pub fn new(temp_dir: impl Into<PathBuf>) -> Result<Self, AppError> {
        let temp_dir = temp_dir.into();

        // Create the temporary directory if it doesn't exist
        if !temp_dir.exists() {
            fs::create_dir_all(&temp_dir)
                .map_err(|e| AppError::storage_failed(format!("Failed to create temp directory: {}", e)))?;
        }

        Ok(Self {
            temp_dir,
            max_file_age: Duration::from_secs(3600), // 1 hour default
        })
    }

    /// Stream one multipart file field to a temp file, enforcing the policy as bytes arrive.
    ///
    /// The declared type is checked before anything touches the disk; the size
    /// cap is checked per chunk so oversized bodies are never fully buffered.
    pub async fn stream_field(
        &self,
        mut field: multer::Field<'_>,
        policy: &UploadPolicy,
    ) -> Result<TempUpload, AppError> {
        let filename = field
            .file_name()
            .map(client_filename)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "upload".to_string());
        let content_type = field
            .content_type()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_default();

        policy
            .check_type(&content_type)
            .map_err(|rejection| AppError::validation_failed(rejection.to_string()))?;

        let temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&self.temp_dir)
            .map_err(|e| AppError::storage_failed(format!("Failed to create temp file: {}", e)))?;
        let (std_file, path) = temp.into_parts();
        let mut file = async_fs::File::from_std(std_file);

        let mut size: u64 = 0;
        while let Some(chunk) = field.chunk().await? {
            size += chunk.len() as u64;
            policy
                .check_size(size)
                .map_err(|rejection| AppError::validation_failed(rejection.to_string()))?;

            file.write_all(&chunk)
                .await
                .map_err(|e| AppError::storage_failed(format!("Failed to write temp file: {}", e)))?;
        }

        file.flush()
            .await
            .map_err(|e| AppError::storage_failed(format!("Failed to write temp file: {}", e)))?;

        tracing::debug!(
            "Stored temporary upload {} ({} bytes, {})",
            path.display(),
            size,
            content_type
        );

        Ok(TempUpload {
            filename,
            content_type,
            size,
            path,
        })
    }

    /// Remove this store's temp files older than the max age, left behind by a crash.
    ///
    /// Only `relay-` files are considered, so a shared directory such as `/tmp`
    /// is safe to point at.
    pub async fn sweep_stale(&self) -> Result<usize, AppError> {
        let cutoff = SystemTime::now() - self.max_file_age;
        let mut entries = async_fs::read_dir(&self.temp_dir)
            .await
            .map_err(|e| AppError::storage_failed(format!("Failed to read temp directory: {}", e)))?;

        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AppError::storage_failed(format!("Failed to read temp directory: {}", e)))?
        {
            let owned = entry
                .file_name()
                .to_str()
                .map(|name| name.starts_with(TEMP_PREFIX))
                .unwrap_or(false);
            if !owned {
                continue;
            }

            let stale = match entry.metadata().await {
                Ok(metadata) => {
                    metadata.is_file()
                        && metadata.modified().map(|at| at < cutoff).unwrap_or(false)
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", entry.path().display(), e);
                    false
                }
            };

            if stale {
                match async_fs::remove_file(entry.path()).await {
                    Ok(()) => removed += 1,
                    Err(e) => tracing::warn!("Failed to remove {}: {}", entry.path().display(), e),
                }
            }
        }

        if removed > 0 {
            tracing::info!("Swept {} stale relay upload(s)", removed);
        }
        Ok(removed)
    }

    /// Set the maximum age for temporary files
    pub fn set_max_file_age(&mut self, max_age: Duration) {
        self.max_file_age = max_age;
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }
}

/// The client's filename as forwarded to storage: directory parts (either
/// separator) and control characters are dropped, everything else is kept.
pub fn client_filename(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or("");
    name.chars().filter(|c| !c.is_control()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use futures_util::stream;
    use tempfile::TempDir;

    const BOUNDARY: &str = "X-TEST-BOUNDARY";

    fn multipart_body(content_type: &str, data: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            b"Content-Disposition: form-data; name=\"image\"; filename=\"../cat photo (1).png\"\r\n",
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    async fn stream_one(
        store: &TempUploadStore,
        policy: &UploadPolicy,
        content_type: &str,
        data: &[u8],
    ) -> Result<TempUpload, AppError> {
        let body = Bytes::from(multipart_body(content_type, data));
        let stream = stream::once(async move { Ok::<_, std::io::Error>(body) });
        let mut multipart = multer::Multipart::new(stream, BOUNDARY);
        let field = multipart.next_field().await.unwrap().unwrap();
        store.stream_field(field, policy).await
    }

    fn dir_entries(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn test_stream_field_writes_and_drop_removes() {
        let dir = TempDir::new().unwrap();
        let store = TempUploadStore::new(dir.path()).unwrap();
        let policy = UploadPolicy::default();

        let upload = stream_one(&store, &policy, "image/png", b"\x89PNG\r\n\x1a\nrest")
            .await
            .unwrap();

        assert_eq!(upload.filename, "cat photo (1).png");
        assert_eq!(upload.content_type, "image/png");
        assert_eq!(upload.size, 12);
        assert_eq!(fs::read(upload.path()).unwrap(), b"\x89PNG\r\n\x1a\nrest");

        let path = upload.path().to_path_buf();
        drop(upload);
        assert!(!path.exists());
        assert_eq!(dir_entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_oversized_field_leaves_nothing_behind() {
        let dir = TempDir::new().unwrap();
        let store = TempUploadStore::new(dir.path()).unwrap();
        let policy = UploadPolicy::with_max_file_size(8);

        let err = stream_one(&store, &policy, "image/jpeg", &[0xFF; 32])
            .await
            .unwrap_err();

        assert!(err.to_string().contains("exceeds"));
        assert_eq!(dir_entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_disallowed_type_is_rejected_before_writing() {
        let dir = TempDir::new().unwrap();
        let store = TempUploadStore::new(dir.path()).unwrap();

        let err = stream_one(&store, &UploadPolicy::default(), "application/pdf", b"%PDF-1.7")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ValidationError { .. }));
        assert_eq!(dir_entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_sweep_stale_removes_old_files_only() {
        let dir = TempDir::new().unwrap();
        let mut store = TempUploadStore::new(dir.path()).unwrap();
        fs::write(dir.path().join("relay-leftover"), b"x").unwrap();

        assert_eq!(store.sweep_stale().await.unwrap(), 0);

        store.set_max_file_age(Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.sweep_stale().await.unwrap(), 1);
        assert_eq!(dir_entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_sweep_stale_leaves_foreign_files() {
        let dir = TempDir::new().unwrap();
        let mut store = TempUploadStore::new(dir.path()).unwrap();
        store.set_max_file_age(Duration::ZERO);
        fs::write(dir.path().join("session.lock"), b"x").unwrap();
        fs::write(dir.path().join("relay-orphan"), b"x").unwrap();
        fs::create_dir(dir.path().join("relay-dir")).unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.sweep_stale().await.unwrap(), 1);
        assert!(dir.path().join("session.lock").exists());
        assert!(dir.path().join("relay-dir").exists());
        assert!(!dir.path().join("relay-orphan").exists());
    }

    #[test]
    fn test_client_filename() {
        assert_eq!(client_filename("my photo (1).jpg"), "my photo (1).jpg");
        assert_eq!(client_filename("../../etc/passwd"), "passwd");
        assert_eq!(client_filename("C:\\Users\\me\\café.png"), "café.png");
        assert_eq!(client_filename("bad\r\nname.gif"), "badname.gif");
        assert_eq!(client_filename(""), "");
    }
}
