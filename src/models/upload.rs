use serde::{Deserialize, Serialize};

/// What the storage service reports for a persisted image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadResult {
    pub url: String,
    pub filename: String,
    pub size: u64,
    pub mimetype: String,
}

/// Body of a successful `POST /api/upload/image` or `POST /api/upload/editor-image`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadResponse {
    pub success: bool,
    #[serde(flatten)]
    pub result: UploadResult,
}

impl UploadResponse {
    pub fn new(result: UploadResult) -> Self {
        Self {
            success: true,
            result,
        }
    }
}

/// The storage backend's reply, validated at the relay boundary.
///
/// Successful replies must carry `url` and `filename`; `size` and `mimetype`
/// are optional because the relay reports its own observations for those.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum BackendUploadReply {
    Stored(StoredImage),
    Failed(BackendFailure),
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StoredImage {
    pub url: String,
    pub filename: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub mimetype: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct BackendFailure {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
