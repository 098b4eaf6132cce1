//! Image insertion for the rich-text editor.
//!
//! The editor widget itself is external; this module only needs the narrow
//! surface described by [`EditorSurface`]. An upload attempt walks
//! `Idle -> AwaitingFileSelection -> Uploading -> {Succeeded, Failed}` and the
//! placeholder inserted while uploading is always removed with exactly the
//! length it was inserted with.

use async_trait::async_trait;
use axum::http::header;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::models::errors::ErrorResponse;
use crate::models::upload::{UploadResponse, UploadResult};
use crate::services::backend_client::multipart_filename;
use crate::services::upload_policy::{FileCandidate, Rejection, UploadPolicy, Verdict};
use crate::utils::content::{generate_excerpt, image_url};

pub const PLACEHOLDER_TEXT: &str = "Uploading image...";
pub const UPLOAD_FAILED_ALERT: &str = "Failed to upload image. Please try again.";
pub const RELAY_UPLOAD_PATH: &str = "/api/upload/image";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    pub index: usize,
    pub length: usize,
}

/// Where a placeholder landed, in editor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceholderRange {
    pub index: usize,
    pub length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Embed {
    Image { url: String },
}

/// The part of the editor widget the upload flow relies on.
pub trait EditorSurface {
    fn selection(&self) -> Selection;

    /// Insert `marker` at `at.index` and move the cursor past it.
    fn insert_placeholder(&mut self, at: Selection, marker: &str) -> PlaceholderRange;

    /// Remove the placeholder and put `content` (if any) where it was.
    fn replace_placeholder(&mut self, range: PlaceholderRange, content: Option<Embed>);

    fn set_cursor(&mut self, index: usize);
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Char(char),
    Embed(Embed),
}

/// In-memory document using the widget's length model: one unit per character, one per embed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    nodes: Vec<Node>,
    cursor: usize,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_text(text: &str) -> Self {
        let nodes: Vec<Node> = text.chars().map(Node::Char).collect();
        let cursor = nodes.len();
        Self { nodes, cursor }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn insert_text(&mut self, index: usize, text: &str) {
        let index = index.min(self.nodes.len());
        let inserted: Vec<Node> = text.chars().map(Node::Char).collect();
        let count = inserted.len();
        self.nodes.splice(index..index, inserted);
        if self.cursor >= index {
            self.cursor += count;
        }
    }

    pub fn insert_embed(&mut self, index: usize, embed: Embed) {
        let index = index.min(self.nodes.len());
        self.nodes.insert(index, Node::Embed(embed));
        if self.cursor >= index {
            self.cursor += 1;
        }
    }

    pub fn delete(&mut self, index: usize, length: usize) {
        let start = index.min(self.nodes.len());
        let end = index.saturating_add(length).min(self.nodes.len());
        self.nodes.drain(start..end);
        if self.cursor > end {
            self.cursor -= end - start;
        } else if self.cursor > start {
            self.cursor = start;
        }
    }

    /// Text content with embeds left out.
    pub fn plain_text(&self) -> String {
        self.nodes
            .iter()
            .filter_map(|node| match node {
                Node::Char(c) => Some(*c),
                Node::Embed(_) => None,
            })
            .collect()
    }

    pub fn embeds(&self) -> Vec<&Embed> {
        self.nodes
            .iter()
            .filter_map(|node| match node {
                Node::Embed(embed) => Some(embed),
                Node::Char(_) => None,
            })
            .collect()
    }

    pub fn to_html(&self) -> String {
        self.render_html(|url| url.to_string())
    }

    /// HTML for the published page, with image paths resolved against the public origin.
    pub fn to_published_html(&self, public_origin: &str) -> String {
        self.render_html(|url| image_url(public_origin, url))
    }

    /// Plain-text teaser for blog listings; embeds contribute nothing.
    pub fn excerpt(&self, max_length: usize) -> String {
        generate_excerpt(&self.to_html(), max_length)
    }

    fn render_html(&self, resolve: impl Fn(&str) -> String) -> String {
        let mut html = String::new();
        for node in &self.nodes {
            match node {
                Node::Char('<') => html.push_str("&lt;"),
                Node::Char('>') => html.push_str("&gt;"),
                Node::Char('&') => html.push_str("&amp;"),
                Node::Char(c) => html.push(*c),
                Node::Embed(Embed::Image { url }) => {
                    html.push_str(&format!(
                        "<img src=\"{}\">",
                        resolve(url).replace('"', "&quot;")
                    ));
                }
            }
        }
        html
    }
}

impl EditorSurface for Document {
    fn selection(&self) -> Selection {
        Selection {
            index: self.cursor,
            length: 0,
        }
    }

    fn insert_placeholder(&mut self, at: Selection, marker: &str) -> PlaceholderRange {
        let index = at.index.min(self.nodes.len());
        self.insert_text(index, marker);
        let length = marker.chars().count();
        self.cursor = index + length;
        PlaceholderRange { index, length }
    }

    fn replace_placeholder(&mut self, range: PlaceholderRange, content: Option<Embed>) {
        self.delete(range.index, range.length);
        let index = range.index.min(self.nodes.len());
        match content {
            Some(embed) => {
                self.insert_embed(index, embed);
                self.cursor = index + 1;
            }
            None => self.cursor = index,
        }
    }

    fn set_cursor(&mut self, index: usize) {
        self.cursor = index.min(self.nodes.len());
    }
}

/// A picked file, as handed over by the file picker.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFile {
    pub filename: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl ImageFile {
    pub fn new(filename: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn candidate(&self) -> FileCandidate {
        FileCandidate {
            filename: self.filename.clone(),
            mime_type: self.mime_type.clone(),
            size: self.data.len() as u64,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UploadFailure {
    #[error("upload rejected with status {status}: {error}")]
    Rejected { status: u16, error: String },

    #[error("upload request failed: {0}")]
    Transport(String),

    #[error("unexpected upload response: {0}")]
    InvalidResponse(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditorError {
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    #[error("{0}")]
    Rejected(Rejection),
}

#[async_trait]
pub trait ImageUploader: Send + Sync {
    async fn upload(&self, file: &ImageFile) -> Result<UploadResult, UploadFailure>;
}

/// User-visible alerts.
pub trait Notifier: Send + Sync {
    fn alert(&self, message: &str);
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadState {
    Idle,
    AwaitingFileSelection,
    Uploading { placeholder: PlaceholderRange },
    Succeeded { url: String },
    Failed { reason: String },
}

impl UploadState {
    fn name(&self) -> &'static str {
        match self {
            UploadState::Idle => "idle",
            UploadState::AwaitingFileSelection => "awaiting file selection",
            UploadState::Uploading { .. } => "uploading",
            UploadState::Succeeded { .. } => "succeeded",
            UploadState::Failed { .. } => "failed",
        }
    }
}

/// One upload attempt through the image-insert control.
#[derive(Debug, Clone)]
pub struct ImageInsertion {
    state: UploadState,
    policy: UploadPolicy,
}

impl ImageInsertion {
    pub fn new(policy: UploadPolicy) -> Self {
        Self {
            state: UploadState::Idle,
            policy,
        }
    }

    pub fn state(&self) -> &UploadState {
        &self.state
    }

    /// The user activated the image button.
    pub fn open_picker(&mut self) -> Result<(), EditorError> {
        match self.state {
            UploadState::Idle | UploadState::Succeeded { .. } | UploadState::Failed { .. } => {
                self.state = UploadState::AwaitingFileSelection;
                Ok(())
            }
            _ => Err(self.invalid("open the file picker")),
        }
    }

    /// Validate the picked file and, if accepted, put the placeholder at the cursor.
    pub fn select_file<S: EditorSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        file: Option<&ImageFile>,
    ) -> Result<PlaceholderRange, EditorError> {
        if self.state != UploadState::AwaitingFileSelection {
            return Err(self.invalid("select a file"));
        }

        let candidate = file.map(ImageFile::candidate);
        if let Verdict::Reject(rejection) = self.policy.check(candidate.as_ref()) {
            self.state = UploadState::Idle;
            return Err(EditorError::Rejected(rejection));
        }

        let at = surface.selection();
        let placeholder = surface.insert_placeholder(at, PLACEHOLDER_TEXT);
        self.state = UploadState::Uploading { placeholder };
        Ok(placeholder)
    }

    /// Swap the placeholder for the image, or just remove it on failure.
    pub fn complete<S: EditorSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        outcome: Result<UploadResult, UploadFailure>,
    ) -> Result<&UploadState, EditorError> {
        let UploadState::Uploading { placeholder } = self.state else {
            return Err(self.invalid("complete an upload"));
        };

        self.state = match outcome {
            Ok(result) => {
                surface.replace_placeholder(
                    placeholder,
                    Some(Embed::Image {
                        url: result.url.clone(),
                    }),
                );
                UploadState::Succeeded { url: result.url }
            }
            Err(failure) => {
                surface.replace_placeholder(placeholder, None);
                UploadState::Failed {
                    reason: failure.to_string(),
                }
            }
        };

        Ok(&self.state)
    }

    fn invalid(&self, action: &'static str) -> EditorError {
        EditorError::InvalidTransition {
            action,
            state: self.state.name(),
        }
    }
}

/// Run one full attempt: validate, show the placeholder, upload, then settle the document.
///
/// The document lock is held only while the document is mutated, never
/// across the network round trip.
pub async fn insert_image<S, U, N>(
    surface: &Mutex<S>,
    uploader: &U,
    notifier: &N,
    policy: &UploadPolicy,
    file: Option<ImageFile>,
) -> Result<UploadState, EditorError>
where
    S: EditorSurface + Send,
    U: ImageUploader + ?Sized,
    N: Notifier + ?Sized,
{
    let mut attempt = ImageInsertion::new(policy.clone());
    attempt.open_picker()?;

    let selected = {
        let mut document = surface.lock().await;
        attempt.select_file(&mut *document, file.as_ref())
    };

    if let Err(EditorError::Rejected(rejection)) = &selected {
        tracing::debug!("Image rejected before upload: {}", rejection);
        notifier.alert(&rejection.to_string());
        return Ok(attempt.state().clone());
    }
    selected?;

    let Some(file) = file else {
        return Ok(attempt.state().clone());
    };

    let outcome = uploader.upload(&file).await;
    if let Err(failure) = &outcome {
        tracing::warn!("Image upload failed: {}", failure);
    }

    let state = {
        let mut document = surface.lock().await;
        attempt.complete(&mut *document, outcome)?.clone()
    };

    if matches!(state, UploadState::Failed { .. }) {
        notifier.alert(UPLOAD_FAILED_ALERT);
    }

    Ok(state)
}

/// Uploads editor images through the relay's `POST /api/upload/image`.
#[derive(Debug, Clone)]
pub struct RelayClient {
    http: reqwest::Client,
    endpoint: String,
    cookie: Option<String>,
}

impl RelayClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), RELAY_UPLOAD_PATH),
            cookie: None,
        }
    }

    /// Session cookie sent along with every upload.
    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }
}

#[async_trait]
impl ImageUploader for RelayClient {
    async fn upload(&self, file: &ImageFile) -> Result<UploadResult, UploadFailure> {
        let part = reqwest::multipart::Part::bytes(file.data.clone())
            .file_name(multipart_filename(&file.filename))
            .mime_str(&file.mime_type)
            .map_err(|e| UploadFailure::Transport(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .percent_encode_noop()
            .part("image", part);

        let mut request = self.http.post(&self.endpoint).multipart(form);
        if let Some(cookie) = &self.cookie {
            request = request.header(header::COOKIE, cookie);
        }

        let response = request
            .send()
            .await
            .map_err(|e| UploadFailure::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| UploadFailure::Transport(e.to_string()))?;

        if !status.is_success() {
            let error = serde_json::from_slice::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or_else(|_| {
                    status
                        .canonical_reason()
                        .unwrap_or("Upload failed")
                        .to_string()
                });
            return Err(UploadFailure::Rejected {
                status: status.as_u16(),
                error,
            });
        }

        match serde_json::from_slice::<UploadResponse>(&body) {
            Ok(response) if response.success => Ok(response.result),
            Ok(_) => Err(UploadFailure::InvalidResponse(
                "relay reported success=false".to_string(),
            )),
            Err(e) => Err(UploadFailure::InvalidResponse(e.to_string())),
        }
    }
}
