use std::fmt;

pub const DEFAULT_MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;

/// Image types accepted anywhere along the upload path.
pub const ALLOWED_IMAGE_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
];

/// A file the user picked, described by what the browser declares about it.
#[derive(Debug, Clone, PartialEq)]
pub struct FileCandidate {
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accept,
    Reject(Rejection),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    NoFile,
    TooLarge { size: u64, limit: u64 },
    UnsupportedType { mime_type: String },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NoFile => write!(f, "No image file uploaded"),
            Rejection::TooLarge { limit, .. } => {
                write!(f, "Image size exceeds {} limit", format_limit(*limit))
            }
            Rejection::UnsupportedType { .. } => write!(
                f,
                "Invalid file type. Only JPG, PNG, GIF, and WebP are allowed."
            ),
        }
    }
}

fn format_limit(bytes: u64) -> String {
    const MIB: u64 = 1024 * 1024;
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{}MB", bytes / MIB)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Size and type rules shared by the editor, the relay and the storage service.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub max_file_size: u64,
    pub allowed_mime_types: &'static [&'static str],
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_mime_types: ALLOWED_IMAGE_TYPES,
        }
    }
}

impl UploadPolicy {
    pub fn with_max_file_size(max_file_size: u64) -> Self {
        Self {
            max_file_size,
            ..Self::default()
        }
    }

    /// Checks a candidate in order: presence, size, then type.
    pub fn check(&self, candidate: Option<&FileCandidate>) -> Verdict {
        let Some(file) = candidate else {
            return Verdict::Reject(Rejection::NoFile);
        };

        if let Err(rejection) = self.check_size(file.size) {
            return Verdict::Reject(rejection);
        }

        if let Err(rejection) = self.check_type(&file.mime_type) {
            return Verdict::Reject(rejection);
        }

        Verdict::Accept
    }

    pub fn check_size(&self, size: u64) -> Result<(), Rejection> {
        if size > self.max_file_size {
            return Err(Rejection::TooLarge {
                size,
                limit: self.max_file_size,
            });
        }
        Ok(())
    }

    pub fn check_type(&self, mime_type: &str) -> Result<(), Rejection> {
        if self.is_allowed_type(mime_type) {
            Ok(())
        } else {
            Err(Rejection::UnsupportedType {
                mime_type: mime_type.to_string(),
            })
        }
    }

    pub fn is_allowed_type(&self, mime_type: &str) -> bool {
        let essence = mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        self.allowed_mime_types.contains(&essence.as_str())
    }

    /// File extension used when persisting an image of the given type.
    pub fn extension_for(mime_type: &str) -> Option<&'static str> {
        match mime_type.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some("jpg"),
            "image/png" => Some("png"),
            "image/gif" => Some("gif"),
            "image/webp" => Some("webp"),
            _ => None,
        }
    }
}

/// Detect the image type from magic bytes, independent of anything the client declared.
pub fn sniff_image_type(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}
