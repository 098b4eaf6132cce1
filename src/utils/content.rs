//! Content helpers shared by the editor and the publishing side.
//!
//! `image_url` and `generate_excerpt` back [`Document`](crate::services::editor::Document);
//! `generate_slug` is library API for callers building blog payloads.

use std::sync::OnceLock;

use regex::Regex;

/// Resolve a stored image path against the public origin.
///
/// Absolute URLs pass through; anything else ends up under `{base}/uploads/`.
pub fn image_url(base_url: &str, image_path: &str) -> String {
    if image_path.is_empty() {
        return String::new();
    }
    if image_path.starts_with("http://") || image_path.starts_with("https://") {
        return image_path.to_string();
    }

    let base = base_url.trim_end_matches('/');
    let clean = image_path.trim_start_matches('/');

    if clean.starts_with("uploads/") {
        format!("{}/{}", base, clean)
    } else {
        format!("{}/uploads/{}", base, clean)
    }
}

fn patterns() -> &'static (Regex, Regex, Regex, Regex) {
    static PATTERNS: OnceLock<(Regex, Regex, Regex, Regex)> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        (
            Regex::new(r"[^a-z0-9 -]").expect("invalid slug characters pattern"),
            Regex::new(r"\s+").expect("whitespace pattern"),
            Regex::new(r"-+").expect("dash runs pattern"),
            Regex::new(r"<[^>]*>").expect("html tags pattern"),
        )
    })
}

/// URL slug for a blog title.
pub fn generate_slug(text: &str) -> String {
    let (invalid, whitespace, dashes, _) = patterns();
    let lowered = text.to_lowercase();
    let stripped = invalid.replace_all(&lowered, "");
    let dashed = whitespace.replace_all(&stripped, "-");
    dashes.replace_all(&dashed, "-").into_owned()
}

/// Plain-text teaser of at most `max_length` characters, with `...` when cut.
pub fn generate_excerpt(html: &str, max_length: usize) -> String {
    let (_, _, _, tags) = patterns();
    let text = tags.replace_all(html, "");

    if text.chars().count() > max_length {
        let cut: String = text.chars().take(max_length).collect();
        format!("{}...", cut)
    } else {
        text.into_owned()
    }
}
