#[cfg(test)]
#[path = "image_refs_test.rs"]
mod tests;

use once_cell::sync::Lazy;
use regex::Regex;

static IMAGE_URL: Lazy<Regex> =
    Lazy::new(|| return Regex::new(r"(?i)https?://\S+\.(jpg|jpeg|png|gif|bmp|webp)").unwrap());

static LOCAL_IMAGE: Lazy<Regex> = Lazy::new(|| {
    return Regex::new(r"(?i)(?:file://)?(\S+\.(jpg|jpeg|png|gif|bmp|webp))").unwrap();
});

/// An image referenced inside a line of user input.
#[derive(Debug, PartialEq, Eq)]
pub enum ImageReference {
    Url { text: String, url: String },
    LocalPath { text: String, path: String },
}

impl ImageReference {
    /// The user text with the reference removed.
    pub fn text(&self) -> &str {
        match self {
            ImageReference::Url { text, .. } => return text,
            ImageReference::LocalPath { text, .. } => return text,
        }
    }
}

pub fn extract_image_url(text: &str) -> Option<ImageReference> {
    let found = IMAGE_URL.find(text)?;
    let url = found.as_str().to_string();

    return Some(ImageReference::Url {
        text: text.replace(&url, "").trim().to_string(),
        url,
    });
}

pub fn extract_local_image_path(text: &str) -> Option<ImageReference> {
    let captures = LOCAL_IMAGE.captures(text)?;
    let whole = captures.get(0)?.as_str();
    let path = captures.get(1)?.as_str().replace("file://", "");

    return Some(ImageReference::LocalPath {
        text: text.replace(whole, "").trim().to_string(),
        path,
    });
}

/// Finds the first image reference, preferring remote URLs over local paths.
pub fn find_image_reference(text: &str) -> Option<ImageReference> {
    if let Some(reference) = extract_image_url(text) {
        return Some(reference);
    }

    return extract_local_image_path(text);
}
