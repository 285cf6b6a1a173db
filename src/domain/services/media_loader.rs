#[cfg(test)]
#[path = "media_loader_test.rs"]
mod tests;

use std::path::Path;

use tokio::fs;

use crate::domain::models::BinaryContent;

/// Infers a MIME type from a file extension, defaulting to JPEG.
pub fn media_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|ext| return ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => return "image/jpeg",
        "png" => return "image/png",
        "gif" => return "image/gif",
        "bmp" => return "image/bmp",
        "webp" => return "image/webp",
        "svg" => return "image/svg+xml",
        _ => return "image/jpeg",
    }
}

/// Loads a local image. Missing or unreadable files are logged and produce
/// `None` so callers can carry on without the image.
pub async fn load_local_image(image_path: &str) -> Option<BinaryContent> {
    let path = Path::new(image_path);
    if !path.exists() {
        tracing::warn!(path = image_path, "Image file not found");
        return None;
    }

    if !path.is_file() {
        tracing::warn!(path = image_path, "Image path is not a file");
        return None;
    }

    match fs::read(path).await {
        Ok(data) => return Some(BinaryContent::new(data, media_type(path))),
        Err(err) => {
            tracing::warn!(path = image_path, error = ?err, "Failed to read image");
            return None;
        }
    }
}
