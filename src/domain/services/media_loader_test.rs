use std::io::Write;
use std::path::Path;

use anyhow::Result;

use super::load_local_image;
use super::media_type;

#[test]
fn it_maps_extensions_to_media_types() {
    assert_eq!(media_type(Path::new("a.jpg")), "image/jpeg");
    assert_eq!(media_type(Path::new("a.JPEG")), "image/jpeg");
    assert_eq!(media_type(Path::new("a.png")), "image/png");
    assert_eq!(media_type(Path::new("a.gif")), "image/gif");
    assert_eq!(media_type(Path::new("a.bmp")), "image/bmp");
    assert_eq!(media_type(Path::new("a.webp")), "image/webp");
    assert_eq!(media_type(Path::new("a.svg")), "image/svg+xml");
    assert_eq!(media_type(Path::new("a.tiff")), "image/jpeg");
    assert_eq!(media_type(Path::new("noext")), "image/jpeg");
}

#[tokio::test]
async fn it_loads_local_image() -> Result<()> {
    let mut file = tempfile::Builder::new().suffix(".png").tempfile()?;
    file.write_all(&[0x89, 0x50, 0x4e, 0x47])?;

    let content = load_local_image(&file.path().to_string_lossy()).await;
    let content = content.unwrap();
    assert_eq!(content.media_type, "image/png");
    assert_eq!(content.data, vec![0x89, 0x50, 0x4e, 0x47]);

    return Ok(());
}

#[tokio::test]
async fn it_returns_none_for_missing_file() {
    assert!(load_local_image("./does/not/exist.png").await.is_none());
}

#[tokio::test]
async fn it_returns_none_for_directory() -> Result<()> {
    let dir = tempfile::tempdir()?;
    assert!(load_local_image(&dir.path().to_string_lossy()).await.is_none());

    return Ok(());
}
