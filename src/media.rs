use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::{
    constants::{IMAGE_EXTENSIONS, RECIPE_IMAGE_DIR},
    error::ApiError,
};

/// An image received as `data:image/<ext>;base64,<payload>`.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub extension: String,
    pub bytes: Vec<u8>,
}

pub fn decode_data_uri(value: &str) -> Result<DecodedImage, String> {
    let invalid = || "Upload a valid image.".to_owned();

    let rest = value.trim().strip_prefix("data:").ok_or_else(invalid)?;
    let (mime, payload) = rest.split_once(";base64,").ok_or_else(invalid)?;
    let extension = mime
        .strip_prefix("image/")
        .map(str::to_lowercase)
        .ok_or_else(invalid)?;

    if !IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        return Err(format!("Unsupported image type '{extension}'."));
    }

    let bytes = STANDARD.decode(payload.trim()).map_err(|_| invalid())?;
    if bytes.is_empty() {
        return Err("The submitted file is empty.".to_owned());
    }

    Ok(DecodedImage { extension, bytes })
}

/// Writes the image under the media root and returns its path relative to it.
pub async fn save_image(image: &DecodedImage, media_root: &Path) -> Result<String, ApiError> {
    let relative = format!(
        "{RECIPE_IMAGE_DIR}/{}.{}",
        uuid::Uuid::new_v4(),
        image.extension
    );
    let target: PathBuf = media_root.join(&relative);

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(ApiError::internal)?;
    }
    tokio::fs::write(&target, &image.bytes)
        .await
        .map_err(ApiError::internal)?;

    log::debug!("Stored image {}", target.display());
    Ok(relative)
}

/// Removes a stored image; a missing file is only logged.
pub async fn remove_image(relative: &str, media_root: &Path) {
    if relative.is_empty() || relative.contains("..") {
        return;
    }
    if let Err(e) = tokio::fs::remove_file(media_root.join(relative)).await {
        log::warn!("Failed to remove image {relative}: {e}");
    }
}

pub fn image_url(media_url: &str, relative: &str) -> String {
    if relative.is_empty() {
        return String::new();
    }
    format!("{}/{}", media_url.trim_end_matches('/'), relative)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_png_data_uri() {
        let image = decode_data_uri("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(image.extension, "png");
        assert_eq!(image.bytes, b"hello");
    }

    #[test]
    fn rejects_non_image_payloads() {
        assert!(decode_data_uri("aGVsbG8=").is_err());
        assert!(decode_data_uri("data:text/plain;base64,aGVsbG8=").is_err());
        assert!(decode_data_uri("data:image/svg+xml;base64,aGVsbG8=").is_err());
        assert!(decode_data_uri("data:image/png;base64,!!!").is_err());
        assert!(decode_data_uri("data:image/png;base64,").is_err());
    }

    #[test]
    fn builds_urls() {
        assert_eq!(
            image_url("/media/", "recipes/images/a.png"),
            "/media/recipes/images/a.png"
        );
        assert_eq!(
            image_url("https://cdn.example.com/media", "recipes/images/a.png"),
            "https://cdn.example.com/media/recipes/images/a.png"
        );
        assert_eq!(image_url("/media/", ""), "");
    }

    #[tokio::test]
    async fn saves_under_recipe_dir() {
        let root = std::env::temp_dir().join(format!("foodgram-media-{}", uuid::Uuid::new_v4()));
        let image = decode_data_uri("data:image/jpeg;base64,aGVsbG8=").unwrap();

        let relative = save_image(&image, &root).await.unwrap();
        assert!(relative.starts_with("recipes/images/"));
        assert!(relative.ends_with(".jpeg"));
        assert_eq!(tokio::fs::read(root.join(&relative)).await.unwrap(), b"hello");

        remove_image(&relative, &root).await;
        assert!(!root.join(&relative).exists());
        let _ = tokio::fs::remove_dir_all(&root).await;
    }
}
