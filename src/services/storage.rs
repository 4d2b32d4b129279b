use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq)]
pub struct StoredImage {
    pub path: String,
    pub url: String,
    pub mime_type: String,
}

/// Uploaded meal photos on local disk, served back under `/uploads`
pub struct ImageStore {
    upload_dir: PathBuf,
    public_base_url: String,
}

impl ImageStore {
    pub fn new(upload_dir: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub async fn save(
        &self,
        bytes: &[u8],
        content_type: Option<&str>,
        file_name: Option<&str>,
    ) -> Result<StoredImage> {
        if bytes.is_empty() {
            return Err(ApiError::BadUpload("image file is empty".to_string()).into());
        }

        let (mime_type, extension) = detect_image_type(content_type, file_name).ok_or_else(|| {
            ApiError::BadUpload("image must be JPEG, PNG, WebP or GIF".to_string())
        })?;

        tokio::fs::create_dir_all(&self.upload_dir)
            .await
            .with_context(|| format!("failed to create upload directory {}", self.upload_dir.display()))?;

        let file_name = format!("{}.{}", Uuid::new_v4(), extension);
        let path = self.upload_dir.join(&file_name);

        log::info!("💾 Writing {} bytes to: {}", bytes.len(), path.display());
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("failed to write image {}", path.display()))?;

        Ok(StoredImage {
            path: path.to_string_lossy().into_owned(),
            url: format!("{}/uploads/{}", self.public_base_url, file_name),
            mime_type: mime_type.to_string(),
        })
    }

    /// Remove a stored image; a file that is already gone is not an error
    pub async fn delete(&self, path: &str) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                log::info!("🗑️ Deleted image: {}", path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("⚠️ Image already missing: {}", path);
                Ok(())
            }
            Err(e) => Err(e).with_context(|| format!("failed to delete image {}", path)),
        }
    }
}

/// MIME type and file extension for a supported image, from the declared
/// content type or, failing that, the original file name
fn detect_image_type(content_type: Option<&str>, file_name: Option<&str>) -> Option<(&'static str, &'static str)> {
    let from_mime = |mime: &str| match mime.trim().to_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => Some(("image/jpeg", "jpg")),
        "image/png" => Some(("image/png", "png")),
        "image/webp" => Some(("image/webp", "webp")),
        "image/gif" => Some(("image/gif", "gif")),
        _ => None,
    };

    if let Some(detected) = content_type.and_then(from_mime) {
        return Some(detected);
    }

    let extension = Path::new(file_name?).extension()?.to_str()?.to_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" => Some(("image/jpeg", "jpg")),
        "png" => Some(("image/png", "png")),
        "webp" => Some(("image/webp", "webp")),
        "gif" => Some(("image/gif", "gif")),
        _ => None,
    }
}
