/// Task image uploads
///
/// Task create/update requests are `multipart/form-data`. Text fields are
/// collected as strings and the `image` part is buffered chunk by chunk so an
/// oversized file is rejected as soon as it crosses the cap.
///
/// Accepted types are JPEG, PNG and GIF. Files are written to the configured
/// upload directory as `{stem}_{uuid}{ext}` and exposed under `/uploads/`.

use crate::error::{ApiError, ApiResult};
use axum::extract::Multipart;
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

/// Multipart field carrying the image
pub const IMAGE_FIELD: &str = "image";

/// Public URL prefix uploaded files are served under
pub const PUBLIC_PREFIX: &str = "/uploads";

/// Accepted MIME types and the extension used when the client sends none
const ACCEPTED_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", ".jpg"),
    ("image/png", ".png"),
    ("image/gif", ".gif"),
];

/// An image part read from a multipart request
#[derive(Debug, Clone)]
pub struct ImageUpload {
    /// Client-supplied file name, if any
    pub file_name: Option<String>,

    /// Declared content type
    pub content_type: String,

    pub data: Bytes,
}

/// Text fields plus the optional image of a multipart form
#[derive(Debug, Default)]
pub struct UploadForm {
    pub fields: HashMap<String, String>,
    pub image: Option<ImageUpload>,
}

impl UploadForm {
    /// Returns a text field, `None` when absent
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|s| s.as_str())
    }
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::BadRequest(format!("Multipart error: {}", err))
}

/// Extension for an accepted MIME type, or a validation error
pub fn extension_for(content_type: &str) -> ApiResult<&'static str> {
    ACCEPTED_TYPES
        .iter()
        .find(|(mime, _)| mime.eq_ignore_ascii_case(content_type))
        .map(|(_, ext)| *ext)
        .ok_or_else(|| {
            ApiError::validation(
                IMAGE_FIELD,
                "Invalid file type. Only JPEG, PNG and GIF are allowed.",
            )
        })
}

fn too_large(max_bytes: usize) -> ApiError {
    ApiError::validation(
        IMAGE_FIELD,
        format!("File too large. Maximum size is {} bytes.", max_bytes),
    )
}

/// Reads every part of a multipart form
///
/// The image's type is checked before its body is read.
pub async fn read_form(mut multipart: Multipart, max_bytes: usize) -> ApiResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();

        if name == IMAGE_FIELD {
            let file_name = field.file_name().map(|s| s.to_string());
            let content_type = field.content_type().unwrap_or("").to_string();
            extension_for(&content_type)?;

            let mut data = BytesMut::new();
            while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                if data.len() + chunk.len() > max_bytes {
                    return Err(too_large(max_bytes));
                }
                data.extend_from_slice(&chunk);
            }

            form.image = Some(ImageUpload {
                file_name,
                content_type,
                data: data.freeze(),
            });
        } else if !name.is_empty() {
            let value = field.text().await.map_err(multipart_error)?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}

/// Builds the stored file name `{stem}_{uuid}{ext}`
///
/// The stem is reduced to ASCII alphanumerics, `-` and `_`. The client's
/// extension is kept when it is one of the accepted image extensions.
pub fn stored_file_name(original: Option<&str>, content_type: &str) -> ApiResult<String> {
    let default_ext = extension_for(content_type)?;
    let original = original.unwrap_or("");
    let base = Path::new(original)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    let (raw_stem, raw_ext) = match base.rfind('.') {
        Some(idx) if idx > 0 => (&base[..idx], &base[idx..]),
        _ => (base, ""),
    };

    let stem: String = raw_stem
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(64)
        .collect();
    let stem = if stem.is_empty() { "image".to_string() } else { stem };

    let ext = raw_ext.to_ascii_lowercase();
    let ext = match ext.as_str() {
        ".jpg" | ".jpeg" | ".png" | ".gif" => ext,
        _ => default_ext.to_string(),
    };

    Ok(format!("{}_{}{}", stem, Uuid::new_v4(), ext))
}

/// A file written to the upload directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub file_name: String,

    /// Public path, `/uploads/{file_name}`
    pub url: String,
}

/// Writes the image under `dir`
pub async fn store_image(dir: &Path, image: &ImageUpload) -> ApiResult<StoredImage> {
    let file_name = stored_file_name(image.file_name.as_deref(), &image.content_type)?;
    let path = dir.join(&file_name);

    tokio::fs::write(&path, &image.data).await.map_err(|e| {
        ApiError::InternalError(format!("Failed to write upload {}: {}", path.display(), e))
    })?;

    tracing::info!(file = %file_name, size = image.data.len(), "Image stored");
    Ok(StoredImage {
        url: format!("{}/{}", PUBLIC_PREFIX, file_name),
        file_name,
    })
}

/// Removes a stored image whose task was never saved
pub async fn discard_image(dir: &Path, image: &StoredImage) {
    if let Err(e) = tokio::fs::remove_file(dir.join(&image.file_name)).await {
        tracing::warn!(file = %image.file_name, error = %e, "Failed to remove orphaned upload");
    }
}
