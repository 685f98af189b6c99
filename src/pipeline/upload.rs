//! Media preparation for new assets: object storage when signed in, inline
//! `data:` URLs otherwise.

use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use tracing::warn;

use crate::models::{MediaKind, MediaRef, MediaStorage};
use crate::storage::ObjectStorage;

/// Largest file embedded directly in a record.
pub const MAX_INLINE_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    /// Declared type; guessed from the file name when absent.
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            bytes: bytes.into(),
        }
    }

    /// Only images and videos are accepted.
    pub fn media_type(&self) -> Option<(String, MediaKind)> {
        let content_type = self
            .content_type
            .clone()
            .filter(|ct| !ct.trim().is_empty())
            .unwrap_or_else(|| {
                mime_guess::from_path(&self.file_name)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string()
            });
        let kind = if content_type.starts_with("image/") {
            MediaKind::Image
        } else if content_type.starts_with("video/") {
            MediaKind::Video
        } else {
            return None;
        };
        Some((content_type, kind))
    }
}

pub fn data_url(content_type: &str, bytes: &[u8]) -> String {
    format!("data:{content_type};base64,{}", STANDARD.encode(bytes))
}

fn inline(file: &UploadFile, content_type: &str, kind: MediaKind) -> Result<MediaRef, String> {
    if file.bytes.len() > MAX_INLINE_BYTES {
        return Err(format!(
            "{} is too large to keep without cloud storage ({} bytes, limit {MAX_INLINE_BYTES})",
            file.file_name,
            file.bytes.len()
        ));
    }
    Ok(MediaRef {
        url: data_url(content_type, &file.bytes),
        kind,
        storage: MediaStorage::Inline,
    })
}

/// Resolves the media reference for one file. `Err` carries a user-facing
/// reason the file was skipped.
pub async fn store_media(
    storage: &dyn ObjectStorage,
    token: Option<&str>,
    event_id: &str,
    file: &UploadFile,
    content_type: &str,
    kind: MediaKind,
) -> Result<MediaRef, String> {
    let Some(token) = token else {
        return inline(file, content_type, kind);
    };

    let uploaded = async {
        let presigned = storage
            .presign_upload(&file.file_name, content_type, event_id, token)
            .await?;
        storage
            .put_object(&presigned.upload_url, file.bytes.clone(), content_type)
            .await?;
        anyhow::Ok(presigned.public_url)
    }
    .await;

    match uploaded {
        Ok(url) => Ok(MediaRef {
            url,
            kind,
            storage: MediaStorage::Object,
        }),
        Err(err) => {
            warn!(file = %file.file_name, error = %err, "object upload failed; falling back to inline media");
            inline(file, content_type, kind)
        }
    }
}
