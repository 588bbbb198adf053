use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine;

use crate::conversation::InlineData;
use crate::error::ChatError;

const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// What the preview area should show while an attachment is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Image,
    File,
}

/// A file selected by the user, waiting to be sent with the next turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAttachment {
    pub file_name: String,
    /// Base64 content, without any data-URL prefix.
    pub data: String,
    pub mime_type: String,
    pub is_image: bool,
}

impl PendingAttachment {
    pub fn from_bytes(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        let mime_type = mime_type.into();
        PendingAttachment {
            file_name: file_name.into(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            is_image: mime_type.starts_with("image/"),
            mime_type,
        }
    }

    pub fn kind(&self) -> AttachmentKind {
        if self.is_image {
            AttachmentKind::Image
        } else {
            AttachmentKind::File
        }
    }

    /// The part sent to the model: MIME type and data only.
    pub fn to_inline_data(&self) -> InlineData {
        InlineData {
            mime_type: self.mime_type.clone(),
            data: self.data.clone(),
        }
    }
}

/// Read a file from disk and encode it for transport.
pub async fn read_attachment(path: PathBuf) -> Result<PendingAttachment, ChatError> {
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|source| ChatError::AttachmentRead {
            path: path.clone(),
            source: Arc::new(source),
        })?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let mime_type = declared_mime_type(&path, &bytes);

    tracing::info!(
        "Attachment loaded: {} ({}, {} bytes)",
        file_name,
        mime_type,
        bytes.len()
    );

    Ok(PendingAttachment::from_bytes(file_name, mime_type, &bytes))
}

/// MIME type from the file extension, sniffing image headers when the
/// extension says nothing.
pub fn declared_mime_type(path: &Path, bytes: &[u8]) -> String {
    if let Ok(format) = image::ImageFormat::from_path(path) {
        return format.to_mime_type().to_string();
    }

    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase());
    let by_extension = match extension.as_deref() {
        Some("pdf") => Some("application/pdf"),
        Some("txt") | Some("log") => Some("text/plain"),
        Some("md") => Some("text/markdown"),
        Some("csv") => Some("text/csv"),
        Some("html") | Some("htm") => Some("text/html"),
        Some("json") => Some("application/json"),
        Some("mp3") => Some("audio/mpeg"),
        Some("wav") => Some("audio/wav"),
        Some("mp4") => Some("video/mp4"),
        _ => None,
    };
    if let Some(mime) = by_extension {
        return mime.to_string();
    }

    match image::guess_format(bytes) {
        Ok(format) => format.to_mime_type().to_string(),
        Err(_) => FALLBACK_MIME_TYPE.to_string(),
    }
}
