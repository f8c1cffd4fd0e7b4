//! Input acquisition: turn a local path into an [`ImageCandidate`] or a
//! process description.
//!
//! The declared media type comes from the file extension, the same way a
//! browser file picker fills in `File.type`. Nothing here inspects the bytes;
//! whether the type is acceptable is [`crate::validate`]'s call.

use crate::error::Hand2ExcalError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// An image the user picked, before or after validation.
///
/// Cloning is cheap: the bytes are shared.
#[derive(Clone)]
pub struct ImageCandidate {
    pub bytes: Arc<[u8]>,
    pub mime_type: String,
    pub size_bytes: u64,
    pub display_name: String,
}

impl std::fmt::Debug for ImageCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageCandidate")
            .field("display_name", &self.display_name)
            .field("mime_type", &self.mime_type)
            .field("size_bytes", &self.size_bytes)
            .finish_non_exhaustive()
    }
}

impl ImageCandidate {
    /// Build a candidate from in-memory bytes; `size_bytes` is their length.
    pub fn from_bytes(
        bytes: impl Into<Arc<[u8]>>,
        mime_type: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        let bytes = bytes.into();
        Self {
            size_bytes: bytes.len() as u64,
            bytes,
            mime_type: mime_type.into(),
            display_name: display_name.into(),
        }
    }

    /// Size in MiB, for log lines.
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }

    /// Read a local image file.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, Hand2ExcalError> {
        let path = path.as_ref();
        let bytes = read_file(path).await?;
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let mime_type = mime_from_path(path).to_string();
        debug!(
            "Loaded {} ({} bytes, declared {})",
            display_name,
            bytes.len(),
            mime_type
        );
        Ok(Self::from_bytes(bytes, mime_type, display_name))
    }
}

/// Guess the declared media type of a file from its extension.
///
/// Unknown extensions map to `application/octet-stream`, which the validator
/// rejects.
pub fn mime_from_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" | "jfif" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "heic" | "heif" => "image/heic",
        "bmp" => "image/bmp",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "txt" | "md" => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Read a process description from a text file.
pub async fn read_text_file(path: impl AsRef<Path>) -> Result<String, Hand2ExcalError> {
    let path = path.as_ref();
    let bytes = read_file(path).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

async fn read_file(path: &Path) -> Result<Vec<u8>, Hand2ExcalError> {
    let owned = || PathBuf::from(path);
    tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Hand2ExcalError::FileNotFound { path: owned() },
        std::io::ErrorKind::PermissionDenied => {
            Hand2ExcalError::PermissionDenied { path: owned() }
        }
        _ => Hand2ExcalError::ReadFailed {
            path: owned(),
            source: e,
        },
    })
}
