//! Conversion results and writing them to disk.
//!
//! The service payload is kept opaque: [`ConversionResult`] stores the JSON
//! exactly as received and only offers read-only views onto the parts the CLI
//! cares about (the Excalidraw scene and the shape/arrow counts).

use crate::error::Hand2ExcalError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::info;

/// A successful conversion, passed through from the service untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversionResult {
    payload: Value,
}

/// Counts reported by the service alongside the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub nodes_count: u64,
    pub arrows_count: u64,
}

impl ConversionResult {
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }

    /// The full payload, including `success`.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn into_payload(self) -> Value {
        self.payload
    }

    /// The Excalidraw scene, if the service sent one.
    pub fn excalidraw(&self) -> Option<&Value> {
        self.payload.get("excalidraw")
    }

    pub fn metadata(&self) -> Option<ResultMetadata> {
        self.payload
            .get("metadata")
            .and_then(|m| serde_json::from_value(m.clone()).ok())
    }

    /// Pretty-printed document to save: the scene when present, otherwise
    /// the whole payload.
    pub fn to_document(&self) -> Result<String, Hand2ExcalError> {
        let doc = self.excalidraw().unwrap_or(&self.payload);
        serde_json::to_string_pretty(doc)
            .map_err(|e| Hand2ExcalError::Internal(format!("failed to serialise scene: {e}")))
    }
}

/// Write the result's document to `path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn write_document(
    result: &ConversionResult,
    path: impl AsRef<Path>,
) -> Result<(), Hand2ExcalError> {
    let path = path.as_ref();
    let document = result.to_document()?;
    let write_err = |source| Hand2ExcalError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
    }

    let tmp_path = path.with_extension("excalidraw.tmp");
    tokio::fs::write(&tmp_path, document.as_bytes())
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

    info!("Wrote {} bytes to {}", document.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ConversionResult {
        ConversionResult::new(json!({
            "success": true,
            "excalidraw": { "type": "excalidraw", "version": 2, "elements": [] },
            "metadata": { "nodes_count": 4, "arrows_count": 3 },
        }))
    }

    #[test]
    fn metadata_is_read() {
        assert_eq!(
            sample().metadata(),
            Some(ResultMetadata {
                nodes_count: 4,
                arrows_count: 3
            })
        );
    }

    #[test]
    fn missing_metadata_is_none() {
        let r = ConversionResult::new(json!({ "success": true }));
        assert!(r.metadata().is_none());
        assert!(r.excalidraw().is_none());
    }

    #[test]
    fn serialises_transparently() {
        let r = sample();
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(&v, r.payload());
    }

    #[test]
    fn document_prefers_scene() {
        let doc: Value = serde_json::from_str(&sample().to_document().unwrap()).unwrap();
        assert_eq!(doc["type"], "excalidraw");
        assert!(doc.get("success").is_none());
    }

    #[tokio::test]
    async fn write_document_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/flow.excalidraw");

        write_document(&sample(), &path).await.unwrap();

        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["version"], 2);
        assert!(!path.with_extension("excalidraw.tmp").exists());
    }
}
