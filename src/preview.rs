//! Local preview handles for accepted images.
//!
//! [`MediaPreview::create`] registers a shared reference to the image bytes
//! and hands back a [`PreviewHandle`]. The handle is the only way to reach
//! those bytes, is not `Clone`, and [`MediaPreview::release`] consumes it.
//! Whoever holds the handle therefore owns the resource, and dropping the
//! registry entry is always an explicit act.
//!
//! Rendering reads only the image header with the `image` crate to learn the
//! format and dimensions; pixels are never decoded here. Display layers that
//! need the picture ask for [`MediaPreview::data_uri`]. A header failure is
//! purely cosmetic: [`PreviewView::Fallback`] replaces the picture and the
//! workflow carries on.

use crate::input::ImageCandidate;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageReader;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use tracing::{debug, warn};

/// A revocable reference to an accepted image's bytes.
#[derive(Debug, PartialEq, Eq)]
pub struct PreviewHandle {
    id: u64,
}

impl PreviewHandle {
    pub fn id(&self) -> u64 {
        self.id
    }
}

#[derive(Debug)]
struct PreviewEntry {
    bytes: Arc<[u8]>,
    mime_type: String,
}

/// What a display layer should show for a preview.
#[derive(Debug, Clone, PartialEq)]
pub enum PreviewView {
    /// The header was readable; fetch the bytes with [`MediaPreview::data_uri`].
    Image { width: u32, height: u32 },
    /// The image could not be decoded for display.
    Fallback { reason: String },
}

impl PreviewView {
    pub fn is_fallback(&self) -> bool {
        matches!(self, PreviewView::Fallback { .. })
    }
}

/// Registry of live preview handles.
#[derive(Debug, Default)]
pub struct MediaPreview {
    next_id: u64,
    live: HashMap<u64, PreviewEntry>,
}

impl MediaPreview {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a handle for `candidate`. The bytes are shared, not copied.
    pub fn create(&mut self, candidate: &ImageCandidate) -> PreviewHandle {
        self.next_id += 1;
        let id = self.next_id;
        self.live.insert(
            id,
            PreviewEntry {
                bytes: Arc::clone(&candidate.bytes),
                mime_type: candidate.mime_type.clone(),
            },
        );
        debug!("Preview {} created for {}", id, candidate.display_name);
        PreviewHandle { id }
    }

    /// Revoke a handle. `None` and already-revoked handles are no-ops.
    pub fn release(&mut self, handle: Option<PreviewHandle>) {
        if let Some(handle) = handle {
            if self.live.remove(&handle.id).is_some() {
                debug!("Preview {} released", handle.id);
            }
        }
    }

    pub fn is_live(&self, handle: &PreviewHandle) -> bool {
        self.live.contains_key(&handle.id)
    }

    /// Number of handles created and not yet released.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// `data:` URI for the handle's bytes, or `None` once revoked.
    pub fn data_uri(&self, handle: &PreviewHandle) -> Option<String> {
        self.live
            .get(&handle.id)
            .map(|e| format!("data:{};base64,{}", e.mime_type, STANDARD.encode(&e.bytes)))
    }

    /// Read the image header for display, falling back on failure.
    pub fn render(&self, handle: &PreviewHandle) -> PreviewView {
        let Some(entry) = self.live.get(&handle.id) else {
            return PreviewView::Fallback {
                reason: "preview was released".into(),
            };
        };
        match read_dimensions(&entry.bytes) {
            Ok((width, height)) => PreviewView::Image { width, height },
            Err(e) => {
                warn!("Preview {} could not be decoded: {}", handle.id, e);
                PreviewView::Fallback {
                    reason: e.to_string(),
                }
            }
        }
    }
}

fn read_dimensions(bytes: &[u8]) -> image::ImageResult<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_dimensions()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};

    fn png_candidate(w: u32, h: u32) -> ImageCandidate {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 255])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .expect("encode should succeed");
        ImageCandidate::from_bytes(buf, "image/png", "sketch.png")
    }

    #[test]
    fn create_and_release() {
        let mut previews = MediaPreview::new();
        let handle = previews.create(&png_candidate(4, 4));
        assert!(previews.is_live(&handle));
        assert_eq!(previews.live_count(), 1);

        previews.release(Some(handle));
        assert_eq!(previews.live_count(), 0);
    }

    #[test]
    fn release_none_is_noop() {
        let mut previews = MediaPreview::new();
        previews.release(None);
        assert_eq!(previews.live_count(), 0);
    }

    #[test]
    fn release_foreign_handle_is_noop() {
        let mut a = MediaPreview::new();
        let mut b = MediaPreview::new();
        let ha = a.create(&png_candidate(2, 2));
        let hb = b.create(&png_candidate(2, 2));
        // Same id, different registry: b's entry must survive a's release.
        a.release(Some(ha));
        a.release(Some(hb));
        assert_eq!(a.live_count(), 0);
        assert_eq!(b.live_count(), 1);
    }

    #[test]
    fn handles_have_distinct_ids() {
        let mut previews = MediaPreview::new();
        let c = png_candidate(2, 2);
        let h1 = previews.create(&c);
        let h2 = previews.create(&c);
        assert_ne!(h1.id(), h2.id());
        assert_eq!(previews.live_count(), 2);
    }

    #[test]
    fn render_reads_png_dimensions() {
        let mut previews = MediaPreview::new();
        let handle = previews.create(&png_candidate(12, 7));
        assert_eq!(
            previews.render(&handle),
            PreviewView::Image {
                width: 12,
                height: 7
            }
        );
        let uri = previews.data_uri(&handle).unwrap();
        assert!(uri.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn render_tolerates_missing_trailer() {
        let mut bytes = png_candidate(40, 30).bytes.to_vec();
        // Drop the IEND chunk; dimensions come from IHDR.
        bytes.truncate(bytes.len() - 12);
        let mut previews = MediaPreview::new();
        let handle = previews.create(&ImageCandidate::from_bytes(bytes, "image/png", "cut.png"));
        assert_eq!(
            previews.render(&handle),
            PreviewView::Image {
                width: 40,
                height: 30
            }
        );
    }

    #[test]
    fn render_falls_back_on_garbage() {
        let mut previews = MediaPreview::new();
        let c = ImageCandidate::from_bytes(b"\x00\x01garbage".to_vec(), "image/heic", "x.heic");
        let handle = previews.create(&c);
        let view = previews.render(&handle);
        assert!(view.is_fallback(), "got {view:?}");
        // A failed render leaves the handle alive.
        assert!(previews.is_live(&handle));
    }

    #[test]
    fn data_uri_gone_after_release() {
        let mut previews = MediaPreview::new();
        let handle = previews.create(&png_candidate(1, 1));
        let id = handle.id();
        assert!(previews.data_uri(&handle).is_some());
        previews.release(Some(handle));
        assert!(previews.data_uri(&PreviewHandle { id }).is_none());
    }
}
