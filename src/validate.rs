//! Image acceptance policy.
//!
//! Runs synchronously on metadata only, before any preview is allocated or
//! any request is made. A candidate is either fully accepted or rejected with
//! a message the user can act on.

use crate::error::ValidationError;
use crate::input::ImageCandidate;

/// Media types the conversion service can decode.
pub const ACCEPTED_MIME_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/heic",
    "image/bmp",
];

/// Upload ceiling: 20 MiB.
pub const MAX_IMAGE_BYTES: u64 = 20 * 1024 * 1024;

/// Whether `mime_type` is on the whitelist.
///
/// Case-insensitive; parameters such as `; charset=…` are ignored.
pub fn is_accepted_mime(mime_type: &str) -> bool {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    ACCEPTED_MIME_TYPES.contains(&essence.as_str())
}

/// Check a candidate against the type whitelist and the size ceiling.
pub fn validate(candidate: &ImageCandidate) -> Result<(), ValidationError> {
    if !is_accepted_mime(&candidate.mime_type) {
        return Err(ValidationError::UnsupportedType {
            mime_type: candidate.mime_type.clone(),
        });
    }
    if candidate.size_bytes > MAX_IMAGE_BYTES {
        return Err(ValidationError::TooLarge {
            size_bytes: candidate.size_bytes,
            size_mb: candidate.size_mb(),
            limit_mb: MAX_IMAGE_BYTES / (1024 * 1024),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// Metadata-only candidate; the validator never looks at the bytes.
    fn candidate(mime: &str, size: u64) -> ImageCandidate {
        ImageCandidate {
            bytes: Arc::from(Vec::new()),
            mime_type: mime.into(),
            size_bytes: size,
            display_name: "x".into(),
        }
    }

    #[test]
    fn accepts_every_whitelisted_type() {
        for mime in ACCEPTED_MIME_TYPES {
            assert!(validate(&candidate(mime, 1024)).is_ok(), "{mime}");
        }
    }

    #[test]
    fn mime_check_ignores_case_and_params() {
        assert!(is_accepted_mime("IMAGE/PNG"));
        assert!(is_accepted_mime("image/jpeg; q=0.9"));
        assert!(!is_accepted_mime(""));
        assert!(!is_accepted_mime("image/gif"));
    }

    #[test]
    fn rejects_pdf() {
        let err = validate(&candidate("application/pdf", 1024)).unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedType { .. }));
        assert!(err.to_string().contains("Unsupported file type"));
    }

    #[test]
    fn ceiling_is_inclusive() {
        assert!(validate(&candidate("image/png", MAX_IMAGE_BYTES)).is_ok());
        let err = validate(&candidate("image/png", MAX_IMAGE_BYTES + 1)).unwrap_err();
        assert!(matches!(err, ValidationError::TooLarge { limit_mb: 20, .. }));
    }

    #[test]
    fn type_is_checked_before_size() {
        let err = validate(&candidate("text/plain", MAX_IMAGE_BYTES * 2)).unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedType { .. }));
    }

    #[test]
    fn rejects_iff_type_or_size_fails() {
        let mimes = ["image/png", "image/heic", "image/gif", "application/pdf"];
        let sizes = [0, 2 * 1024 * 1024, MAX_IMAGE_BYTES, MAX_IMAGE_BYTES + 1];
        for mime in mimes {
            for size in sizes {
                let expected_ok = is_accepted_mime(mime) && size <= MAX_IMAGE_BYTES;
                assert_eq!(validate(&candidate(mime, size)).is_ok(), expected_ok, "{mime} {size}");
            }
        }
    }
}
