//! Error types for the hand2excal library.
//!
//! Four error types map to four distinct failure modes:
//!
//! * [`ValidationError`]: an image candidate was refused client-side before
//!   any resource was allocated or any request was issued.
//!
//! * [`ConversionError`]: the single, normalized shape every network-facing
//!   failure takes by the time it reaches the workflow controller. It only
//!   carries a user-facing message; the controller never branches on kind.
//!
//! * [`WorkflowError`]: the caller asked the state machine for something the
//!   current state does not allow. State is left untouched.
//!
//! * [`Hand2ExcalError`]: **Fatal** errors from the one-call entry points in
//!   [`crate::convert`] and from file I/O.

use crate::workflow::{InputMode, WorkflowPhase};
use std::path::PathBuf;
use thiserror::Error;

/// Message shown when the service reports `success: false` without a reason.
pub const LOGICAL_FAILURE_MESSAGE: &str = "Conversion failed. Please try again.";

/// Message shown when a transport failure carries no description.
pub const TRANSPORT_FALLBACK_MESSAGE: &str =
    "Network error. Please check your connection and try again.";

/// An image candidate was rejected by [`crate::validate::validate`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Declared media type is not on the whitelist.
    #[error("Unsupported file type: {mime_type}. Use JPG, PNG, WebP, HEIC, or BMP.")]
    UnsupportedType { mime_type: String },

    /// Image exceeds the upload ceiling.
    #[error("Image too large ({size_mb:.1} MB). Max {limit_mb} MB.")]
    TooLarge {
        size_bytes: u64,
        size_mb: f64,
        limit_mb: u64,
    },
}

/// A failed conversion attempt, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ConversionError {
    pub message: String,
}

impl ConversionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<ValidationError> for ConversionError {
    fn from(e: ValidationError) -> Self {
        Self::new(e.to_string())
    }
}

/// Internal taxonomy of network-facing failures.
///
/// Built by the HTTP client and immediately normalized into a
/// [`ConversionError`]; kept separate so logging can still tell them apart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum ServiceFailure {
    /// Non-2xx response.
    #[error("{}", service_message(.status, .detail))]
    Service { status: u16, detail: Option<String> },

    /// 2xx response whose `success` flag was falsy.
    #[error("{}", LOGICAL_FAILURE_MESSAGE)]
    Logical,

    /// The request never produced a response.
    #[error("{}", transport_message(.message))]
    Transport { message: String },
}

fn service_message(status: &u16, detail: &Option<String>) -> String {
    match detail {
        Some(d) => d.clone(),
        None => format!("Server error ({status}). Please try again."),
    }
}

fn transport_message(message: &str) -> &str {
    if message.trim().is_empty() {
        TRANSPORT_FALLBACK_MESSAGE
    } else {
        message
    }
}

impl From<ServiceFailure> for ConversionError {
    fn from(e: ServiceFailure) -> Self {
        Self::new(e.to_string())
    }
}

/// An action was not permitted in the controller's current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("cannot {action} while {phase}")]
    ActionNotAllowed {
        action: &'static str,
        phase: WorkflowPhase,
    },

    #[error("cannot {action} in {mode} mode")]
    WrongMode {
        action: &'static str,
        mode: InputMode,
    },

    /// Text submissions must contain something besides whitespace.
    #[error("Please enter a process description first.")]
    EmptyText,
}

/// All fatal errors returned by the hand2excal library.
#[derive(Debug, Error)]
pub enum Hand2ExcalError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// File exists but could not be read.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Workflow errors ───────────────────────────────────────────────────
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    // ── Service errors ────────────────────────────────────────────────────
    /// The reqwest client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    /// `GET /api/health` did not answer `{"status":"ok"}`.
    #[error("Conversion service at '{url}' is not healthy: {reason}")]
    Unhealthy { url: String, reason: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output diagram file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}
