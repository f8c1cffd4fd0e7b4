//! # hand2excal
//!
//! Turn hand-drawn flowcharts and plain-language process descriptions into
//! editable Excalidraw diagrams.
//!
//! The heavy lifting (vision model, layout) happens in a remote conversion
//! service. This crate is the client side: it validates images before upload,
//! keeps a local preview, narrates progress while the request is in flight
//! and guarantees that only the answer to the *current* attempt is ever
//! shown.
//!
//! ## Workflow Overview
//!
//! ```text
//! image file ─▶ validate ─▶ preview ─┐
//!                                     ├─▶ POST /api/convert       ─┐
//! text ───────────────────────────────┴─▶ POST /api/convert-text  ─┴─▶ Done | Failed
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hand2excal::{convert_image, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Service URL from HAND2EXCAL_API_URL, else http://localhost:8000
//!     let config = ConversionConfig::from_env()?;
//!     let result = convert_image("whiteboard.jpg", &config).await?;
//!     println!("{}", result.to_document()?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `hand2excal` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! hand2excal = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod client;
pub mod config;
pub mod convert;
pub mod error;
pub mod input;
pub mod output;
pub mod preview;
pub mod progress;
pub mod validate;
pub mod workflow;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use client::{ConversionService, HttpConversionClient};
pub use config::{ConversionConfig, ConversionConfigBuilder};
pub use convert::{
    convert, convert_image, convert_sync, convert_text, convert_to_file, convert_with,
    ConversionInput,
};
pub use error::{ConversionError, Hand2ExcalError, ValidationError, WorkflowError};
pub use input::ImageCandidate;
pub use output::{write_document, ConversionResult, ResultMetadata};
pub use preview::{MediaPreview, PreviewHandle, PreviewView};
pub use progress::{NoopObserver, ProgressNarrator, WorkflowObserver, STATUS_MESSAGES};
pub use validate::{validate, ACCEPTED_MIME_TYPES, MAX_IMAGE_BYTES};
pub use workflow::{
    AttemptToken, Completion, InputMode, WorkflowController, WorkflowPhase, WorkflowState,
};
