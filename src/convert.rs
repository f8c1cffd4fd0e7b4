//! One-call conversion entry points.
//!
//! Each function builds an [`HttpConversionClient`], runs a fresh
//! [`WorkflowController`] through a single attempt and turns the terminal
//! state into a `Result`. Use the controller directly when you need the
//! interactive behaviour (reselecting, resetting, watching progress).

use crate::client::{ConversionService, HttpConversionClient};
use crate::config::ConversionConfig;
use crate::error::{ConversionError, Hand2ExcalError};
use crate::input::ImageCandidate;
use crate::output::{write_document, ConversionResult};
use crate::validate;
use crate::workflow::{InputMode, WorkflowController, WorkflowState};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// What to convert.
#[derive(Debug, Clone)]
pub enum ConversionInput {
    Image(ImageCandidate),
    Text(String),
}

/// Convert an image file on disk.
///
/// # Errors
/// - file missing or unreadable
/// - [`Hand2ExcalError::Validation`] for unsupported or oversized images
/// - [`Hand2ExcalError::Conversion`] when the service call fails
pub async fn convert_image(
    path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionResult, Hand2ExcalError> {
    let image = ImageCandidate::from_path(path).await?;
    convert(ConversionInput::Image(image), config).await
}

/// Convert a plain-language process description.
pub async fn convert_text(
    text: impl Into<String>,
    config: &ConversionConfig,
) -> Result<ConversionResult, Hand2ExcalError> {
    convert(ConversionInput::Text(text.into()), config).await
}

/// Convert `input` against the HTTP service named in `config`.
pub async fn convert(
    input: ConversionInput,
    config: &ConversionConfig,
) -> Result<ConversionResult, Hand2ExcalError> {
    let client = HttpConversionClient::new(config)?;
    convert_with(Arc::new(client), input, config).await
}

/// Convert and write the resulting document to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_file(
    input: ConversionInput,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionResult, Hand2ExcalError> {
    let result = convert(input, config).await?;
    write_document(&result, output_path).await?;
    Ok(result)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input: ConversionInput,
    config: &ConversionConfig,
) -> Result<ConversionResult, Hand2ExcalError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Hand2ExcalError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input, config))
}

/// Run one attempt against an arbitrary [`ConversionService`].
pub async fn convert_with(
    service: Arc<dyn ConversionService>,
    input: ConversionInput,
    config: &ConversionConfig,
) -> Result<ConversionResult, Hand2ExcalError> {
    let start = Instant::now();
    let mut controller = WorkflowController::new(service, config);

    match input {
        ConversionInput::Image(image) => {
            // Surface the typed rejection rather than the flattened message.
            validate::validate(&image)?;
            controller.select_image(image)?;
            controller.confirm()?;
        }
        ConversionInput::Text(text) => {
            controller.set_mode(InputMode::Text)?;
            controller.submit_text(text)?;
        }
    }

    controller.settle().await;
    let elapsed_ms = start.elapsed().as_millis() as u64;

    match controller.state() {
        WorkflowState::Done { result } => {
            info!("Conversion finished in {}ms", elapsed_ms);
            Ok(result.clone())
        }
        WorkflowState::Failed { error } => Err(error.clone().into()),
        other => Err(ConversionError::new(format!(
            "conversion ended unexpectedly while {}",
            other.phase()
        ))
        .into()),
    }
}
