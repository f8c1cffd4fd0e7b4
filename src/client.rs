//! Submission protocols for the conversion service.
//!
//! [`ConversionService`] is the seam the workflow controller talks to;
//! [`HttpConversionClient`] is the reqwest implementation. Both submissions
//! funnel their response through [`interpret_response`], so image and text
//! conversions fail in exactly the same ways:
//!
//! | Response | Outcome |
//! |----------|---------|
//! | non-2xx, JSON `detail` string | `ConversionError(detail)` |
//! | non-2xx, anything else | `ConversionError("Server error (status)…")` |
//! | 2xx, `success` falsy or missing | `ConversionError("Conversion failed…")` |
//! | 2xx, `success: true` | `ConversionResult(payload)` |
//! | no response at all | `ConversionError(transport message)` |
//!
//! There are no retries. A retry is the user resetting and submitting again.

use crate::config::ConversionConfig;
use crate::error::{ConversionError, Hand2ExcalError, ServiceFailure};
use crate::input::ImageCandidate;
use crate::output::ConversionResult;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, info, warn};

pub const CONVERT_IMAGE_PATH: &str = "/api/convert";
pub const CONVERT_TEXT_PATH: &str = "/api/convert-text";
pub const HEALTH_PATH: &str = "/api/health";

/// Something that can turn an image or a description into a diagram.
///
/// Implementors must be `Send + Sync`; the controller runs each submission on
/// its own tokio task.
#[async_trait]
pub trait ConversionService: Send + Sync {
    async fn submit_image(&self, image: ImageCandidate)
        -> Result<ConversionResult, ConversionError>;

    /// `text` is never empty after trimming; the controller guarantees it.
    async fn submit_text(&self, text: String) -> Result<ConversionResult, ConversionError>;
}

/// Talks to the FastAPI conversion service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpConversionClient {
    client: reqwest::Client,
    config: ConversionConfig,
}

impl HttpConversionClient {
    pub fn new(config: &ConversionConfig) -> Result<Self, Hand2ExcalError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("hand2excal/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Hand2ExcalError::HttpClient(e.to_string()))?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Probe `GET /api/health`.
    pub async fn health(&self) -> Result<(), Hand2ExcalError> {
        let url = self.config.endpoint(HEALTH_PATH);
        let unhealthy = |reason: String| Hand2ExcalError::Unhealthy {
            url: url.clone(),
            reason,
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| unhealthy(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(unhealthy(format!("HTTP {status}")));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| unhealthy(format!("unreadable body: {e}")))?;
        match body.get("status").and_then(Value::as_str) {
            Some("ok") => Ok(()),
            other => Err(unhealthy(format!("unexpected status {other:?}"))),
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<ConversionResult, ConversionError> {
        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("Conversion request failed before a response: {}", e);
                return Err(ServiceFailure::Transport {
                    message: e.to_string(),
                }
                .into());
            }
        };
        let status = response.status();
        let body = match response.bytes().await {
            Ok(b) => b,
            Err(e) => {
                warn!("Conversion response body could not be read: {}", e);
                return Err(ServiceFailure::Transport {
                    message: e.to_string(),
                }
                .into());
            }
        };
        debug!("Conversion service answered {} ({} bytes)", status, body.len());
        interpret_response(status, &body)
    }
}

#[async_trait]
impl ConversionService for HttpConversionClient {
    async fn submit_image(
        &self,
        image: ImageCandidate,
    ) -> Result<ConversionResult, ConversionError> {
        let url = self.config.endpoint(CONVERT_IMAGE_PATH);
        info!(
            "Uploading {} ({:.1} MB, {}) to {}",
            image.display_name,
            image.size_mb(),
            image.mime_type,
            url
        );

        let part = Part::bytes(image.bytes.to_vec())
            .file_name(image.display_name.clone())
            .mime_str(&image.mime_type)
            .map_err(|e| ConversionError::new(format!("Invalid media type: {e}")))?;
        let form = Form::new().part("file", part);

        self.send(self.client.post(&url).multipart(form)).await
    }

    async fn submit_text(&self, text: String) -> Result<ConversionResult, ConversionError> {
        let url = self.config.endpoint(CONVERT_TEXT_PATH);
        info!("Submitting {} characters of text to {}", text.chars().count(), url);

        let body = serde_json::json!({ "text": text });
        self.send(self.client.post(&url).json(&body)).await
    }
}

/// Map a completed HTTP exchange onto the normalized outcome.
pub fn interpret_response(
    status: StatusCode,
    body: &[u8],
) -> Result<ConversionResult, ConversionError> {
    let parsed: Option<Value> = serde_json::from_slice(body).ok();

    if !status.is_success() {
        let detail = parsed
            .as_ref()
            .and_then(|v| v.get("detail"))
            .and_then(Value::as_str)
            .filter(|d| !d.trim().is_empty())
            .map(str::to_string);
        warn!("Conversion service returned {}: {:?}", status, detail);
        return Err(ServiceFailure::Service {
            status: status.as_u16(),
            detail,
        }
        .into());
    }

    match parsed {
        Some(payload) if is_truthy(payload.get("success")) => Ok(ConversionResult::new(payload)),
        _ => {
            warn!("Conversion service reported success=false");
            Err(ServiceFailure::Logical.into())
        }
    }
}

/// Loose truthiness of a JSON flag: missing, `null`, `false`, `0` and `""` are falsy.
fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}
