//! Remote generation service: the `GenerationService` seam and the Gemini
//! client behind it.
//!
//! One call per job; batching is entirely the dispatcher's local fan-out.
//! Request building and response parsing are plain functions so they can be
//! tested without a network.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::{json, Value};

use crate::media::TransportImage;

pub const GEMINI_MODEL: &str = "gemini-3-pro-image-preview";
const API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Output-shape configuration forwarded with every request
#[derive(Debug, Clone)]
pub struct OutputShape {
    pub aspect_ratio: String,
    pub image_size: String,
}

impl Default for OutputShape {
    fn default() -> Self {
        // Square stickers at the 1K tier.
        Self {
            aspect_ratio: "1:1".to_string(),
            image_size: "1K".to_string(),
        }
    }
}

/// Errors from one generation call
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// The request never produced an HTTP response.
    #[error("Request failed: {0}")]
    Request(String),

    /// The service answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The response arrived but did not carry a usable image.
    #[error("Malformed response: {0}")]
    Response(String),
}

/// Capability contract for the remote image generator
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(
        &self,
        image: &TransportImage,
        instruction: &str,
        shape: &OutputShape,
    ) -> Result<Vec<u8>, GenerateError>;
}

/// Gemini-backed implementation
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
}

impl GeminiClient {
    /// Failure here is a process-level error: nothing has been dispatched
    /// yet, so no job status may change.
    pub fn new(api_key: String) -> Result<Self, String> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| format!("Failed to initialize HTTP client: {}", e))?;
        Ok(Self { http, api_key })
    }
}

fn build_request_body(image: &TransportImage, instruction: &str, shape: &OutputShape) -> Value {
    json!({
        "contents": {
            "parts": [
                {
                    "inlineData": {
                        "mimeType": image.mime,
                        "data": image.data
                    }
                },
                {
                    "text": instruction
                }
            ]
        },
        "generationConfig": {
            "imageConfig": {
                "aspectRatio": shape.aspect_ratio,
                "imageSize": shape.image_size
            }
        }
    })
}

/// Pulls the human-readable message out of a Gemini error body, falling
/// back to a truncated raw body.
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(message) = value["error"]["message"].as_str() {
            return message.to_string();
        }
    }
    let mut message = body.trim().to_string();
    if message.len() > 200 {
        message.truncate(200);
    }
    if message.is_empty() {
        message = "no error details returned".to_string();
    }
    message
}

/// Finds the first inline image part of the first candidate and decodes it.
fn extract_inline_image(body: &Value) -> Result<Vec<u8>, GenerateError> {
    let parts = body["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or_else(|| GenerateError::Response("no content returned".to_string()))?;

    for part in parts {
        if let Some(data) = part["inlineData"]["data"].as_str() {
            return BASE64
                .decode(data)
                .map_err(|e| GenerateError::Response(format!("invalid image payload: {}", e)));
        }
    }

    Err(GenerateError::Response(
        "no image data found in generation result".to_string(),
    ))
}

#[async_trait]
impl GenerationService for GeminiClient {
    async fn generate(
        &self,
        image: &TransportImage,
        instruction: &str,
        shape: &OutputShape,
    ) -> Result<Vec<u8>, GenerateError> {
        let url = format!("{}/{}:generateContent", API_BASE_URL, GEMINI_MODEL);
        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&build_request_body(image, instruction, shape))
            .send()
            .await
            .map_err(|e| GenerateError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerateError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| GenerateError::Response(e.to_string()))?;
        extract_inline_image(&body)
    }
}
