//! Native multimodal image API adapter
//!
//! Speaks the generateContent protocol: the prompt and any reference
//! images travel as content parts, the result comes back as inline
//! base64 data. Aspect ratio and temperature replace pixel sizes.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::{ProviderConfig, ProviderKind};
use crate::error::{EngineError, Result};
use crate::generator::{ImageGenerator, ImageRequest, GENERATION_TIMEOUT};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-3-pro-image-preview";

/// Adapter for the native multimodal image API
pub struct NativeImageGenerator {
    client: Client,
    api_key: String,
    base_url: String,
    default_model: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NativeRequest {
    contents: Vec<NativeContent>,
    generation_config: NativeGenerationConfig,
}

#[derive(Debug, Serialize)]
struct NativeContent {
    parts: Vec<NativePart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum NativePart {
    Text { text: String },
    InlineData { inline_data: NativeInlineData },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NativeInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NativeGenerationConfig {
    temperature: f32,
    response_modalities: Vec<String>,
    image_config: NativeImageConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NativeImageConfig {
    aspect_ratio: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NativeResponse {
    #[serde(default)]
    candidates: Vec<NativeCandidate>,
    #[serde(default)]
    prompt_feedback: Option<NativePromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NativeCandidate {
    #[serde(default)]
    content: Option<NativeResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NativePromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NativeResponseContent {
    #[serde(default)]
    parts: Vec<NativeResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NativeResponsePart {
    #[serde(default)]
    inline_data: Option<NativeInlineData>,
}

impl NativeImageGenerator {
    /// Create a new adapter from provider configuration
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(EngineError::Config(
                "Native image API key not configured. \
                 Edit this provider and fill in the API key."
                    .to_string(),
            ));
        }

        let base_url = config
            .base_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let client = Client::builder()
            .timeout(GENERATION_TIMEOUT)
            .build()
            .map_err(|e| EngineError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let default_model = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        info!(base_url = %base_url, model = %default_model, "NativeImageGenerator initialized");

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url,
            default_model,
        })
    }

    fn build_body(&self, request: &ImageRequest) -> NativeRequest {
        let mut parts = Vec::with_capacity(request.references.len() + 1);

        parts.push(NativePart::Text {
            text: request.prompt.clone(),
        });

        for reference in &request.references {
            parts.push(NativePart::InlineData {
                inline_data: NativeInlineData {
                    mime_type: "image/png".to_string(),
                    data: STANDARD.encode(reference),
                },
            });
        }

        NativeRequest {
            contents: vec![NativeContent { parts }],
            generation_config: NativeGenerationConfig {
                temperature: request.temperature,
                response_modalities: vec!["IMAGE".to_string()],
                image_config: NativeImageConfig {
                    aspect_ratio: request.aspect_ratio.clone(),
                },
            },
        }
    }

    fn parse_error(&self, status: u16, detail: &str) -> EngineError {
        let detail: String = detail.chars().take(500).collect();
        match status {
            401 | 403 => EngineError::provider(
                status,
                format!(
                    "Native image API authentication failed (status: {}). \
                     Check the API key for this provider. {}",
                    status, detail
                ),
            ),
            429 => EngineError::provider(
                429,
                "Native image API quota or rate limit reached. Try again \
                 later or check quota usage for this provider.",
            ),
            _ => EngineError::provider(
                status,
                format!(
                    "Native image API request failed (status: {})\n\
                     Error details: {}",
                    status, detail
                ),
            ),
        }
    }
}

#[async_trait]
impl ImageGenerator for NativeImageGenerator {
    async fn generate(&self, request: &ImageRequest) -> Result<Vec<u8>> {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, model
        );

        debug!(
            model = %model,
            aspect_ratio = %request.aspect_ratio,
            references = request.references.len(),
            "Sending native image API request"
        );

        let body = self.build_body(request);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "Native image API request failed");
            return Err(self.parse_error(status.as_u16(), &detail));
        }

        let result: NativeResponse = response.json().await?;

        // Prompt blocks come back as HTTP 200 with a block reason
        if let Some(feedback) = &result.prompt_feedback {
            if let Some(reason) = &feedback.block_reason {
                return Err(EngineError::provider(
                    None,
                    format!(
                        "Prompt blocked by the provider's safety filter: {}. \
                         Modify the prompt and retry.",
                        reason
                    ),
                ));
            }
        }

        let candidate = result.candidates.into_iter().next().ok_or_else(|| {
            EngineError::provider(
                None,
                "Native image API returned no candidates. Possible causes: \
                 prompt blocked by a safety filter, or the model does not \
                 generate images.",
            )
        })?;

        if let Some(reason) = &candidate.finish_reason {
            if reason.contains("SAFETY") || reason.contains("PROHIBITED") {
                return Err(EngineError::provider(
                    None,
                    format!("Content blocked by the provider's safety filter: {}", reason),
                ));
            }
        }

        let inline = candidate
            .content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .find_map(|p| p.inline_data)
            .ok_or_else(|| {
                EngineError::provider(
                    None,
                    "No image data in the native image API response. Confirm \
                     the model name is an image-capable model.",
                )
            })?;

        let bytes = STANDARD
            .decode(inline.data.trim())
            .map_err(|e| EngineError::Decode(e.to_string()))?;

        info!(size = bytes.len(), "Native image API image generated");
        Ok(bytes)
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::NativeImage
    }
}
