//! OpenAI-Images-compatible adapter

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::{ProviderConfig, ProviderKind};
use crate::error::{EngineError, Result};
use crate::generator::{
    download_image, normalize_base_url, resolve_endpoint, ImageGenerator, ImageRequest,
    GENERATION_TIMEOUT,
};

const DEFAULT_ENDPOINT: &str = "/v1/images/generations";
const DEFAULT_MODEL: &str = "dall-e-3";

/// Adapter for providers exposing the OpenAI images/generations protocol
pub struct OpenAiImageGenerator {
    client: Client,
    api_key: String,
    base_url: String,
    endpoint: String,
    default_model: String,
    default_quality: Option<String>,
}

#[derive(Debug, Serialize)]
struct ImagesApiRequest {
    model: String,
    prompt: String,
    n: u32,
    size: String,
    response_format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    quality: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImagesApiResponse {
    #[serde(default)]
    data: Vec<ImagesApiData>,
}

#[derive(Debug, Deserialize)]
struct ImagesApiData {
    #[serde(default)]
    b64_json: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

impl OpenAiImageGenerator {
    /// Create a new adapter from provider configuration
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(EngineError::Config(
                "OpenAI-compatible API key not configured. \
                 Edit this provider and fill in the API key."
                    .to_string(),
            ));
        }

        let base_url = match config.base_url.as_deref() {
            Some(url) if !url.is_empty() => normalize_base_url(url),
            _ => {
                return Err(EngineError::Config(
                    "OpenAI-compatible base URL not configured. \
                     Edit this provider and fill in the base URL."
                        .to_string(),
                ))
            }
        };

        let endpoint = resolve_endpoint(config.endpoint.as_deref(), DEFAULT_ENDPOINT);

        let client = Client::builder()
            .timeout(GENERATION_TIMEOUT)
            .build()
            .map_err(|e| EngineError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let default_model = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        info!(
            base_url = %base_url,
            endpoint = %endpoint,
            model = %default_model,
            "OpenAiImageGenerator initialized"
        );

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url,
            endpoint,
            default_model,
            default_quality: config.quality.clone(),
        })
    }

    fn request_url(&self) -> String {
        format!("{}{}", self.base_url, self.endpoint)
    }
}

#[async_trait]
impl ImageGenerator for OpenAiImageGenerator {
    async fn generate(&self, request: &ImageRequest) -> Result<Vec<u8>> {
        let url = self.request_url();
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());

        debug!(url = %url, model = %model, size = %request.size, "Sending images API request");

        // The quality knob is only understood by dall-e models
        let quality = request
            .quality
            .clone()
            .or_else(|| self.default_quality.clone())
            .filter(|_| model.starts_with("dall-e"));

        let payload = ImagesApiRequest {
            model: model.clone(),
            prompt: request.prompt.clone(),
            n: 1,
            size: request.size.clone(),
            response_format: "b64_json".to_string(),
            quality,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() != 200 {
            let detail = response.text().await.unwrap_or_default();
            let detail: String = detail.chars().take(500).collect();
            error!(status = status.as_u16(), error = %detail, "Images API request failed");
            return Err(EngineError::provider(
                status.as_u16(),
                format!(
                    "Images API request failed (status: {})\n\
                     Error details: {}\n\
                     Request URL: {}\n\
                     Model: {}\n\
                     Possible causes: invalid or expired API key, wrong model name, \
                     invalid request parameters, exhausted quota, or a wrong base URL.",
                    status.as_u16(),
                    detail,
                    url,
                    model
                ),
            ));
        }

        let result: ImagesApiResponse = response.json().await?;
        debug!(count = result.data.len(), "Images API response parsed");

        let image = result.data.into_iter().next().ok_or_else(|| {
            EngineError::provider(
                None,
                "Images API returned no image data. \
                 Possible causes: prompt blocked by a safety filter, the model does not \
                 generate images, or an invalid request format.",
            )
        })?;

        if let Some(b64) = image.b64_json {
            let bytes = STANDARD
                .decode(b64.trim())
                .map_err(|e| EngineError::Decode(e.to_string()))?;
            info!(size = bytes.len(), "Images API image generated");
            return Ok(bytes);
        }

        if let Some(url) = image.url {
            let bytes = download_image(&self.client, &url).await?;
            info!(size = bytes.len(), "Images API image downloaded");
            return Ok(bytes);
        }

        Err(EngineError::provider(
            None,
            "Cannot extract image data from the images API response: \
             neither b64_json nor url is present. Check the provider's \
             documentation for its image return format.",
        ))
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenaiImage
    }
}
