//! OpenAI-Chat-compatible adapter
//!
//! Some providers only expose image generation through a chat/completions
//! endpoint: the model's free-text reply carries the image as a Markdown
//! link, a base64 data URL, or a bare URL. This adapter extracts it.

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

const DEFAULT_ENDPOINT: &str = "/v1/chat/completions";
const DEFAULT_MODEL: &str = "dall-e-3";

/// Adapter extracting images from OpenAI-compatible chat replies
pub struct OpenAiChatGenerator {
    client: Client,
    api_key: String,
    base_url: String,
    endpoint: String,
    default_model: String,
}

#[derive(Debug, Serialize)]
struct ChatApiRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatApiResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatReply>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiChatGenerator {
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
            "OpenAiChatGenerator initialized"
        );

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url,
            endpoint,
            default_model,
        })
    }

    /// Pull image bytes out of the model's free-text reply, in priority
    /// order: Markdown image link, data URL, bare URL.
    async fn extract_image(&self, content: &str) -> Result<Vec<u8>> {
        if let Some(url) = extract_markdown_image_url(content) {
            info!("Extracted Markdown image link from chat reply");
            return download_image(&self.client, url).await;
        }

        if content.starts_with("data:image") {
            info!("Detected base64 image data in chat reply");
            let payload = content
                .splitn(2, ',')
                .nth(1)
                .ok_or_else(|| EngineError::Decode("Malformed data URL".to_string()))?;
            return STANDARD
                .decode(payload.trim())
                .map_err(|e| EngineError::Decode(e.to_string()));
        }

        if content.starts_with("http://") || content.starts_with("https://") {
            info!("Detected bare image URL in chat reply");
            return download_image(&self.client, content.trim()).await;
        }

        Err(EngineError::provider(
            None,
            format!(
                "Cannot extract image data from the chat API reply.\n\
                 Reply: {}\n\
                 Possible causes: this model does not generate images, the reply \
                 format is unrecognized, or the prompt was blocked by a safety \
                 filter. Confirm the model name and adjust the prompt.",
                content.chars().take(500).collect::<String>()
            ),
        ))
    }
}

#[async_trait]
impl ImageGenerator for OpenAiChatGenerator {
    async fn generate(&self, request: &ImageRequest) -> Result<Vec<u8>> {
        let url = format!("{}{}", self.base_url, self.endpoint);
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());

        debug!(url = %url, model = %model, "Sending chat API request");

        let payload = ChatApiRequest {
            model: model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
            max_tokens: 4096,
            temperature: 1.0,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            let detail = response.text().await.unwrap_or_default();
            let detail: String = detail.chars().take(300).collect();
            error!(status = status, error = %detail, "Chat API request failed");

            return Err(match status {
                401 => EngineError::provider(
                    401,
                    "API key authentication failed. The key is invalid, expired, \
                     or malformed. Check the API key for this provider.",
                ),
                429 => EngineError::provider(
                    429,
                    "API quota or rate limit reached. Try again later or check \
                     quota usage for this provider.",
                ),
                _ => EngineError::provider(
                    status,
                    format!(
                        "Chat API request failed (status: {})\n\
                         Error details: {}\n\
                         Request URL: {}\n\
                         Model: {}",
                        status, detail, url, model
                    ),
                ),
            });
        }

        let result: ChatApiResponse = response.json().await?;

        let content = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content);

        match content {
            Some(content) => self.extract_image(&content).await,
            None => Err(EngineError::provider(
                None,
                "Chat API reply contained no message content. This model may \
                 not support image generation.",
            )),
        }
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenaiChat
    }
}

/// Find the first Markdown image link `![alt](http(s)://...)` in a reply
/// and return its URL.
fn extract_markdown_image_url(content: &str) -> Option<&str> {
    let mut rest = content;
    while let Some(start) = rest.find("![") {
        let after = &rest[start + 2..];
        let Some(close) = after.find("](") else {
            return None;
        };
        let candidate = &after[close + 2..];
        if let Some(end) = candidate.find(')') {
            let url = &candidate[..end];
            if (url.starts_with("http://") || url.starts_with("https://"))
                && !url.contains(char::is_whitespace)
            {
                return Some(url);
            }
        }
        rest = candidate;
    }
    None
}
