//! Generator module - provider trait, adapters, and factory

pub mod factory;
pub mod native;
pub mod openai_chat;
pub mod openai_image;

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::config::ProviderKind;
use crate::error::{EngineError, Result};

/// Timeout for a single generation call
pub(crate) const GENERATION_TIMEOUT: Duration = Duration::from_secs(180);

/// Timeout for secondary image downloads (URL-based provider responses)
pub(crate) const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Uniform request passed to every adapter. Each adapter uses the fields
/// its protocol understands and ignores the rest.
#[derive(Debug, Clone, Default)]
pub struct ImageRequest {
    /// The prompt to generate the image from
    pub prompt: String,

    /// Model override; adapters fall back to their configured default
    pub model: Option<String>,

    /// Pixel size for size-based providers (e.g. "1024x1024")
    pub size: String,

    /// Aspect ratio for ratio-based providers (e.g. "16:9")
    pub aspect_ratio: String,

    /// Sampling temperature for providers that accept one
    pub temperature: f32,

    /// Quality tier for providers that accept one ("standard" or "hd")
    pub quality: Option<String>,

    /// Reference images steering visual consistency, ordered
    /// `[user images..., cover]`
    pub references: Vec<Vec<u8>>,
}

/// Trait for image generation provider adapters
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate one image and return its raw bytes
    async fn generate(&self, request: &ImageRequest) -> Result<Vec<u8>>;

    /// The protocol this adapter speaks
    fn kind(&self) -> ProviderKind;
}

/// Strip a trailing `/` and a trailing `/v1` from a configured base URL so
/// endpoint paths can be appended verbatim.
pub(crate) fn normalize_base_url(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    let trimmed = trimmed.strip_suffix("/v1").unwrap_or(trimmed);
    trimmed.trim_end_matches('/').to_string()
}

/// Resolve a configured endpoint path. The shorthands "images" and "chat"
/// expand to the standard OpenAI paths; anything else is used verbatim
/// with a leading slash enforced.
pub(crate) fn resolve_endpoint(endpoint: Option<&str>, default: &str) -> String {
    let endpoint = match endpoint {
        Some(e) if !e.is_empty() => e,
        _ => default,
    };

    let expanded = match endpoint {
        "images" => "/v1/images/generations",
        "chat" => "/v1/chat/completions",
        other => other,
    };

    if expanded.starts_with('/') {
        expanded.to_string()
    } else {
        format!("/{}", expanded)
    }
}

/// Download an image from a provider-returned URL
pub(crate) async fn download_image(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    debug!(url = %url, "Downloading provider image");

    let response = client
        .get(url)
        .timeout(DOWNLOAD_TIMEOUT)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                EngineError::Download("Image download timed out, please retry".to_string())
            } else {
                EngineError::Download(format!("Image download failed: {}", e))
            }
        })?;

    if !response.status().is_success() {
        return Err(EngineError::Download(format!(
            "Image download failed: HTTP {}",
            response.status().as_u16()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| EngineError::Download(format!("Image download failed: {}", e)))?;

    debug!(size = bytes.len(), "Provider image downloaded");
    Ok(bytes.to_vec())
}
