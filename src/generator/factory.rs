//! Adapter factory keyed on the configured provider kind

use std::sync::Arc;
use tracing::debug;

use crate::config::{ProviderConfig, ProviderKind};
use crate::error::Result;
use crate::generator::native::NativeImageGenerator;
use crate::generator::openai_chat::OpenAiChatGenerator;
use crate::generator::openai_image::OpenAiImageGenerator;
use crate::generator::ImageGenerator;

/// Build the adapter matching the configuration's declared kind.
/// Required fields (API key, base URL) are validated here, at
/// construction, so a misconfigured provider fails before any task runs.
pub fn create(config: &ProviderConfig) -> Result<Arc<dyn ImageGenerator>> {
    debug!(kind = config.kind.as_str(), "Creating image generator");

    let generator: Arc<dyn ImageGenerator> = match config.kind {
        ProviderKind::NativeImage => Arc::new(NativeImageGenerator::new(config)?),
        ProviderKind::OpenaiImage => Arc::new(OpenAiImageGenerator::new(config)?),
        ProviderKind::OpenaiChat => Arc::new(OpenAiChatGenerator::new(config)?),
    };

    Ok(generator)
}
