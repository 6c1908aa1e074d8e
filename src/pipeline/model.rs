//! The vision-model seam: a trait boundary plus the edgequake-llm
//! production implementation.
//!
//! The remote model is a black-box collaborator with one contract: image
//! bytes plus an instruction in, Markdown text out. Putting a trait at that
//! boundary keeps retry, timeout, and outcome logic in
//! [`crate::pipeline::transcribe`] testable without a network, and lets the
//! orchestrator stay ignorant of which provider is behind the call.

use crate::config::ConversionConfig;
use crate::error::ConvertError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// A single failed model call. Transient from the pipeline's perspective:
/// the retry wrapper decides whether it becomes a page-level failure.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ModelError(pub String);

/// A remote vision-capable language model.
///
/// Implementations must be cheap to share (`Arc<dyn VisionModel>`) and safe
/// to call concurrently from many page workers.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Transcribe one page image according to `instruction`.
    ///
    /// Returns the raw model text. An `Err` is a single-attempt fault; the
    /// caller owns retry policy.
    async fn transcribe_image(
        &self,
        image_bytes: &[u8],
        mime_type: &str,
        instruction: &str,
    ) -> Result<String, ModelError>;
}

/// Production [`VisionModel`] over an edgequake-llm provider.
pub struct ProviderModel {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
}

impl ProviderModel {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ConversionConfig) -> Self {
        Self {
            provider,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

#[async_trait]
impl VisionModel for ProviderModel {
    async fn transcribe_image(
        &self,
        image_bytes: &[u8],
        mime_type: &str,
        instruction: &str,
    ) -> Result<String, ModelError> {
        let b64 = STANDARD.encode(image_bytes);
        debug!("Encoded page image → {} bytes base64", b64.len());

        // One user turn carrying the instruction text and the page image.
        // `detail: high` keeps fine print and small tables readable for
        // GPT-4-class tiling.
        let image = ImageData::new(b64, mime_type).with_detail("high");
        let messages = vec![ChatMessage::user_with_images(instruction, vec![image])];

        let options = CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| ModelError(format!("{}", e)))?;

        Ok(response.content)
    }
}

/// Resolve the model to use, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`) — the caller constructed and
///    configured the provider entirely, credentials included. This is the
///    path that involves no environment access at all.
/// 2. **Named provider + model** (`config.provider_name`) — instantiated via
///    [`ProviderFactory::create_llm_provider`], which reads the matching API
///    key from the environment.
/// 3. **Full auto-detection** — [`ProviderFactory::from_env`] scans known API
///    key variables and picks the first available provider.
pub fn resolve_model(config: &ConversionConfig) -> Result<Arc<dyn VisionModel>, ConvertError> {
    let provider = resolve_provider(config)?;
    Ok(Arc::new(ProviderModel::new(provider, config)))
}

fn resolve_provider(config: &ConversionConfig) -> Result<Arc<dyn LLMProvider>, ConvertError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
        return ProviderFactory::create_llm_provider(name, model).map_err(|e| {
            ConvertError::ProviderNotConfigured {
                provider: name.clone(),
                hint: format!("{e}"),
            }
        });
    }

    let (provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ConvertError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "auto-detection found no usable API key in the environment ({e}); \
                 export one (e.g. OPENAI_API_KEY), set ConversionConfig::provider_name, \
                 or inject a pre-built provider via ConversionConfig::provider"
            ),
        })?;

    Ok(provider)
}
