//! Page transcription: drive one page image through the model and always
//! produce an outcome.
//!
//! `Transcriber::transcribe` never fails — every fault (I/O, model error,
//! timeout, empty response, retry exhaustion) is converted into an error
//! [`PageOutcome`], so the orchestrator contains no fault-handling branches
//! for individual pages.
//!
//! Retry policy comes from [`ConversionConfig`] alone: `max_retries` counts
//! attempts and `retry_delay_ms` is the fixed wait between them. Each attempt
//! additionally runs under the `api_timeout_secs` timeout so one hung call
//! burns at most one attempt, not the whole batch.

use crate::config::ConversionConfig;
use crate::error::PageError;
use crate::pipeline::model::{ModelError, VisionModel};
use crate::pipeline::raster::PageImage;
use crate::prompts::DEFAULT_INSTRUCTION;
use crate::report::PageOutcome;
use crate::retry::{with_retry, RetryPolicy};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Transcribes page images via a shared [`VisionModel`].
pub struct Transcriber {
    model: Arc<dyn VisionModel>,
    instruction: String,
    policy: RetryPolicy,
    api_timeout: Duration,
}

impl Transcriber {
    pub fn new(model: Arc<dyn VisionModel>, config: &ConversionConfig) -> Self {
        Self {
            model,
            instruction: config
                .instruction
                .clone()
                .unwrap_or_else(|| DEFAULT_INSTRUCTION.to_string()),
            policy: RetryPolicy::new(
                config.max_retries,
                Duration::from_millis(config.retry_delay_ms),
            ),
            api_timeout: Duration::from_secs(config.api_timeout_secs),
        }
    }

    /// Transcribe one page. Always returns an outcome, success or error.
    pub async fn transcribe(&self, image: &PageImage) -> PageOutcome {
        let start = Instant::now();
        let page = image.page_num;
        let label = format!("page {page}");

        let mut attempts_used: u32 = 0;
        let result = with_retry(self.policy, &label, || {
            attempts_used += 1;
            self.attempt(image)
        })
        .await;

        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(markdown) => {
                debug!(
                    "Page {}: transcribed {} bytes in {}ms ({} attempts)",
                    page,
                    markdown.len(),
                    duration_ms,
                    attempts_used
                );
                PageOutcome {
                    page_num: page,
                    markdown,
                    image: image.path.clone(),
                    attempts: attempts_used,
                    duration_ms,
                    error: None,
                }
            }
            Err(e) => PageOutcome {
                page_num: page,
                markdown: String::new(),
                image: image.path.clone(),
                attempts: attempts_used,
                duration_ms,
                error: Some(PageError::ModelFailed {
                    page,
                    attempts: attempts_used,
                    detail: e.to_string(),
                }),
            },
        }
    }

    /// One attempt: read the artifact, call the model under a timeout, and
    /// reject empty responses so they go back through the retry loop.
    async fn attempt(&self, image: &PageImage) -> Result<String, ModelError> {
        let bytes = tokio::fs::read(&image.path)
            .await
            .map_err(|e| ModelError(format!("failed to read page image: {}", e)))?;

        let call = self
            .model
            .transcribe_image(&bytes, "image/jpeg", &self.instruction);

        let markdown = tokio::time::timeout(self.api_timeout, call)
            .await
            .map_err(|_| {
                ModelError(format!(
                    "model call timed out after {}s",
                    self.api_timeout.as_secs()
                ))
            })??;

        // Empty content is not valid success.
        if markdown.trim().is_empty() {
            return Err(ModelError("model returned an empty response".into()));
        }

        Ok(markdown)
    }
}
