//! Configuration types for PDF-to-Markdown conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs across tasks and to see at a glance why two
//! runs produced different outputs.
//!
//! Retry behaviour has exactly one source of truth: `max_retries` and
//! `retry_delay_ms` here. The transcriber derives its per-page retry policy
//! from these fields and nothing else.

use crate::error::ConvertError;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for a PDF-to-Markdown conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use pagemark::{ConversionConfig, PageWindow};
///
/// let config = ConversionConfig::builder()
///     .worker_count(4)
///     .max_retries(2)
///     .pages(PageWindow::range(1, 10))
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Root directory for downloaded PDFs and rendered page images.
    /// Default: `"storage"`.
    ///
    /// Page images land under
    /// `{storage_root}/pdf2images/{YYYY/MM/DD}/{doc_hash}/page_NNN.jpg`,
    /// downloads under `{storage_root}/downloads/{YYYY/MM/DD}/`. The caller
    /// owns cleanup of this tree.
    pub storage_root: PathBuf,

    /// JPEG quality for rendered page images, 1–100. Default: 80.
    pub jpeg_quality: u8,

    /// Maximum rendered image dimension (width or height) in pixels.
    /// Default: 2000.
    ///
    /// A safety cap independent of page size: an A0 poster would otherwise
    /// rasterise to an image large enough to exhaust memory and exceed model
    /// upload limits.
    pub max_rendered_pixels: u32,

    /// Number of concurrent model calls. Default: 10.
    ///
    /// Vision-model APIs are network-bound, not CPU-bound, so a batch of 10
    /// in-flight pages typically cuts wall-clock time by close to 10× over
    /// sequential conversion. Lower this if the provider rate-limits you.
    pub worker_count: usize,

    /// Attempts per page model call (not additional retries). Default: 3.
    ///
    /// `1` means a single attempt with no retry. Permanent faults still use
    /// all attempts; the last fault text is what ends up in the page outcome.
    pub max_retries: u32,

    /// Fixed delay between attempts in milliseconds. Default: 1000.
    ///
    /// Deliberately fixed rather than exponential: the page workers are
    /// already bounded by `worker_count`, so there is no herd to thunder.
    pub retry_delay_ms: u64,

    /// Sampling temperature for the model completion. Default: 0.3.
    pub temperature: f32,

    /// Maximum tokens the model may generate per page. Default: 4096.
    pub max_tokens: usize,

    /// Model identifier, e.g. "gpt-4.1-nano", "qwen-vl-plus".
    /// If None, uses the provider default.
    pub model: Option<String>,

    /// Provider name (e.g. "openai", "anthropic"). If None along with
    /// `provider`, the provider is auto-detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    ///
    /// This is also the explicit credential path: construct the provider with
    /// your API key and inject it here; the library never writes credentials
    /// into the process environment.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Transcription instruction sent with each page image.
    /// If None, uses [`crate::prompts::DEFAULT_INSTRUCTION`].
    pub instruction: Option<String>,

    /// Inclusive 1-based page window to convert. Default: all pages.
    pub pages: PageWindow,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Per-model-call timeout in seconds, applied to each attempt.
    /// Default: 60.
    pub api_timeout_secs: u64,

    /// Optional whole-call deadline in seconds for the transcription phase.
    /// Default: None (wait for every submitted page).
    ///
    /// When set, a hung page cannot stall the batch forever: expiry aborts
    /// the call with [`ConvertError::DeadlineExceeded`].
    pub deadline_secs: Option<u64>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("storage"),
            jpeg_quality: 80,
            max_rendered_pixels: 2000,
            worker_count: 10,
            max_retries: 3,
            retry_delay_ms: 1000,
            temperature: 0.3,
            max_tokens: 4096,
            model: None,
            provider_name: None,
            provider: None,
            instruction: None,
            pages: PageWindow::default(),
            download_timeout_secs: 120,
            api_timeout_secs: 60,
            deadline_secs: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("storage_root", &self.storage_root)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("worker_count", &self.worker_count)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("pages", &self.pages)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("deadline_secs", &self.deadline_secs)
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.storage_root = root.into();
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn worker_count(mut self, n: usize) -> Self {
        self.config.worker_count = n.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.max(1);
        self
    }

    pub fn retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_delay_ms = ms;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.config.instruction = Some(instruction.into());
        self
    }

    pub fn pages(mut self, window: PageWindow) -> Self {
        self.config.pages = window;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn deadline_secs(mut self, secs: u64) -> Self {
        self.config.deadline_secs = Some(secs);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, ConvertError> {
        let c = &self.config;
        if c.worker_count == 0 {
            return Err(ConvertError::InvalidConfig(
                "worker_count must be ≥ 1".into(),
            ));
        }
        if c.max_retries == 0 {
            return Err(ConvertError::InvalidConfig(
                "max_retries counts attempts and must be ≥ 1".into(),
            ));
        }
        if c.jpeg_quality == 0 || c.jpeg_quality > 100 {
            return Err(ConvertError::InvalidConfig(format!(
                "jpeg_quality must be 1–100, got {}",
                c.jpeg_quality
            )));
        }
        Ok(self.config)
    }
}

// ── Page window ──────────────────────────────────────────────────────────

/// The inclusive 1-based page range a conversion request operates over.
///
/// `end = None` means "through the end of the document". Out-of-range values
/// are clamped rather than rejected: both ends are bounded into
/// `[1, total]` independently, so an inverted window like `(2, 1)` clamps to
/// an empty range and the conversion fails with a zero-image error instead
/// of guessing at the caller's intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageWindow {
    /// First page, 1-based. Default: 1.
    pub start: usize,
    /// Last page, 1-based inclusive. None = last page of the document.
    pub end: Option<usize>,
}

impl Default for PageWindow {
    fn default() -> Self {
        Self {
            start: 1,
            end: None,
        }
    }
}

impl PageWindow {
    /// Window covering the whole document.
    pub fn all() -> Self {
        Self::default()
    }

    /// Window from `start` through the end of the document.
    pub fn starting_at(start: usize) -> Self {
        Self { start, end: None }
    }

    /// Inclusive window `start..=end`.
    pub fn range(start: usize, end: usize) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    /// Clamp the window against a document of `total` pages.
    ///
    /// Returns the effective inclusive 1-based `(start, end)`, or `None` when
    /// the clamped range is empty (empty document, or start > end after
    /// clamping).
    pub fn clamp(&self, total: usize) -> Option<(usize, usize)> {
        if total == 0 {
            return None;
        }
        let start = self.start.clamp(1, total);
        let end = self.end.unwrap_or(total).clamp(1, total);
        if start <= end {
            Some((start, end))
        } else {
            None
        }
    }
}
