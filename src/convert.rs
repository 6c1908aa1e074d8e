//! Conversion entry points and the batch orchestrator.
//!
//! ## Failure semantics
//!
//! Fatal faults — the document cannot be fetched, cannot be rasterised, or
//! the window rasterises to zero images — return `Err(ConvertError)` before
//! any page work begins. Per-page transcription failure is non-fatal: it
//! degrades that page's outcome only, and the call still returns `Ok` even
//! if every page failed (best-effort document assembly).
//!
//! ## Ordering
//!
//! Pages are submitted in ascending page order but race to completion;
//! correctness depends entirely on the explicit stable sort by page number
//! before combination. Completion order never leaks into the output.

use crate::config::ConversionConfig;
use crate::error::{ConvertError, PageError};
use crate::pipeline::fetch;
use crate::pipeline::model::{resolve_model, VisionModel};
use crate::pipeline::raster::{self, PageImage};
use crate::pipeline::transcribe::Transcriber;
use crate::report::{ConversionReport, PageOutcome};
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Convert a local PDF file to Markdown.
///
/// # Returns
/// `Ok(ConversionReport)` on success, even if some pages failed
/// (check `report.failed_pages`).
///
/// # Errors
/// Returns `Err(ConvertError)` only for fatal errors: file not found or not
/// a PDF, rasterisation failure, zero images for the requested window, no
/// provider configured, or deadline expiry.
pub async fn convert(
    pdf_path: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionReport, ConvertError> {
    let pdf_path = pdf_path.as_ref();
    info!("Starting conversion: {}", pdf_path);

    let local = fetch::validate_local(pdf_path)?;
    convert_resolved(&local, pdf_path.to_string(), config).await
}

/// Convert a PDF fetched from a remote URL to Markdown.
///
/// The document is materialised into local storage first; download failure
/// (network fault, non-2xx response, timeout) is fatal and reported as
/// conversion failure, never as a page-level failure.
pub async fn convert_url(
    pdf_url: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionReport, ConvertError> {
    let pdf_url = pdf_url.as_ref();
    info!("Starting URL conversion: {}", pdf_url);

    let local = fetch::download(pdf_url, config).await?;
    convert_resolved(&local, pdf_url.to_string(), config).await
}

/// Shared orchestration once the document exists locally: rasterise, then
/// hand the image list to [`run_batch`].
async fn convert_resolved(
    pdf_path: &Path,
    source: String,
    config: &ConversionConfig,
) -> Result<ConversionReport, ConvertError> {
    let start = Instant::now();

    let images = raster::rasterize(pdf_path, config).await?;
    run_batch(None, images, pdf_path, source, config, start).await
}

/// The orchestrator core: zero-image check, fan-out under the optional
/// whole-call deadline, page-order restore, and report assembly.
///
/// `model` of `None` resolves one from the config — after the zero-image
/// check, so an empty window fails with the zero-image error rather than
/// demanding a configured provider first.
pub(crate) async fn run_batch(
    model: Option<Arc<dyn VisionModel>>,
    images: Vec<PageImage>,
    pdf_path: &Path,
    source: String,
    config: &ConversionConfig,
    start: Instant,
) -> Result<ConversionReport, ConvertError> {
    // ── Step 1: Refuse an empty batch ────────────────────────────────────
    if images.is_empty() {
        return Err(ConvertError::NoImagesGenerated {
            path: pdf_path.to_path_buf(),
            start: config.pages.start,
            end: config
                .pages
                .end
                .map_or_else(|| "end".to_string(), |e| e.to_string()),
        });
    }
    let model = match model {
        Some(m) => m,
        None => resolve_model(config)?,
    };
    info!("Generated {} page images", images.len());

    // ── Step 2: Fan out, under the optional whole-call deadline ──────────
    info!(
        "Processing {} pages with {} workers",
        images.len(),
        config.worker_count
    );
    let mut outcomes = match config.deadline_secs {
        Some(secs) => {
            tokio::time::timeout(
                Duration::from_secs(secs),
                transcribe_batch(model, images, config),
            )
            .await
            .map_err(|_| ConvertError::DeadlineExceeded { secs })?
        }
        None => transcribe_batch(model, images, config).await,
    };

    // ── Step 3: Restore page order ───────────────────────────────────────
    outcomes.sort_by_key(|o| o.page_num);

    // ── Step 4: Combine and report ───────────────────────────────────────
    let report =
        ConversionReport::from_outcomes(source, outcomes, start.elapsed().as_secs_f64());
    info!(
        "Conversion complete: {}/{} pages succeeded in {:.2}s",
        report.successful_pages, report.total_pages, report.processing_time_seconds
    );

    Ok(report)
}

/// Transcribe a batch of page images with bounded concurrency.
///
/// Submission follows the input order (ascending page number); completion
/// order is unspecified, so the returned vector is unordered — callers sort
/// by `page_num`.
///
/// Every submitted image produces exactly one outcome. Each page future runs
/// under `tokio::spawn`, so even a panicking worker is captured as a
/// synthesised [`PageError::Faulted`] outcome rather than losing the page.
pub async fn transcribe_batch(
    model: Arc<dyn VisionModel>,
    images: Vec<PageImage>,
    config: &ConversionConfig,
) -> Vec<PageOutcome> {
    let transcriber = Arc::new(Transcriber::new(model, config));

    stream::iter(images.into_iter().map(|image| {
        let transcriber = Arc::clone(&transcriber);
        async move {
            let page_num = image.page_num;
            let image_path = image.path.clone();
            let handle =
                tokio::spawn(async move { transcriber.transcribe(&image).await });
            match handle.await {
                Ok(outcome) => outcome,
                Err(join_err) => {
                    warn!("Page {}: worker task faulted: {}", page_num, join_err);
                    PageOutcome {
                        page_num,
                        markdown: String::new(),
                        image: image_path,
                        attempts: 0,
                        duration_ms: 0,
                        error: Some(PageError::Faulted {
                            page: page_num,
                            detail: join_err.to_string(),
                        }),
                    }
                }
            }
        }
    }))
    .buffer_unordered(config.worker_count)
    .collect()
    .await
}
