//! Per-page outcomes, the aggregate conversion report, and Markdown
//! combination.
//!
//! A [`PageOutcome`] records exactly one of two things: the transcribed
//! Markdown for its page, or the [`PageError`] that page ended with. The
//! orchestrator folds the full outcome set, sorted by page number, into a
//! [`ConversionReport`] — even failed pages keep their slot in the combined
//! document so page alignment survives partial failure.

use crate::error::PageError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Result of transcribing exactly one page.
///
/// Created by the transcriber, or synthesised by the orchestrator when a
/// worker task faults. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageOutcome {
    /// 1-based page number, carried explicitly from the rasterised
    /// [`crate::pipeline::raster::PageImage`].
    pub page_num: usize,

    /// Transcribed Markdown. Empty when `error` is set.
    pub markdown: String,

    /// The page image this outcome was produced from.
    pub image: PathBuf,

    /// Attempts the model call used (1 on first-try success).
    pub attempts: u32,

    /// Wall-clock duration of the transcription, milliseconds.
    pub duration_ms: u64,

    /// Set when the page failed; `markdown` is empty in that case.
    pub error: Option<PageError>,
}

impl PageOutcome {
    /// True when this page produced Markdown rather than an error.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate result for one conversion request.
///
/// Invariant: `successful_pages + failed_pages == processed_pages`, and
/// `processed_pages == total_pages` for every `Ok` return (fatal errors
/// return `Err(ConvertError)` before any report exists).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionReport {
    /// Always true on an `Ok` return; kept in the serialised form so report
    /// consumers can branch on one field.
    pub success: bool,

    /// The input path or URL this report describes.
    pub source: String,

    /// Pages rasterised for the requested window.
    pub total_pages: usize,

    /// Pages that produced an outcome (success or error).
    pub processed_pages: usize,

    /// Pages transcribed successfully.
    pub successful_pages: usize,

    /// Pages recorded as errors.
    pub failed_pages: usize,

    /// Elapsed time from just before rasterisation to just after combination.
    pub processing_time_seconds: f64,

    /// All outcomes, ascending by page number.
    pub results: Vec<PageOutcome>,

    /// The assembled Markdown document.
    pub combined_markdown: String,
}

impl ConversionReport {
    /// Assemble a report from outcomes already sorted by page number.
    pub(crate) fn from_outcomes(
        source: String,
        outcomes: Vec<PageOutcome>,
        elapsed_secs: f64,
    ) -> Self {
        let successful = outcomes.iter().filter(|o| o.is_success()).count();
        let failed = outcomes.len() - successful;
        let combined_markdown = combine_markdown(&outcomes);

        Self {
            success: true,
            source,
            total_pages: outcomes.len(),
            processed_pages: outcomes.len(),
            successful_pages: successful,
            failed_pages: failed,
            processing_time_seconds: elapsed_secs,
            results: outcomes,
            combined_markdown,
        }
    }
}

/// Combine page outcomes into a single Markdown document.
///
/// Every page in the window gets a clearly marked section whether it
/// succeeded or failed:
///
/// ```text
/// ## Page 1
/// <content>
/// ---
/// ## Page 2 - Error
/// *Error processing this page: <detail>*
/// ---
/// ```
///
/// Callers must pass outcomes in page order; completion order must never
/// reach this function.
pub fn combine_markdown(outcomes: &[PageOutcome]) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(outcomes.len() * 3);

    for outcome in outcomes {
        match &outcome.error {
            None => {
                parts.push(format!("\n## Page {}\n", outcome.page_num));
                parts.push(outcome.markdown.clone());
                parts.push("\n---\n".to_string());
            }
            Some(err) => {
                parts.push(format!("\n## Page {} - Error\n", outcome.page_num));
                parts.push(format!("*Error processing this page: {}*\n", err));
                parts.push("\n---\n".to_string());
            }
        }
    }

    parts.join("\n")
}
