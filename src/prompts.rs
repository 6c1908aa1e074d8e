//! Default transcription instruction.
//!
//! Centralised so changing the default behaviour requires editing exactly one
//! place, and so tests can inspect the instruction without a live model.
//! Callers override it via [`crate::config::ConversionConfig::instruction`].

/// Default instruction sent with each page image.
///
/// Used when `ConversionConfig::instruction` is `None`. Kept deliberately
/// minimal: the page image carries all the content, and the instruction only
/// pins the output contract.
pub const DEFAULT_INSTRUCTION: &str =
    "Transcribe this page's content as Markdown only. \
     Output the Markdown content and nothing else — no commentary, \
     no code fences around the document, no page markers.";
