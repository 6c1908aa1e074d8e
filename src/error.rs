//! Error types for the pagemark library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ConvertError`] — **Fatal**: the conversion cannot proceed at all
//!   (bad input file, download failure, nothing rasterised, no provider).
//!   Returned as `Err(ConvertError)` from the top-level `convert*` functions.
//!
//! * [`PageError`] — **Non-fatal**: a single page failed (retries exhausted,
//!   worker fault) but all other pages are fine. Stored inside
//!   [`crate::report::PageOutcome`] so callers can inspect partial success
//!   rather than losing the whole document to one bad page.
//!
//! Transient faults (a single failed model attempt) never appear here at all:
//! they are swallowed and retried inside [`crate::retry`], and only promoted
//! to a [`PageError`] once attempts are exhausted.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pagemark library.
///
/// Page-level failures use [`PageError`] and are stored in
/// [`crate::report::PageOutcome`] rather than propagated here.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// pdfium returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// The requested page window produced no page images, either because the
    /// document is empty or because the window clamped to an empty range.
    #[error("No images generated from '{path}' for page window {start}..={end}")]
    NoImagesGenerated {
        path: PathBuf,
        start: usize,
        end: String,
    },

    // ── Provider errors ───────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Deadline ──────────────────────────────────────────────────────────
    /// The whole-call deadline expired while page tasks were in flight.
    #[error("Conversion deadline of {secs}s exceeded before all pages completed")]
    DeadlineExceeded { secs: u64 },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write under the storage directory.
    #[error("Storage I/O error at '{path}': {source}")]
    StorageIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
///
/// Stored in [`crate::report::PageOutcome`] when a page fails. The overall
/// conversion continues and still returns `Ok`.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// Model call failed after all attempts were used.
    #[error("Page {page}: model call failed after {attempts} attempts: {detail}")]
    ModelFailed {
        page: usize,
        attempts: u32,
        detail: String,
    },

    /// The worker task itself faulted outside the transcriber's own handling.
    #[error("Page {page}: worker task faulted: {detail}")]
    Faulted { page: usize, detail: String },
}

impl PageError {
    /// The 1-based page number this error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::ModelFailed { page, .. } => *page,
            PageError::Faulted { page, .. } => *page,
        }
    }
}
