//! # pagemark
//!
//! Convert PDF documents to Markdown by transcribing rasterised pages with a
//! vision-capable language model.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Fetch       local path or download from URL (content-hashed storage)
//!  ├─ 2. Rasterise   page window → JPEG per page via pdfium (spawn_blocking)
//!  ├─ 3. Transcribe  concurrent model calls, per-page retry + timeout
//!  ├─ 4. Reorder     stable sort by page number — completion order never leaks
//!  └─ 5. Combine     one Markdown document with a section per page
//! ```
//!
//! Individual page failures never abort the job: a failed page keeps its slot
//! in the combined document as a marked error section, and the
//! [`ConversionReport`] carries per-page outcomes alongside the totals.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pagemark::{convert, ConversionConfig, PageWindow};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = ConversionConfig::builder()
//!         .pages(PageWindow::range(1, 20))
//!         .worker_count(8)
//!         .build()?;
//!     let report = convert("document.pdf", &config).await?;
//!     println!("{}", report.combined_markdown);
//!     eprintln!(
//!         "{}/{} pages in {:.1}s",
//!         report.successful_pages, report.total_pages, report.processing_time_seconds
//!     );
//!     Ok(())
//! }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod pipeline;
pub mod prompts;
pub mod report;
pub mod retry;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, PageWindow};
pub use convert::{convert, convert_url, transcribe_batch};
pub use error::{ConvertError, PageError};
pub use pipeline::model::{ModelError, ProviderModel, VisionModel};
pub use pipeline::raster::PageImage;
pub use pipeline::transcribe::Transcriber;
pub use report::{combine_markdown, ConversionReport, PageOutcome};
pub use retry::{with_retry, RetryPolicy};
