//! Pipeline stages for PDF-to-Markdown conversion.
//!
//! Each submodule implements exactly one transformation step, keeping every
//! stage independently testable.
//!
//! ## Data Flow
//!
//! ```text
//! fetch ──▶ raster ──▶ transcribe ──▶ (orchestrator sorts + combines)
//! (URL)    (pdfium)    (model + retry)
//! ```
//!
//! 1. [`fetch`]      — materialise a remote PDF locally and hash document
//!    bytes for storage keys
//! 2. [`raster`]     — rasterise the clamped page window to JPEG artifacts;
//!    runs in `spawn_blocking` because pdfium is not async-safe
//! 3. [`model`]      — the vision-model seam: trait boundary plus the
//!    edgequake-llm production implementation
//! 4. [`transcribe`] — drive one page through the model with retry and
//!    timeout, always producing an outcome

pub mod fetch;
pub mod model;
pub mod raster;
pub mod transcribe;
