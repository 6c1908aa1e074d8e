//! PDF rasterisation: render the clamped page window to JPEG artifacts.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! `tokio::task::spawn_blocking` moves the work onto a dedicated thread pool
//! thread so the Tokio workers never stall during CPU-heavy rendering.
//!
//! ## Storage layout
//!
//! One JPEG per page, named by zero-padded page index, under a directory
//! keyed by document content hash and date:
//!
//! ```text
//! {storage_root}/pdf2images/{YYYY/MM/DD}/{doc_hash16}/page_001.jpg
//! ```
//!
//! The hash key means re-converting the same document on the same day reuses
//! a stable location; the caller owns cleanup of the tree.

use crate::config::{ConversionConfig, PageWindow};
use crate::error::ConvertError;
use crate::pipeline::fetch;
use chrono::Local;
use image::codecs::jpeg::JpegEncoder;
use pdfium_render::prelude::*;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One rasterised page. Immutable once produced.
///
/// The page number is an explicit field — downstream stages never parse it
/// back out of the artifact filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    /// 1-based page number, unique within the document.
    pub page_num: usize,
    /// Path of the persisted JPEG.
    pub path: PathBuf,
    /// Content hash of the source document (directory key).
    pub doc_hash: String,
}

/// Rasterise the configured page window of `pdf_path` into JPEG artifacts.
///
/// The window is clamped against the document length: both ends are bounded
/// into `[1, total]` independently, and an empty clamped range returns an
/// empty vector (the orchestrator maps that to a fatal zero-image error).
///
/// Runs inside `spawn_blocking` since pdfium operations are CPU-bound.
pub async fn rasterize(
    pdf_path: &Path,
    config: &ConversionConfig,
) -> Result<Vec<PageImage>, ConvertError> {
    let doc_hash = fetch::file_sha256(pdf_path)?;
    let output_dir = config
        .storage_root
        .join("pdf2images")
        .join(Local::now().format("%Y/%m/%d").to_string())
        .join(&doc_hash[..16]);

    let path = pdf_path.to_path_buf();
    let window = config.pages;
    let max_pixels = config.max_rendered_pixels;
    let quality = config.jpeg_quality;

    tokio::task::spawn_blocking(move || {
        rasterize_blocking(&path, &output_dir, &doc_hash, window, max_pixels, quality)
    })
    .await
    .map_err(|e| ConvertError::Internal(format!("Render task panicked: {}", e)))?
}

/// Blocking implementation of page rasterisation.
fn rasterize_blocking(
    pdf_path: &Path,
    output_dir: &Path,
    doc_hash: &str,
    window: PageWindow,
    max_pixels: u32,
    quality: u8,
) -> Result<Vec<PageImage>, ConvertError> {
    let pdfium = Pdfium::default();

    let document =
        pdfium
            .load_pdf_from_file(pdf_path, None)
            .map_err(|e| ConvertError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: format!("{:?}", e),
            })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let Some((start, end)) = window.clamp(total_pages) else {
        warn!(
            "Page window {:?} clamps to an empty range (document has {} pages)",
            window, total_pages
        );
        return Ok(Vec::new());
    };
    debug!("Rasterising pages {}..={}", start, end);

    std::fs::create_dir_all(output_dir).map_err(|e| ConvertError::StorageIo {
        path: output_dir.to_path_buf(),
        source: e,
    })?;

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut results = Vec::with_capacity(end - start + 1);

    for page_num in start..=end {
        let page =
            pages
                .get((page_num - 1) as u16)
                .map_err(|e| ConvertError::RasterisationFailed {
                    page: page_num,
                    detail: format!("{:?}", e),
                })?;

        let bitmap =
            page.render_with_config(&render_config)
                .map_err(|e| ConvertError::RasterisationFailed {
                    page: page_num,
                    detail: format!("{:?}", e),
                })?;

        // JPEG has no alpha channel; drop it before encoding.
        let rgb = bitmap.as_image().to_rgb8();
        let image_path = output_dir.join(format!("page_{page_num:03}.jpg"));

        let file = std::fs::File::create(&image_path).map_err(|e| ConvertError::StorageIo {
            path: image_path.clone(),
            source: e,
        })?;
        let mut writer = BufWriter::new(file);
        JpegEncoder::new_with_quality(&mut writer, quality)
            .encode_image(&rgb)
            .map_err(|e| ConvertError::RasterisationFailed {
                page: page_num,
                detail: format!("JPEG encoding failed: {}", e),
            })?;

        debug!(
            "Rendered page {} → {}x{} px, {}",
            page_num,
            rgb.width(),
            rgb.height(),
            image_path.display()
        );

        results.push(PageImage {
            page_num,
            path: image_path,
            doc_hash: doc_hash.to_string(),
        });
    }

    Ok(results)
}
