//! Remote-document materialisation and content hashing.
//!
//! pdfium requires a file-system path, so URL inputs are downloaded into the
//! storage tree before rasterisation. A failed download (network fault,
//! non-2xx status, timeout) is fatal to the whole conversion — it is never a
//! page-level failure. We validate the PDF magic bytes (`%PDF`) before
//! returning so callers get a meaningful error rather than a pdfium crash.
//!
//! The same module owns the content hash used to key the rasteriser's output
//! directory: sha256 of the document bytes, streamed so large PDFs never sit
//! fully in memory.

use crate::config::ConversionConfig;
use crate::error::ConvertError;
use chrono::Local;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Check whether the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Download a PDF from `url` into `{storage_root}/downloads/{YYYY/MM/DD}/`.
///
/// The file is named by a short hash of the URL so repeated downloads of the
/// same URL on the same day land on the same path.
pub async fn download(url: &str, config: &ConversionConfig) -> Result<PathBuf, ConvertError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.download_timeout_secs))
        .build()
        .map_err(|e| ConvertError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ConvertError::DownloadTimeout {
                url: url.to_string(),
                secs: config.download_timeout_secs,
            }
        } else {
            ConvertError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(ConvertError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ConvertError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let dir = config
        .storage_root
        .join("downloads")
        .join(Local::now().format("%Y/%m/%d").to_string());
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| ConvertError::StorageIo {
            path: dir.clone(),
            source: e,
        })?;

    let file_path = dir.join(format!("{}.pdf", short_hash(url.as_bytes())));

    // Reject non-PDF payloads before writing anything pdfium would choke on.
    if let Err(magic) = check_pdf_magic(&bytes) {
        return Err(ConvertError::NotAPdf {
            path: file_path,
            magic,
        });
    }

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| ConvertError::StorageIo {
            path: file_path.clone(),
            source: e,
        })?;

    info!("Downloaded to: {}", file_path.display());
    Ok(file_path)
}

/// Validate that a local path exists, is readable, and starts with `%PDF`.
pub fn validate_local(path_str: &str) -> Result<PathBuf, ConvertError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(ConvertError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(f) => {
            let mut head = Vec::with_capacity(4);
            f.take(4)
                .read_to_end(&mut head)
                .map_err(|e| ConvertError::StorageIo {
                    path: path.clone(),
                    source: e,
                })?;
            if let Err(magic) = check_pdf_magic(&head) {
                return Err(ConvertError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ConvertError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(ConvertError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}

/// Streaming sha256 of a file, returned as lowercase hex.
///
/// Used as the integrity key for the rasteriser's per-document directory.
pub fn file_sha256(path: &Path) -> Result<String, ConvertError> {
    let mut file = std::fs::File::open(path).map_err(|e| ConvertError::StorageIo {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf).map_err(|e| ConvertError::StorageIo {
            path: path.to_path_buf(),
            source: e,
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// First 16 hex chars of sha256 — enough to key a directory or filename.
pub fn short_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))[..16].to_string()
}

/// Check that `bytes` starts with the `%PDF` magic.
///
/// Anything shorter than the magic is not a PDF either; the error carries the
/// bytes actually seen, zero-padded, for the diagnostic.
fn check_pdf_magic(bytes: &[u8]) -> Result<(), [u8; 4]> {
    let mut magic = [0u8; 4];
    let n = bytes.len().min(4);
    magic[..n].copy_from_slice(&bytes[..n]);
    if n == 4 && &magic == b"%PDF" {
        Ok(())
    } else {
        Err(magic)
    }
}
