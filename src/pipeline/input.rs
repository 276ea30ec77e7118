//! Input resolution: turn a user-supplied path or URL into an attachment.
//!
//! Manuscripts handed to the CLI go through the same [`InlineData`] shape a
//! chat UI would produce, so the tools downstream cannot tell the two
//! apart. PDFs are checked for their `%PDF` magic before anything else
//! touches them.

use crate::attachments::{mime_type_for, InlineData, PDF_MIME};
use crate::error::AgentError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load a manuscript or image from a local path or HTTP(S) URL.
pub async fn load_attachment(input: &str, timeout_secs: u64) -> Result<InlineData, AgentError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        load_local(Path::new(input))
    }
}

/// Verify that `path` exists and starts with the PDF magic bytes.
pub fn ensure_pdf(path: &Path) -> Result<(), AgentError> {
    let mut f = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AgentError::FileNotFound {
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(AgentError::io(path, e)),
    };
    let mut head = Vec::with_capacity(4);
    f.take(4)
        .read_to_end(&mut head)
        .map_err(|e| AgentError::io(path, e))?;
    if head != b"%PDF" {
        // Files shorter than the magic are reported zero-padded.
        let mut magic = [0u8; 4];
        magic[..head.len()].copy_from_slice(&head);
        return Err(AgentError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }
    Ok(())
}

fn load_local(path: &Path) -> Result<InlineData, AgentError> {
    if !path.exists() {
        return Err(AgentError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let mime = mime_type_for(path);
    if mime == PDF_MIME {
        ensure_pdf(path)?;
    }
    let data = std::fs::read(path).map_err(|e| AgentError::io(path, e))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "manuscript.pdf".to_string());

    debug!("Loaded local file: {} ({} bytes)", path.display(), data.len());
    Ok(InlineData::new(name, mime, data))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<InlineData, AgentError> {
    info!("Downloading manuscript from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AgentError::Internal(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        AgentError::Internal(format!("failed to download '{url}': {e}"))
    })?;

    if !response.status().is_success() {
        return Err(AgentError::Internal(format!(
            "failed to download '{url}': HTTP {}",
            response.status()
        )));
    }

    let filename = filename_from_url(url);
    let bytes = response
        .bytes()
        .await
        .map_err(|e| AgentError::Internal(format!("failed to download '{url}': {e}")))?;

    let mime = mime_type_for(Path::new(&filename));
    if mime == PDF_MIME || bytes.starts_with(b"%PDF") {
        if !bytes.starts_with(b"%PDF") {
            let mut magic = [0u8; 4];
            let n = bytes.len().min(4);
            magic[..n].copy_from_slice(&bytes[..n]);
            return Err(AgentError::NotAPdf {
                path: PathBuf::from(url),
                magic,
            });
        }
        info!("Downloaded {} ({} bytes)", filename, bytes.len());
        return Ok(InlineData::new(filename, PDF_MIME, bytes.to_vec()));
    }

    info!("Downloaded {} ({} bytes)", filename, bytes.len());
    Ok(InlineData::new(filename, mime, bytes.to_vec()))
}

/// Extract a reasonable filename from the URL path.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "manuscript.pdf".to_string()
}
