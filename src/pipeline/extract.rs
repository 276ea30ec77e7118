//! Figure extraction: embedded images of a saved PDF → `temp_figures/`.
//!
//! The PDF must already sit in `inputs/` (see
//! [`crate::attachments::save_ui_file_to_local`]). Scanning runs on a
//! blocking thread; classification then runs one image at a time, in
//! document order, so figure numbers follow the page order.

use crate::error::AgentError;
use crate::pipeline::classify::FigureClassifier;
use crate::pipeline::encode::to_png_bytes;
use crate::pipeline::{bind_pdfium, input};
use crate::progress::ProgressCallback;
use crate::workspace::Workspace;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// An image object pulled out of a PDF page, already PNG-encoded.
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    /// 1-indexed page the image was found on.
    pub page: usize,
    pub png: Vec<u8>,
}

/// Extract the scientific figures of `inputs/<filename>` into `temp_figures/`.
///
/// Previous figures are removed first. Kept images are written as
/// `figure1.png`, `figure2.png`, … in document order.
pub async fn extract_images_from_local(
    filename: &str,
    ws: &Workspace,
    classifier: &dyn FigureClassifier,
    pdfium_lib_dir: Option<&Path>,
    progress: Option<&ProgressCallback>,
) -> Result<String, AgentError> {
    debug!("filename: {}", filename);
    let pdf_path = ws.input_path(filename);
    if !pdf_path.exists() {
        return Err(AgentError::NotSynchronised {
            filename: filename.to_string(),
        });
    }
    input::ensure_pdf(&pdf_path)?;

    ws.clear_figures()?;

    let images = scan_images(&pdf_path, pdfium_lib_dir).await?;
    info!("Found {} embedded image(s) in {}", images.len(), filename);

    let kept = save_figures(&images, ws, classifier, progress).await?;
    Ok(format!("SUCCESS: {kept} figures extracted locally."))
}

/// Classify `images` and write the keepers as `figure<N>.png`.
///
/// Returns the number of figures written.
pub async fn save_figures(
    images: &[EmbeddedImage],
    ws: &Workspace,
    classifier: &dyn FigureClassifier,
    progress: Option<&ProgressCallback>,
) -> Result<usize, AgentError> {
    let total = images.len();
    if let Some(cb) = progress {
        cb.on_extraction_start(total);
    }

    let mut kept = 0usize;
    for (i, image) in images.iter().enumerate() {
        let is_figure = classifier.is_scientific_figure(&image.png).await?;
        if let Some(cb) = progress {
            cb.on_image_classified(i + 1, total, is_figure);
        }
        if !is_figure {
            debug!("Image {} (page {}) skipped as publisher artefact", i + 1, image.page);
            continue;
        }
        kept += 1;
        let path = ws.figure_path(&format!("figure{kept}.png"));
        tokio::fs::write(&path, &image.png)
            .await
            .map_err(|e| AgentError::io(&path, e))?;
        debug!("Saved {} from page {}", path.display(), image.page);
    }

    if let Some(cb) = progress {
        cb.on_extraction_complete(total, kept);
    }
    info!("Kept {}/{} image(s) as figures", kept, total);
    Ok(kept)
}

/// Collect every image object of every page. Runs inside `spawn_blocking`.
pub async fn scan_images(
    pdf_path: &Path,
    pdfium_lib_dir: Option<&Path>,
) -> Result<Vec<EmbeddedImage>, AgentError> {
    let path = pdf_path.to_path_buf();
    let lib_dir: Option<PathBuf> = pdfium_lib_dir.map(Path::to_path_buf);

    tokio::task::spawn_blocking(move || scan_images_blocking(&path, lib_dir.as_deref()))
        .await
        .map_err(|e| AgentError::Internal(format!("Extraction task panicked: {}", e)))?
}

fn scan_images_blocking(
    pdf_path: &Path,
    pdfium_lib_dir: Option<&Path>,
) -> Result<Vec<EmbeddedImage>, AgentError> {
    let pdfium = bind_pdfium(pdfium_lib_dir)?;
    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| AgentError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: format!("{:?}", e),
        })?;

    let mut images = Vec::new();
    for (idx, page) in document.pages().iter().enumerate() {
        let page_num = idx + 1;
        for object in page.objects().iter() {
            let Some(image_object) = object.as_image_object() else {
                continue;
            };
            let raw = match image_object.get_raw_image() {
                Ok(img) => img,
                Err(e) => {
                    warn!("Page {}: undecodable image skipped: {:?}", page_num, e);
                    continue;
                }
            };
            let png = to_png_bytes(&raw).map_err(|e| AgentError::ImageExtractionFailed {
                page: page_num,
                detail: e.to_string(),
            })?;
            images.push(EmbeddedImage {
                page: page_num,
                png,
            });
        }
    }

    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Keeps the first, third, fifth… image it is asked about.
    struct EveryOther {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FigureClassifier for EveryOther {
        async fn is_scientific_figure(&self, _png: &[u8]) -> Result<bool, AgentError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(n % 2 == 0)
        }
    }

    struct Failing;

    #[async_trait]
    impl FigureClassifier for Failing {
        async fn is_scientific_figure(&self, _png: &[u8]) -> Result<bool, AgentError> {
            Err(AgentError::LlmApiError {
                message: "quota exceeded".into(),
            })
        }
    }

    fn image(page: usize, tag: u8) -> EmbeddedImage {
        EmbeddedImage {
            page,
            png: vec![tag; 4],
        }
    }

    #[tokio::test]
    async fn kept_figures_are_numbered_densely() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = Workspace::open(tmp.path()).unwrap();
        let classifier = EveryOther {
            calls: AtomicUsize::new(0),
        };
        let images = vec![image(1, 1), image(1, 2), image(2, 3), image(3, 4)];

        let kept = save_figures(&images, &ws, &classifier, None).await.unwrap();
        assert_eq!(kept, 2);
        assert_eq!(ws.figure_names().unwrap(), vec!["figure1.png", "figure2.png"]);
        assert_eq!(std::fs::read(ws.figure_path("figure1.png")).unwrap(), vec![1; 4]);
        assert_eq!(std::fs::read(ws.figure_path("figure2.png")).unwrap(), vec![3; 4]);
    }

    #[tokio::test]
    async fn classifier_failure_propagates() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = Workspace::open(tmp.path()).unwrap();
        let err = save_figures(&[image(1, 1)], &ws, &Failing, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn missing_input_asks_for_sync_first() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = Workspace::open(tmp.path()).unwrap();
        let err = extract_images_from_local("paper.pdf", &ws, &Failing, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::NotSynchronised { .. }));
    }

    #[tokio::test]
    async fn non_pdf_input_is_rejected_before_scanning() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = Workspace::open(tmp.path()).unwrap();
        std::fs::write(ws.input_path("paper.pdf"), b"GIF89a").unwrap();
        std::fs::write(ws.figure_path("figure1.png"), b"old").unwrap();

        let err = extract_images_from_local("paper.pdf", &ws, &Failing, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::NotAPdf { .. }));
        // Old figures survive a rejected request.
        assert!(ws.figure_path("figure1.png").exists());
    }
}
