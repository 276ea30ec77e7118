//! PDF rasterisation for the review model.
//!
//! The review model reads the manuscript the way a human reviewer would:
//! as page images. Pages are rendered with pdfium on a blocking thread and
//! capped at `max_rendered_pixels` on the longest edge so a poster-sized
//! page cannot blow up memory or the request size.

use crate::error::AgentError;
use crate::pipeline::bind_pdfium;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Rasterise every page of a PDF given as bytes.
///
/// # Returns
/// `(page_number_1based, image)` pairs in page order.
pub async fn render_pages(
    pdf_bytes: Vec<u8>,
    max_pixels: u32,
    pdfium_lib_dir: Option<&Path>,
) -> Result<Vec<(usize, DynamicImage)>, AgentError> {
    let lib_dir: Option<PathBuf> = pdfium_lib_dir.map(Path::to_path_buf);

    tokio::task::spawn_blocking(move || {
        render_pages_blocking(&pdf_bytes, max_pixels, lib_dir.as_deref())
    })
    .await
    .map_err(|e| AgentError::Internal(format!("Render task panicked: {}", e)))?
}

fn render_pages_blocking(
    pdf_bytes: &[u8],
    max_pixels: u32,
    pdfium_lib_dir: Option<&Path>,
) -> Result<Vec<(usize, DynamicImage)>, AgentError> {
    let pdfium = bind_pdfium(pdfium_lib_dir)?;

    let document = pdfium
        .load_pdf_from_byte_slice(pdf_bytes, None)
        .map_err(|e| AgentError::CorruptPdf {
            path: PathBuf::from("<attachment>"),
            detail: format!("{:?}", e),
        })?;

    let pages = document.pages();
    info!("Manuscript loaded: {} pages", pages.len());

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut results = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| AgentError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        results.push((idx + 1, image));
    }

    Ok(results)
}
